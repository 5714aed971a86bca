mod models;
mod schema;
mod store;
mod trait_def;

pub use models::SongHistoryItem;
pub use schema::HISTORY_VERSIONED_SCHEMAS;
pub use store::SqliteHistoryStore;
#[cfg(feature = "mock")]
pub use trait_def::MockHistoryStore;
pub use trait_def::HistoryStore;
