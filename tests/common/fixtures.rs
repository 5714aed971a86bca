//! Pipeline fixture
//!
//! Each test gets its own pipeline, fake provider and history database.

use super::provider::FakeProvider;
use songsmith::generation::{ClientSettings, GenerationClient};
use songsmith::{HistoryStore, SongPipeline, SqliteHistoryStore};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestPipeline {
    pub pipeline: SongPipeline,
    pub provider: Arc<FakeProvider>,
    pub store: Arc<SqliteHistoryStore>,
    _temp_dir: TempDir,
}

impl TestPipeline {
    pub fn new() -> Self {
        Self::with_provider(FakeProvider::new())
    }

    pub fn with_provider(provider: FakeProvider) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteHistoryStore::new(temp_dir.path().join("history.db"))
                .expect("Failed to open history store"),
        );
        let provider = Arc::new(provider);
        let client = GenerationClient::new(provider.clone(), ClientSettings::default());
        let pipeline = SongPipeline::new(client, store.clone());
        Self {
            pipeline,
            provider,
            store,
            _temp_dir: temp_dir,
        }
    }

    /// Items as stored on disk, newest first.
    pub fn stored(&self) -> Vec<songsmith::SongHistoryItem> {
        self.store.list().expect("Failed to list history")
    }
}
