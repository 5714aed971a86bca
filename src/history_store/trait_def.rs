//! HistoryStore trait definition.

use super::models::SongHistoryItem;
use anyhow::{bail, Context, Result};
use tracing::info;

/// Durable storage of finished songs, keyed by item id.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait HistoryStore: Send + Sync {
    /// All items, newest first. Ties are ordered by id.
    fn list(&self) -> Result<Vec<SongHistoryItem>>;

    fn get(&self, id: &str) -> Result<Option<SongHistoryItem>>;

    /// Inserts or replaces the item with the same id. Items missing lyrics,
    /// style prompt or cover are rejected.
    fn put(&self, item: &SongHistoryItem) -> Result<()>;

    /// Returns whether an item was removed. Unknown ids are not an error.
    fn delete(&self, id: &str) -> Result<bool>;

    /// Serializes the whole history as a pretty-printed JSON array.
    fn export_all(&self) -> Result<String> {
        let items = self.list()?;
        serde_json::to_string_pretty(&items).context("Failed to serialize history")
    }

    /// Upserts every item of a JSON array produced by [`HistoryStore::export_all`].
    ///
    /// Stops at the first item that cannot be decoded or written. Items
    /// written before that point stay written.
    fn import_all(&self, blob: &str) -> Result<usize> {
        let value: serde_json::Value =
            serde_json::from_str(blob).context("Import data is not valid JSON")?;
        let serde_json::Value::Array(entries) = value else {
            bail!("Import data must be a JSON array of history items");
        };

        let mut imported = 0;
        for (index, entry) in entries.into_iter().enumerate() {
            let item: SongHistoryItem = serde_json::from_value(entry)
                .with_context(|| format!("Invalid history item at index {}", index))?;
            self.put(&item)
                .with_context(|| format!("Failed to import history item {}", item.id))?;
            imported += 1;
        }
        info!("Imported {} history items", imported);
        Ok(imported)
    }
}
