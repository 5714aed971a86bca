//! SQLite-backed song history store.

use super::models::SongHistoryItem;
use super::schema::HISTORY_VERSIONED_SCHEMAS;
use super::trait_def::HistoryStore;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const SELECT_ITEM_COLUMNS: &str = "SELECT id, timestamp, concept, lyrics, style, cover_url FROM song_history";

#[derive(Clone, Debug)]
pub struct SqliteHistoryStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

fn create_or_validate_schema(conn: &Connection) -> Result<()> {
    let latest_schema = HISTORY_VERSIONED_SCHEMAS
        .last()
        .context("No history schema defined")?;

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if table_count == 0 {
        info!(
            "Creating history db schema at version {}",
            latest_schema.version
        );
        latest_schema.create(conn)?;
        return Ok(());
    }

    let raw_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    let db_version = raw_version - BASE_DB_VERSION as i64;
    if db_version < 1 {
        bail!(
            "History database version {} is invalid (expected >= 1), is this a songsmith database?",
            db_version
        );
    }
    let db_version = db_version as usize;

    let current = HISTORY_VERSIONED_SCHEMAS
        .iter()
        .find(|s| s.version == db_version)
        .with_context(|| {
            format!(
                "Unknown history database version {} (this build knows up to {})",
                db_version, latest_schema.version
            )
        })?;
    current.validate(conn).with_context(|| {
        format!(
            "History database schema validation failed for version {}",
            db_version
        )
    })
}

/// Row columns as stored, before decoding the JSON documents.
struct StoredRow {
    id: String,
    timestamp: i64,
    concept: String,
    lyrics: String,
    style: String,
    cover_url: String,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            timestamp: row.get("timestamp")?,
            concept: row.get("concept")?,
            lyrics: row.get("lyrics")?,
            style: row.get("style")?,
            cover_url: row.get("cover_url")?,
        })
    }

    fn into_item(self) -> Result<SongHistoryItem> {
        let concept = serde_json::from_str(&self.concept)
            .with_context(|| format!("Corrupt concept for history item {}", self.id))?;
        let style = serde_json::from_str(&self.style)
            .with_context(|| format!("Corrupt style for history item {}", self.id))?;
        Ok(SongHistoryItem {
            id: self.id,
            timestamp: self.timestamp,
            concept,
            lyrics: self.lyrics,
            style,
            cover_url: self.cover_url,
        })
    }
}

impl SqliteHistoryStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open history database")?;

        create_or_validate_schema(&write_conn)?;

        write_conn.pragma_update(None, "journal_mode", "WAL")?;

        let item_count: i64 = write_conn
            .query_row("SELECT COUNT(*) FROM song_history", [], |r| r.get(0))
            .unwrap_or(0);
        info!("Opened song history at {:?}: {} items", db_path_ref, item_count);

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open history database for reading")?;
        read_conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn list(&self) -> Result<Vec<SongHistoryItem>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY timestamp DESC, id ASC",
            SELECT_ITEM_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], StoredRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(StoredRow::into_item).collect()
    }

    fn get(&self, id: &str) -> Result<Option<SongHistoryItem>> {
        let conn = self.read_conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_ITEM_COLUMNS),
                params![id],
                StoredRow::from_row,
            )
            .optional()?;
        row.map(StoredRow::into_item).transpose()
    }

    fn put(&self, item: &SongHistoryItem) -> Result<()> {
        item.validate()?;
        let item = item.normalized();
        let concept = serde_json::to_string(&item.concept)?;
        let style = serde_json::to_string(&item.style)?;

        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO song_history
                (id, timestamp, concept, lyrics, style, cover_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                item.id,
                item.timestamp,
                concept,
                item.lyrics,
                style,
                item.cover_url
            ],
        )
        .with_context(|| format!("Failed to write history item {}", item.id))?;
        debug!(id = %item.id, "Stored history item");
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let removed = conn.execute("DELETE FROM song_history WHERE id = ?1", params![id])?;
        if removed == 0 {
            debug!(id = %id, "No history item to delete");
        }
        Ok(removed > 0)
    }
}
