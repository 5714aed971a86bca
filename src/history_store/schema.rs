//! SQLite schema definitions for the song history database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Song history
// =============================================================================

/// Concept and style are stored as JSON documents.
const SONG_HISTORY_TABLE_V1: Table = Table {
    name: "song_history",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true), // UUID
        sqlite_column!("timestamp", &SqlType::Integer, non_null = true), // epoch millis
        sqlite_column!("concept", &SqlType::Text, non_null = true),
        sqlite_column!("lyrics", &SqlType::Text, non_null = true),
        sqlite_column!("style", &SqlType::Text, non_null = true),
        sqlite_column!("cover_url", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_song_history_timestamp", "timestamp DESC")],
};

/// All versioned schemas for the history database, oldest first.
pub const HISTORY_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[SONG_HISTORY_TABLE_V1],
}];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_persistence::BASE_DB_VERSION;
    use rusqlite::Connection;

    #[test]
    fn test_latest_schema_creates_successfully() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = HISTORY_VERSIONED_SCHEMAS.last().unwrap();
        schema.create(&conn).unwrap();
        schema.validate(&conn).unwrap();

        let db_version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(db_version, (BASE_DB_VERSION + schema.version) as i64);
    }

    #[test]
    fn test_table_without_index_does_not_validate() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE song_history (id TEXT PRIMARY KEY, timestamp INTEGER NOT NULL,
             concept TEXT NOT NULL, lyrics TEXT NOT NULL, style TEXT NOT NULL,
             cover_url TEXT NOT NULL)",
            [],
        )
        .unwrap();
        let err = HISTORY_VERSIONED_SCHEMAS[0]
            .validate(&conn)
            .unwrap_err()
            .to_string();
        assert!(err.contains("idx_song_history_timestamp"));
    }
}
