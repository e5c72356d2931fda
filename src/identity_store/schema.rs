//! SQLite schema for the identity database.
//!
//! Two tables: `identities` holds the canonical record, `associations`
//! holds the per-platform id mapping. `artist_key` stores the normalized
//! artist string so candidate lookups stay on an index.

use rusqlite::Connection;

use super::trait_def::StoreError;

/// Bumped whenever the DDL below changes shape.
pub const SCHEMA_VERSION: i64 = 1;

const CREATE_IDENTITIES: &str = "
    CREATE TABLE IF NOT EXISTS identities (
        canonical_id  TEXT PRIMARY KEY,
        title         TEXT NOT NULL,
        artist        TEXT NOT NULL,
        artist_key    TEXT NOT NULL,
        album         TEXT,
        duration_secs REAL,
        standard_code TEXT UNIQUE,
        confidence    REAL NOT NULL,
        method        TEXT NOT NULL,
        updated_at    INTEGER NOT NULL
    )";

const CREATE_ASSOCIATIONS: &str = "
    CREATE TABLE IF NOT EXISTS associations (
        canonical_id TEXT NOT NULL REFERENCES identities(canonical_id),
        platform     TEXT NOT NULL,
        platform_id  TEXT NOT NULL,
        UNIQUE (platform, platform_id)
    )";

const CREATE_INDICES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_identities_artist_key ON identities(artist_key)",
    "CREATE INDEX IF NOT EXISTS idx_associations_canonical ON associations(canonical_id)",
];

/// Creates the schema on a fresh database, or verifies the version on an
/// existing one. An unknown version is a hard error rather than a silent
/// migration.
pub fn initialize(conn: &Connection) -> Result<(), StoreError> {
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| StoreError::Operation(e.to_string()))?;

    match version {
        0 => {
            conn.execute(CREATE_IDENTITIES, [])
                .map_err(|e| StoreError::Operation(e.to_string()))?;
            conn.execute(CREATE_ASSOCIATIONS, [])
                .map_err(|e| StoreError::Operation(e.to_string()))?;
            for ddl in CREATE_INDICES {
                conn.execute(ddl, [])
                    .map_err(|e| StoreError::Operation(e.to_string()))?;
            }
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .map_err(|e| StoreError::Operation(e.to_string()))?;
            Ok(())
        }
        v if v == SCHEMA_VERSION => Ok(()),
        other => Err(StoreError::Operation(format!(
            "unsupported identity schema version {} (expected {})",
            other, SCHEMA_VERSION
        ))),
    }
}
