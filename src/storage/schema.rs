//! Database schema definitions
//!
//! This module contains the SQL schema for the SQLite blob archive.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per archived artifact (primary documents and assets)
CREATE TABLE IF NOT EXISTS artifacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_key TEXT NOT NULL,
    name TEXT NOT NULL,
    bytes BLOB NOT NULL,
    size INTEGER NOT NULL,
    stored_at TEXT NOT NULL,
    UNIQUE(site_key, name)
);

CREATE INDEX IF NOT EXISTS idx_artifacts_site ON artifacts(site_key);
"#;

/// Initializes the database schema
///
/// Creates all tables and indexes if they don't exist.
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
