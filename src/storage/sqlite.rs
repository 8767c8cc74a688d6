//! SQLite archive implementation
//!
//! This module stores artifacts as blobs in a single SQLite database, for
//! deployments where a directory tree of small files is inconvenient.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{validate_key, ArchiveStore, StorageError, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// SQLite blob archive backend
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Opens or creates the archive database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    /// Reads an artifact back
    pub fn get(&self, site_key: &str, name: &str) -> StorageResult<Option<Vec<u8>>> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let bytes = conn
            .query_row(
                "SELECT bytes FROM artifacts WHERE site_key = ?1 AND name = ?2",
                params![site_key, name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bytes)
    }

    /// Lists the artifact names stored for a site, in name order
    pub fn list(&self, site_key: &str) -> StorageResult<Vec<String>> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let mut stmt =
            conn.prepare("SELECT name FROM artifacts WHERE site_key = ?1 ORDER BY name")?;
        let names = stmt
            .query_map(params![site_key], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Counts all stored artifacts
    pub fn count(&self) -> StorageResult<u64> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM artifacts", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl ArchiveStore for SqliteStore {
    fn put(&self, site_key: &str, name: &str, bytes: &[u8]) -> StorageResult<()> {
        validate_key(site_key)?;
        validate_key(name)?;

        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            "INSERT INTO artifacts (site_key, name, bytes, size, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(site_key, name) DO UPDATE SET
                bytes = excluded.bytes,
                size = excluded.size,
                stored_at = excluded.stored_at",
            params![site_key, name, bytes, bytes.len() as i64, now],
        )?;
        Ok(())
    }

    fn exists(&self, site_key: &str, name: &str) -> StorageResult<bool> {
        validate_key(site_key)?;
        validate_key(name)?;

        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM artifacts WHERE site_key = ?1 AND name = ?2",
                params![site_key, name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn location(&self, site_key: &str) -> String {
        format!("sqlite://{}#{}", self.path.display(), site_key)
    }
}
