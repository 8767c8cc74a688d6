//! Storage traits and error types
//!
//! This module defines the trait interface for archive backends and the
//! associated error types.

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid archive key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for archive backend implementations
///
/// An archive is addressed by `(site_key, name)`. Implementations must make a
/// write durable before `put` returns and must be safe to share between the
/// crawl workers and the asset pool.
pub trait ArchiveStore: Send + Sync {
    /// Writes an artifact, replacing any previous artifact with the same key
    ///
    /// # Arguments
    ///
    /// * `site_key` - Stable per-site identifier (see `url::site_key`)
    /// * `name` - Artifact name within the site, e.g. `index.html`
    /// * `bytes` - Artifact content
    fn put(&self, site_key: &str, name: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Returns true if an artifact already exists under the key
    fn exists(&self, site_key: &str, name: &str) -> StorageResult<bool>;

    /// Human-readable location of a site's artifacts
    ///
    /// This is what downstream analysis receives along with the site key.
    fn location(&self, site_key: &str) -> String;
}

/// Validates a site key or artifact name
///
/// Keys are used as path components, so they are restricted to
/// `[A-Za-z0-9._-]` and may not be empty, `.` or `..`.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let valid_chars = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');

    if key.is_empty() || key == "." || key == ".." || !valid_chars {
        return Err(StorageError::InvalidKey(key.to_string()));
    }

    Ok(())
}
