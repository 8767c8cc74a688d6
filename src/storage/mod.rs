//! Storage module for persisting archived sites
//!
//! This module provides the archive sink the crawler writes to:
//! - A filesystem backend (`<archive-dir>/<site_key>/<name>`)
//! - A SQLite blob backend (one row per artifact)
//!
//! Both are addressed by `(site_key, name)` and make writes durable before
//! returning.

mod fs;
mod schema;
mod sqlite;
mod traits;

pub use fs::FsStore;
pub use sqlite::SqliteStore;
pub use traits::{validate_key, ArchiveStore, StorageError, StorageResult};

use crate::config::{OutputConfig, StorageBackend};
use std::path::Path;
use std::sync::Arc;

/// Opens the archive backend selected by the output configuration
///
/// # Arguments
///
/// * `config` - The output configuration
///
/// # Returns
///
/// * `Ok(Arc<dyn ArchiveStore>)` - A shareable archive handle
/// * `Err(StorageError)` - Failed to create the directory or open the database
pub fn open_store(config: &OutputConfig) -> StorageResult<Arc<dyn ArchiveStore>> {
    match config.backend {
        StorageBackend::Filesystem => {
            let store = FsStore::new(Path::new(&config.archive_dir))?;
            tracing::info!("Archiving to directory {}", config.archive_dir);
            Ok(Arc::new(store))
        }
        StorageBackend::Sqlite => {
            let store = SqliteStore::new(Path::new(&config.database_path))?;
            tracing::info!("Archiving to database {}", config.database_path);
            Ok(Arc::new(store))
        }
    }
}
