//! Filesystem archive implementation
//!
//! Artifacts live at `<root>/<site_key>/<name>`.

use crate::storage::traits::{validate_key, ArchiveStore, StorageResult};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Local directory archive backend
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    /// Distinguishes concurrent temp files
    write_seq: AtomicU64,
}

impl FsStore {
    /// Creates a filesystem archive rooted at `root`, creating it if needed
    pub fn new(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            write_seq: AtomicU64::new(0),
        })
    }

    fn site_dir(&self, site_key: &str) -> PathBuf {
        self.root.join(site_key)
    }
}

impl ArchiveStore for FsStore {
    fn put(&self, site_key: &str, name: &str, bytes: &[u8]) -> StorageResult<()> {
        validate_key(site_key)?;
        validate_key(name)?;

        let dir = self.site_dir(site_key);
        fs::create_dir_all(&dir)?;

        // Write beside the target then rename, so readers never see a partial file
        let final_path = dir.join(name);
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let temp_path = dir.join(format!(".{}.{}.partial", name, seq));
        let written = File::create(&temp_path)
            .and_then(|mut file| {
                file.write_all(bytes)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&temp_path, &final_path));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        tracing::trace!("Wrote {} ({} bytes)", final_path.display(), bytes.len());
        Ok(())
    }

    fn exists(&self, site_key: &str, name: &str) -> StorageResult<bool> {
        validate_key(site_key)?;
        validate_key(name)?;
        Ok(self.site_dir(site_key).join(name).is_file())
    }

    fn location(&self, site_key: &str) -> String {
        self.site_dir(site_key).display().to_string()
    }
}
