//! Site archiver
//!
//! Persists each fetched site's primary document under its site key, then
//! fetches the site's embedded assets on a bounded pool shared by every site
//! in the run. Asset retrieval is best effort; only the primary document write
//! can fail a site.

use crate::config::RecrawlPolicy;
use crate::crawler::fetcher::Transport;
use crate::storage::{ArchiveStore, StorageError, StorageResult};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use url::Url;

/// Extension used for primary documents of an unlisted content type
const FALLBACK_EXTENSION: &str = "bin";

/// A fetched primary document ready to be archived
#[derive(Debug, Clone)]
pub struct SiteRecord {
    /// Canonical address the document was claimed under
    pub address: Url,
    /// Storage key derived from the address host
    pub site_key: String,
    /// MIME essence of the document
    pub content_type: String,
    /// Document bytes
    pub body: Vec<u8>,
}

/// Where a site's primary document ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedSite {
    pub address: Url,
    pub site_key: String,
    /// Name of the primary document inside the site location
    pub document: String,
    /// Backend-specific location handed to downstream analysis
    pub location: String,
    /// False when an existing document was kept under `RecrawlPolicy::Skip`
    pub written: bool,
    /// Number of asset fetches scheduled for this site
    pub assets_queued: usize,
}

/// Asset outcome totals for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetTotals {
    pub stored: usize,
    /// Unrecognized content type, or abandoned on stop
    pub skipped: usize,
    /// Transport or storage failure
    pub failed: usize,
}

#[derive(Debug, Default)]
struct AssetCounters {
    stored: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

/// Archiver settings taken from the crawl configuration
#[derive(Debug, Clone)]
pub struct ArchiverSettings {
    pub policy: RecrawlPolicy,
    pub fetch_assets: bool,
    pub asset_pool_size: usize,
    /// MIME essence -> file extension
    pub content_types: BTreeMap<String, String>,
}

/// Writes primary documents and drives the shared asset pool
pub struct SiteArchiver {
    store: Arc<dyn ArchiveStore>,
    transport: Arc<dyn Transport>,
    policy: RecrawlPolicy,
    fetch_assets: bool,
    content_types: Arc<BTreeMap<String, String>>,
    asset_permits: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    asset_seq: Arc<AtomicU64>,
    counters: Arc<AssetCounters>,
}

impl SiteArchiver {
    /// Creates an archiver with its own asset pool
    ///
    /// Assets still waiting for a pool slot when `cancel` fires are skipped.
    pub fn new(
        store: Arc<dyn ArchiveStore>,
        transport: Arc<dyn Transport>,
        settings: ArchiverSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            transport,
            policy: settings.policy,
            fetch_assets: settings.fetch_assets,
            content_types: Arc::new(settings.content_types),
            asset_permits: Arc::new(Semaphore::new(settings.asset_pool_size.max(1))),
            tracker: TaskTracker::new(),
            cancel,
            asset_seq: Arc::new(AtomicU64::new(0)),
            counters: Arc::new(AssetCounters::default()),
        }
    }

    /// Archives a site: primary document first, then its assets in the background
    ///
    /// The document write runs on the blocking pool and is awaited before any
    /// asset is queued.
    ///
    /// # Returns
    ///
    /// * `Ok(ArchivedSite)` - The document is durable (or was kept under `skip`)
    /// * `Err(StorageError)` - The document could not be written; no assets were queued
    pub async fn archive(
        &self,
        record: SiteRecord,
        assets: impl IntoIterator<Item = Url>,
    ) -> StorageResult<ArchivedSite> {
        let address = record.address.clone();
        let site_key = record.site_key.clone();
        let extension = self
            .content_types
            .get(&record.content_type)
            .map(String::as_str)
            .unwrap_or(FALLBACK_EXTENSION)
            .to_string();

        let store = Arc::clone(&self.store);
        let policy = self.policy;
        let (document, written) = tokio::task::spawn_blocking(move || {
            write_document(store.as_ref(), policy, &record, &extension)
        })
        .await??;

        let mut assets_queued = 0;
        if self.fetch_assets {
            for asset in assets {
                self.spawn_asset(&site_key, asset);
                assets_queued += 1;
            }
        }

        Ok(ArchivedSite {
            location: self.store.location(&site_key),
            address,
            site_key,
            document,
            written,
            assets_queued,
        })
    }

    fn spawn_asset(&self, site_key: &str, address: Url) {
        let store = Arc::clone(&self.store);
        let transport = Arc::clone(&self.transport);
        let permits = Arc::clone(&self.asset_permits);
        let content_types = Arc::clone(&self.content_types);
        let seq = Arc::clone(&self.asset_seq);
        let counters = Arc::clone(&self.counters);
        let cancel = self.cancel.clone();
        let site_key = site_key.to_string();

        self.tracker.spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    counters.skipped.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                permit = permits.acquire_owned() => permit,
            };
            let Ok(_permit) = permit else {
                counters.skipped.fetch_add(1, Ordering::Relaxed);
                return;
            };

            let response = match transport.fetch(&address).await {
                Ok(response) => response,
                Err(failure) => {
                    tracing::debug!(asset = %address, "Asset fetch failed: {}", failure);
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            };

            let Some(extension) = content_types.get(&response.content_type) else {
                tracing::debug!(
                    asset = %address,
                    "Skipping asset with content type '{}'", response.content_type
                );
                counters.skipped.fetch_add(1, Ordering::Relaxed);
                return;
            };

            let name = format!(
                "asset-{}-{}.{}",
                Utc::now().timestamp_millis(),
                seq.fetch_add(1, Ordering::Relaxed),
                extension
            );
            let body = response.body;
            let stored = {
                let store = Arc::clone(&store);
                let site_key = site_key.clone();
                let name = name.clone();
                tokio::task::spawn_blocking(move || store.put(&site_key, &name, &body))
                    .await
                    .map_err(StorageError::from)
                    .and_then(|put| put)
            };
            match stored {
                Ok(()) => {
                    tracing::trace!(asset = %address, "Stored {}/{}", site_key, name);
                    counters.stored.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    tracing::warn!(asset = %address, "Failed to store asset: {}", e);
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
    }

    /// Number of asset fetches still queued or running
    pub fn pending_assets(&self) -> usize {
        self.tracker.len()
    }

    /// Current asset totals
    pub fn totals(&self) -> AssetTotals {
        AssetTotals {
            stored: self.counters.stored.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Stops accepting assets and waits for every queued asset to finish
    pub async fn drain(&self) -> AssetTotals {
        self.tracker.close();
        self.tracker.wait().await;
        self.totals()
    }
}

/// Writes a primary document under the re-crawl policy
///
/// Returns the stored name and whether anything was written.
fn write_document(
    store: &dyn ArchiveStore,
    policy: RecrawlPolicy,
    record: &SiteRecord,
    extension: &str,
) -> StorageResult<(String, bool)> {
    let stem = document_stem(&record.address);
    let default_name = format!("{}.{}", stem, extension);

    match policy {
        RecrawlPolicy::Overwrite => {
            store.put(&record.site_key, &default_name, &record.body)?;
            Ok((default_name, true))
        }
        RecrawlPolicy::Skip => {
            if store.exists(&record.site_key, &default_name)? {
                tracing::debug!(
                    site_key = %record.site_key,
                    "Keeping existing {}", default_name
                );
                Ok((default_name, false))
            } else {
                store.put(&record.site_key, &default_name, &record.body)?;
                Ok((default_name, true))
            }
        }
        RecrawlPolicy::Version => {
            let name = if store.exists(&record.site_key, &default_name)? {
                format!("{}-{}.{}", stem, Utc::now().timestamp_millis(), extension)
            } else {
                default_name
            };
            store.put(&record.site_key, &name, &record.body)?;
            Ok((name, true))
        }
    }
}

/// Deterministic document name (without extension) for an address
///
/// The site root is `index`; any other page is `page-` followed by the first
/// 16 hex digits of the SHA-256 of its canonical address.
pub fn document_stem(address: &Url) -> String {
    if address.path() == "/" && address.query().is_none() {
        return "index".to_string();
    }
    let digest = hex::encode(Sha256::digest(address.as_str().as_bytes()));
    format!("page-{}", &digest[..16])
}
