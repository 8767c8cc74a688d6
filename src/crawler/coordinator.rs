//! Crawl coordinator - run orchestration
//!
//! This module ties one crawl run together:
//! - Canonicalizing and deduplicating the seed addresses
//! - Creating the run state, archiver and scheduler
//! - Expanding the first seed before the pool starts
//! - Driving the scheduler to quiescence and draining the asset pool
//! - Assembling the run summary

use crate::config::Config;
use crate::crawler::archiver::{ArchiverSettings, SiteArchiver};
use crate::crawler::fetcher::{HttpTransport, Transport};
use crate::crawler::frontier::WorkItem;
use crate::crawler::parser::LinkExtractor;
use crate::crawler::scheduler::{CrawlRunState, Scheduler, SchedulerSettings};
use crate::output::CrawlSummary;
use crate::storage::{open_store, ArchiveStore};
use crate::url::{canonicalize, Target};
use crate::{HarvestError, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    target: Target,
    transport: Arc<dyn Transport>,
    store: Arc<dyn ArchiveStore>,
    cancel: CancellationToken,
    config_hash: Option<String>,
}

impl Coordinator {
    /// Creates a coordinator with the proxy transport and configured archive
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - The client could not be built or the archive could not be opened
    pub fn new(config: Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.crawler.request_timeout_secs);
        let transport = HttpTransport::new(&config.transport, timeout)?;
        let store = open_store(&config.output)?;

        tracing::info!("Routing all requests through {}", config.transport.proxy_url);

        Ok(Self::with_components(config, Arc::new(transport), store))
    }

    /// Creates a coordinator over an explicit transport and archive
    pub fn with_components(
        config: Config,
        transport: Arc<dyn Transport>,
        store: Arc<dyn ArchiveStore>,
    ) -> Self {
        let target = Target::from(&config.target);
        Self {
            config: Arc::new(config),
            target,
            transport,
            store,
            cancel: CancellationToken::new(),
            config_hash: None,
        }
    }

    /// Records the configuration hash in every summary this coordinator produces
    pub fn with_config_hash(mut self, hash: String) -> Self {
        self.config_hash = Some(hash);
        self
    }

    /// Token that stops the crawl cooperatively when cancelled
    ///
    /// Cancellation is sticky: a coordinator whose token was cancelled claims
    /// nothing in later runs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Canonicalizes seed strings, dropping malformed, off-target and repeated ones
    pub fn canonical_seeds(&self, seeds: &[String]) -> Vec<Url> {
        let mut canonical: Vec<Url> = Vec::with_capacity(seeds.len());
        for seed in seeds {
            match canonicalize(seed, &self.target) {
                Ok(url) if canonical.contains(&url) => {
                    tracing::debug!("Seed {} repeats {}", seed, url);
                }
                Ok(url) => canonical.push(url),
                Err(e) => tracing::warn!("Ignoring seed {}: {}", seed, e),
            }
        }
        canonical
    }

    /// Runs one bounded crawl pass from the given seeds
    ///
    /// The first seed is fetched before the worker pool starts so that its
    /// links join the remaining seeds in the frontier. Per-address failures
    /// are counted in the summary; only setup problems return an error.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - The run finished, was capped, or was stopped
    /// * `Err(HarvestError::NoSeeds)` - No seed survived canonicalization
    pub async fn run(&self, seeds: &[String]) -> Result<CrawlSummary> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let seeds = self.canonical_seeds(seeds);
        if seeds.is_empty() {
            return Err(HarvestError::NoSeeds);
        }
        tracing::info!("Starting crawl from {} seed addresses", seeds.len());

        let run = Arc::new(CrawlRunState::new());
        let crawler = &self.config.crawler;

        let archiver = Arc::new(SiteArchiver::new(
            Arc::clone(&self.store),
            Arc::clone(&self.transport),
            ArchiverSettings {
                policy: self.config.output.recrawl_policy,
                fetch_assets: crawler.fetch_assets,
                asset_pool_size: crawler.asset_pool_size,
                content_types: self.config.assets.content_types.clone(),
            },
            self.cancel.clone(),
        ));

        let scheduler = Scheduler::new(
            Arc::clone(&self.transport),
            LinkExtractor::new(self.target.clone())?,
            Arc::clone(&archiver),
            Arc::clone(&run),
            SchedulerSettings {
                worker_pool_size: crawler.worker_pool_size,
                max_depth: crawler.max_depth,
                max_pages: crawler.max_pages,
            },
        );

        let mut seeds = seeds.into_iter();
        if let Some(first) = seeds.next() {
            run.frontier.extend(seeds.map(WorkItem::seed));

            if !self.cancel.is_cancelled() {
                if let Some(report) = scheduler.process_now(WorkItem::seed(first)).await {
                    tracing::info!(
                        "Initial expansion of {}: {} ({} links queued)",
                        report.address,
                        report.state,
                        report.discovered
                    );
                }
            }
        }

        scheduler.run(&self.cancel).await;

        let pending = archiver.pending_assets();
        if pending > 0 {
            tracing::info!("Waiting for {} asset fetches", pending);
        }
        let assets = archiver.drain().await;

        let totals = run.counters.snapshot();
        let summary = CrawlSummary {
            started_at,
            finished_at: Utc::now(),
            elapsed: clock.elapsed(),
            cancelled: self.cancel.is_cancelled(),
            config_hash: self.config_hash.clone(),
            claimed: totals.claimed,
            succeeded: totals.succeeded,
            failed: totals.failed,
            duplicates: totals.duplicates,
            depth_skipped: totals.depth_skipped,
            dropped: totals.dropped,
            failures: totals.failures,
            assets,
            sites: run.archived_sites(),
        };

        tracing::info!(
            "Crawl completed: {} claimed, {} succeeded, {} failed in {:?}",
            summary.claimed,
            summary.succeeded,
            summary.failed,
            summary.elapsed
        );

        Ok(summary)
    }
}

/// Runs a crawl over the configured seeds with the proxy transport
///
/// # Arguments
///
/// * `config` - A validated configuration
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - The run finished
/// * `Err(HarvestError)` - Setup failed or no seed was usable
pub async fn run_crawl(config: Config) -> Result<CrawlSummary> {
    let seeds = config.seeds.clone();
    let coordinator = Coordinator::new(config)?;
    coordinator.run(&seeds).await
}
