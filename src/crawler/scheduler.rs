//! Frontier scheduler
//!
//! This module owns the bounded worker pool:
//! - Pulling work items from the shared frontier
//! - Claiming each address through the visited set before dispatch
//! - Running fetch, archive and link extraction on a worker
//! - Feeding discovered addresses back into the frontier
//! - Stopping on quiescence, on the page cap, or on cancellation

use crate::crawler::archiver::{ArchivedSite, SiteArchiver, SiteRecord};
use crate::crawler::fetcher::Transport;
use crate::crawler::frontier::{Frontier, WorkItem};
use crate::crawler::parser::{LinkExtractor, ParsedPage};
use crate::state::{FailureKind, ItemState, VisitedSet};
use crate::url::{canonicalize_url, site_key};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Limits applied by the scheduler
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// Maximum number of concurrently processed items
    pub worker_pool_size: usize,
    /// Discovered links deeper than this are not queued
    pub max_depth: Option<u32>,
    /// No more claims once this many addresses have been claimed
    pub max_pages: Option<usize>,
}

/// Live counters for one run
#[derive(Debug, Default)]
pub struct RunCounters {
    claimed: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    duplicates: AtomicUsize,
    depth_skipped: AtomicUsize,
    dropped: AtomicUsize,
    failures: Mutex<BTreeMap<FailureKind, usize>>,
}

/// Point-in-time copy of `RunCounters`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub claimed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Queue entries whose claim was refused because the address was already claimed
    pub duplicates: usize,
    /// Links not queued because they exceeded `max-depth`
    pub depth_skipped: usize,
    /// Queue entries abandoned on stop or at the page cap
    pub dropped: usize,
    pub failures: BTreeMap<FailureKind, usize>,
}

impl RunCounters {
    fn record_failure(&self, kind: Option<FailureKind>) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if let Some(kind) = kind {
            let mut failures = self
                .failures
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *failures.entry(kind).or_insert(0) += 1;
        }
    }

    /// Number of addresses claimed so far
    pub fn claimed(&self) -> usize {
        self.claimed.load(Ordering::Relaxed)
    }

    /// Copies the current values
    pub fn snapshot(&self) -> RunTotals {
        RunTotals {
            claimed: self.claimed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            depth_skipped: self.depth_skipped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failures: self
                .failures
                .lock()
                .map(|f| f.clone())
                .unwrap_or_else(|poisoned| poisoned.into_inner().clone()),
        }
    }
}

/// All mutable state of one crawl run
///
/// Created fresh for every run and dropped when the run returns; nothing here
/// outlives the run or is shared between runs.
#[derive(Debug, Default)]
pub struct CrawlRunState {
    pub visited: VisitedSet,
    pub frontier: Frontier,
    pub counters: RunCounters,
    sites: Mutex<Vec<ArchivedSite>>,
}

impl CrawlRunState {
    /// Creates an empty run state
    pub fn new() -> Self {
        Self::default()
    }

    fn record_site(&self, site: ArchivedSite) {
        self.sites
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(site);
    }

    /// Sites archived so far, ordered by address
    pub fn archived_sites(&self) -> Vec<ArchivedSite> {
        let mut sites = self
            .sites
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone());
        sites.sort_by(|a, b| a.address.cmp(&b.address));
        sites
    }
}

/// Outcome of processing one claimed item
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub address: Url,
    /// `Done` or `Failed`
    pub state: ItemState,
    /// Every state the item passed through, starting at `Discovered`
    pub history: Vec<ItemState>,
    pub failure: Option<FailureKind>,
    /// Number of new work items pushed to the frontier
    pub discovered: usize,
    pub title: Option<String>,
}

fn advance(history: &mut Vec<ItemState>, next: ItemState) {
    if let Some(current) = history.last() {
        debug_assert!(
            current.can_transition_to(next),
            "illegal transition {} -> {}",
            current,
            next
        );
    }
    history.push(next);
}

/// Fetch, archive and extract for one claimed item
struct Worker {
    transport: Arc<dyn Transport>,
    extractor: LinkExtractor,
    archiver: Arc<SiteArchiver>,
    run: Arc<CrawlRunState>,
    max_depth: Option<u32>,
}

impl Worker {
    async fn process(&self, item: WorkItem) -> ItemReport {
        let mut history = vec![ItemState::Discovered, ItemState::Claimed];
        tracing::debug!("Fetching {} (depth {})", item.address, item.depth);

        let response = match self.transport.fetch(&item.address).await {
            Ok(response) => response,
            Err(failure) => {
                tracing::info!("Failed to fetch {}: {}", item.address, failure);
                return self.finish(item, history, Some(failure.kind()), 0, None);
            }
        };
        advance(&mut history, ItemState::Fetched);

        // A redirect target is claimed like any other address
        let mut address = item.address.clone();
        if let Some(redirected) = self.redirect_target(&item.address, &response.final_url) {
            if !self.run.visited.claim(&redirected) {
                tracing::debug!(
                    "{} redirected to {}, which is already claimed",
                    item.address,
                    redirected
                );
                self.run.counters.duplicates.fetch_add(1, Ordering::Relaxed);
                return self.finish(item, history, None, 0, None);
            }
            tracing::debug!("{} redirected to {}", item.address, redirected);
            address = redirected;
        }

        let parsed = if response.is_document() {
            self.extractor.parse(&response.body, &response.final_url)
        } else {
            ParsedPage::default()
        };

        // A storage failure fails the site but its links are still followed
        let mut failure = None;
        match site_key(&address, self.extractor.target()) {
            Some(key) => {
                let record = SiteRecord {
                    address: address.clone(),
                    site_key: key,
                    content_type: response.content_type,
                    body: response.body,
                };
                match self.archiver.archive(record, parsed.assets.iter().cloned()).await {
                    Ok(site) => {
                        tracing::info!(
                            "Archived {} as {}/{}",
                            address,
                            site.site_key,
                            site.document
                        );
                        self.run.record_site(site);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to archive {}: {}", address, e);
                        failure = Some(FailureKind::Storage);
                    }
                }
            }
            None => {
                tracing::warn!("No site key for {}", address);
                failure = Some(FailureKind::Storage);
            }
        }
        if address != item.address {
            self.run.visited.mark_done(&address);
        }

        let discovered = self.enqueue_links(&item, parsed.links);
        self.finish(item, history, failure, discovered, parsed.title)
    }

    /// Canonical in-target address a fetch ended at, if it differs from the request
    fn redirect_target(&self, requested: &Url, final_url: &Url) -> Option<Url> {
        if final_url == requested {
            return None;
        }
        let target = self.extractor.target();
        if !target.accepts(final_url) {
            tracing::warn!("{} redirected outside the target to {}", requested, final_url);
            return None;
        }
        canonicalize_url(final_url.clone(), target)
            .ok()
            .filter(|canonical| canonical != requested)
    }

    fn enqueue_links(&self, item: &WorkItem, links: std::collections::BTreeSet<Url>) -> usize {
        if let Some(max_depth) = self.max_depth {
            if item.depth >= max_depth {
                self.run
                    .counters
                    .depth_skipped
                    .fetch_add(links.len(), Ordering::Relaxed);
                return 0;
            }
        }

        let items: Vec<WorkItem> = links
            .into_iter()
            .filter(|link| !self.run.visited.contains(link))
            .map(|link| WorkItem::discovered(link, item))
            .collect();
        let count = items.len();
        if count > 0 {
            tracing::debug!("Queued {} links from {}", count, item.address);
            self.run.frontier.extend(items);
        }
        count
    }

    fn finish(
        &self,
        item: WorkItem,
        mut history: Vec<ItemState>,
        failure: Option<FailureKind>,
        discovered: usize,
        title: Option<String>,
    ) -> ItemReport {
        debug_assert!(history.last().is_some_and(ItemState::is_in_flight));
        self.run.visited.mark_done(&item.address);

        let state = if failure.is_some() {
            self.run.counters.record_failure(failure);
            ItemState::Failed
        } else {
            self.run.counters.succeeded.fetch_add(1, Ordering::Relaxed);
            ItemState::Done
        };
        advance(&mut history, state);

        ItemReport {
            address: item.address,
            state,
            history,
            failure,
            discovered,
            title,
        }
    }
}

/// Bounded dispatcher over the shared frontier
pub struct Scheduler {
    worker: Arc<Worker>,
    run: Arc<CrawlRunState>,
    settings: SchedulerSettings,
}

impl Scheduler {
    /// Creates a scheduler over the given run state
    pub fn new(
        transport: Arc<dyn Transport>,
        extractor: LinkExtractor,
        archiver: Arc<SiteArchiver>,
        run: Arc<CrawlRunState>,
        settings: SchedulerSettings,
    ) -> Self {
        let worker = Arc::new(Worker {
            transport,
            extractor,
            archiver,
            run: Arc::clone(&run),
            max_depth: settings.max_depth,
        });
        Self {
            worker,
            run,
            settings,
        }
    }

    /// The run state this scheduler reads and writes
    pub fn run_state(&self) -> &Arc<CrawlRunState> {
        &self.run
    }

    /// Claims and processes one item on the calling task
    ///
    /// Returns `None` if the claim was refused or the page cap is reached.
    pub async fn process_now(&self, item: WorkItem) -> Option<ItemReport> {
        if self.limit_reached() || !self.claim(&item) {
            return None;
        }
        Some(self.worker.process(item).await)
    }

    /// Runs the pool until the frontier is drained and no worker is busy
    ///
    /// Once `cancel` fires no further item is claimed; items already in flight
    /// run to completion (each is bounded by the transport timeout). Returns
    /// the number of items completed by this call.
    pub async fn run(&self, cancel: &CancellationToken) -> usize {
        let started = Instant::now();
        let pool_size = self.settings.worker_pool_size.max(1);
        let mut workers: JoinSet<ItemReport> = JoinSet::new();
        let mut completed = 0usize;
        let mut stopping = false;

        loop {
            if !cancel.is_cancelled() {
                while workers.len() < pool_size {
                    let Some(item) = self.next_claimed() else {
                        break;
                    };
                    let worker = Arc::clone(&self.worker);
                    workers.spawn(async move { worker.process(item).await });
                }
            }

            // Nothing in flight and nothing claimable: quiescent, capped or stopped
            if workers.is_empty() {
                break;
            }

            tokio::select! {
                joined = workers.join_next() => {
                    if let Some(joined) = joined {
                        completed += 1;
                        self.on_joined(joined);

                        if completed % 10 == 0 {
                            let rate = completed as f64 / started.elapsed().as_secs_f64();
                            tracing::info!(
                                "Progress: {} addresses done, {} of {} queued in frontier, {} in flight, {:.2} sites/sec",
                                self.run.visited.done_count(),
                                self.run.frontier.len(),
                                self.run.frontier.total_pushed(),
                                workers.len(),
                                rate
                            );
                        }
                    }
                }
                _ = cancel.cancelled(), if !stopping => {
                    stopping = true;
                    tracing::info!(
                        "Stop requested, waiting for {} in-flight fetches",
                        workers.len()
                    );
                }
            }
        }

        let dropped = self.run.frontier.clear();
        if dropped > 0 {
            tracing::info!("Dropped {} unclaimed frontier entries", dropped);
            self.run
                .counters
                .dropped
                .fetch_add(dropped, Ordering::Relaxed);
        }

        completed
    }

    /// Pops frontier entries until one is claimed
    fn next_claimed(&self) -> Option<WorkItem> {
        loop {
            if self.limit_reached() {
                return None;
            }
            let item = self.run.frontier.pop()?;
            if self.claim(&item) {
                return Some(item);
            }
        }
    }

    fn claim(&self, item: &WorkItem) -> bool {
        if self.run.visited.claim(&item.address) {
            self.run.counters.claimed.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            tracing::trace!("Already claimed: {}", item.address);
            self.run.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    fn limit_reached(&self) -> bool {
        self.settings
            .max_pages
            .map(|max| self.run.counters.claimed() >= max)
            .unwrap_or(false)
    }

    fn on_joined(&self, joined: Result<ItemReport, JoinError>) {
        match joined {
            Ok(report) => {
                debug_assert!(report.state.is_terminal());
                tracing::trace!(
                    "{} -> {} ({} new links)",
                    report.address,
                    report.state,
                    report.discovered
                );
            }
            Err(e) => {
                tracing::error!("Worker task failed: {}", e);
                self.run.counters.record_failure(None);
            }
        }
    }
}
