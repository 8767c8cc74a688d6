//! Run summary and console output

use crate::crawler::{ArchivedSite, AssetTotals};
use crate::state::FailureKind;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// Aggregate result of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,

    /// True if the run was stopped before reaching quiescence
    pub cancelled: bool,

    /// SHA-256 of the configuration file, when known
    pub config_hash: Option<String>,

    /// Addresses claimed (and therefore dispatched) during the run
    pub claimed: usize,

    /// Claimed addresses fetched and archived
    pub succeeded: usize,

    /// Claimed addresses that ended in failure
    pub failed: usize,

    /// Failure counts by kind
    pub failures: BTreeMap<FailureKind, usize>,

    /// Frontier entries skipped because their address was already claimed
    pub duplicates: usize,

    /// Links not queued because of `max-depth`
    pub depth_skipped: usize,

    /// Frontier entries left unclaimed at stop or at `max-pages`
    pub dropped: usize,

    pub assets: AssetTotals,

    /// Archived sites ordered by address
    pub sites: Vec<ArchivedSite>,
}

impl CrawlSummary {
    /// Number of failures of one kind
    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    /// Returns the success rate as a percentage of claimed addresses
    pub fn success_rate(&self) -> f64 {
        if self.claimed == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / self.claimed as f64) * 100.0
    }

    /// Human-readable run status
    pub fn status(&self) -> &'static str {
        if self.cancelled {
            "stopped"
        } else {
            "completed"
        }
    }
}

/// Prints the summary to stdout in a formatted manner
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Run:");
    println!("  Started:  {}", summary.started_at.to_rfc3339());
    println!("  Finished: {}", summary.finished_at.to_rfc3339());
    println!("  Elapsed:  {:.1}s", summary.elapsed.as_secs_f64());
    println!("  Status:   {}", summary.status());
    println!();

    println!("Sites:");
    println!("  Claimed:   {}", summary.claimed);
    println!("  Succeeded: {}", summary.succeeded);
    println!("  Failed:    {}", summary.failed);
    println!("  Duplicate claims skipped: {}", summary.duplicates);
    if summary.depth_skipped > 0 {
        println!("  Links beyond max depth:   {}", summary.depth_skipped);
    }
    if summary.dropped > 0 {
        println!("  Left in frontier:         {}", summary.dropped);
    }
    println!();

    if summary.failed > 0 {
        println!("Failures:");
        for kind in FailureKind::all() {
            let count = summary.failures_of(kind);
            if count > 0 {
                println!("  {}: {}", kind, count);
            }
        }
        println!();
    }

    println!("Assets:");
    println!("  Stored:  {}", summary.assets.stored);
    println!("  Skipped: {}", summary.assets.skipped);
    println!("  Failed:  {}", summary.assets.failed);
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} sites archived)",
        summary.success_rate(),
        summary.succeeded,
        summary.claimed
    );
}
