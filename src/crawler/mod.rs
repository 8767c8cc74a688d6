//! Crawler module for fetching and archiving hidden services
//!
//! This module contains the core crawling logic, including:
//! - Proxy-only fetching with typed failures
//! - Link and asset extraction
//! - The shared frontier and bounded worker pool
//! - Site archiving with a shared asset pool
//! - Overall run coordination

mod archiver;
mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod scheduler;

pub use archiver::{
    document_stem, ArchivedSite, ArchiverSettings, AssetTotals, SiteArchiver, SiteRecord,
};
pub use coordinator::{run_crawl, Coordinator};
pub use fetcher::{
    check_proxy, mime_essence, FetchOutcome, FetchResponse, HttpTransport, Transport,
    TransportFailure,
};
pub use frontier::{Frontier, WorkItem};
pub use parser::{LinkExtractor, ParsedPage};
pub use scheduler::{
    CrawlRunState, ItemReport, RunCounters, RunTotals, Scheduler, SchedulerSettings,
};
