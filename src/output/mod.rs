//! Output module for crawl summaries and reports
//!
//! This module handles:
//! - The aggregate `CrawlSummary` returned by every run
//! - Printing the summary to the console
//! - Writing a markdown run report

mod markdown;
mod summary;

pub use markdown::{format_markdown_report, generate_markdown_report};
pub use summary::{print_summary, CrawlSummary};
