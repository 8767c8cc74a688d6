//! Markdown run report
//!
//! This module writes a human-readable markdown report of one crawl run,
//! including totals, failure breakdown and the archived site list.

use crate::output::summary::CrawlSummary;
use crate::state::FailureKind;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Maximum number of archived sites listed in the report
const MAX_LISTED_SITES: usize = 200;

/// Writes the markdown report for a run
///
/// # Arguments
///
/// * `summary` - The run summary
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(std::io::Error)` - Failed to create or write the file
pub fn generate_markdown_report(summary: &CrawlSummary, output_path: &Path) -> std::io::Result<()> {
    let markdown = format_markdown_report(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_report(summary: &CrawlSummary) -> String {
    let mut md = String::new();

    md.push_str("# Onion-Harvest Crawl Report\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", summary.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", summary.finished_at.to_rfc3339()));
    let seconds = summary.elapsed.as_secs_f64();
    md.push_str(&format!(
        "- **Duration**: {:.0} seconds ({:.2} minutes)\n",
        seconds,
        seconds / 60.0
    ));
    md.push_str(&format!("- **Status**: {}\n", summary.status()));
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    // Totals
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Claimed**: {}\n", summary.claimed));
    md.push_str(&format!("- **Succeeded**: {}\n", summary.succeeded));
    md.push_str(&format!("- **Failed**: {}\n", summary.failed));
    md.push_str(&format!(
        "- **Duplicate Claims Skipped**: {}\n",
        summary.duplicates
    ));
    md.push_str(&format!(
        "- **Links Beyond Max Depth**: {}\n",
        summary.depth_skipped
    ));
    md.push_str(&format!("- **Left In Frontier**: {}\n", summary.dropped));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        summary.success_rate()
    ));

    if summary.failed > 0 {
        md.push_str("## Failure Breakdown\n\n");
        md.push_str("| Kind | Count |\n");
        md.push_str("|------|-------|\n");
        for kind in FailureKind::all() {
            md.push_str(&format!("| {} | {} |\n", kind, summary.failures_of(kind)));
        }
        md.push('\n');
    }

    md.push_str("## Assets\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Stored | {} |\n", summary.assets.stored));
    md.push_str(&format!("| Skipped | {} |\n", summary.assets.skipped));
    md.push_str(&format!("| Failed | {} |\n\n", summary.assets.failed));

    if !summary.sites.is_empty() {
        md.push_str("## Archived Sites\n\n");
        md.push_str("| Address | Site Key | Document | Location |\n");
        md.push_str("|---------|----------|----------|----------|\n");
        for site in summary.sites.iter().take(MAX_LISTED_SITES) {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                site.address, site.site_key, site.document, site.location
            ));
        }
        if summary.sites.len() > MAX_LISTED_SITES {
            md.push_str(&format!(
                "\n... and {} more\n",
                summary.sites.len() - MAX_LISTED_SITES
            ));
        }
        md.push('\n');
    }

    md
}
