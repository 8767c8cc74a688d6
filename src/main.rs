//! Onion-Harvest main entry point
//!
//! This is the command-line interface for the Onion-Harvest crawler.

use clap::Parser;
use onion_harvest::config::{load_config_with_hash, Config};
use onion_harvest::crawler::{check_proxy, Coordinator, HttpTransport};
use onion_harvest::output::{generate_markdown_report, print_summary};
use onion_harvest::storage::open_store;
use onion_harvest::url::Target;
use onion_harvest::HarvestError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Onion-Harvest: an archiving crawler for hidden services
///
/// Onion-Harvest crawls seed addresses through an anonymizing SOCKS proxy,
/// follows the links it finds, and archives each site's primary document and
/// embedded assets.
#[derive(Parser, Debug)]
#[command(name = "onion-harvest")]
#[command(version)]
#[command(about = "An archiving crawler for proxy-only hidden services", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Seed address; repeat to give several. Replaces the configured seeds
    #[arg(long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Verify that traffic leaves through the proxy before crawling
    #[arg(long, conflicts_with = "dry_run")]
    check_proxy: bool,

    /// Write a markdown run report to this path (overrides output.report-path)
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(HarvestError::from(e).into());
        }
    };

    if !cli.seeds.is_empty() {
        config.seeds = cli.seeds.clone();
    }

    if cli.dry_run {
        handle_dry_run(&config)
    } else {
        let report_path = cli
            .report
            .clone()
            .or_else(|| config.output.report_path.as_ref().map(PathBuf::from));
        handle_crawl(config, config_hash, cli.check_proxy, report_path.as_deref()).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("onion_harvest=info,warn"),
            1 => EnvFilter::new("onion_harvest=debug,info"),
            2 => EnvFilter::new("onion_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Onion-Harvest Dry Run ===\n");

    let crawler = &config.crawler;
    println!("Crawler Configuration:");
    println!("  Worker pool size: {}", crawler.worker_pool_size);
    println!("  Asset pool size: {}", crawler.asset_pool_size);
    println!("  Request timeout: {}s", crawler.request_timeout_secs);
    println!("  Max depth: {}", describe_limit(crawler.max_depth));
    println!("  Max pages: {}", describe_limit(crawler.max_pages));
    println!("  Fetch assets: {}", crawler.fetch_assets);

    println!("\nTransport:");
    println!("  Proxy: {}", config.transport.proxy_url);
    println!("  User agent: {}", config.transport.user_agent);

    println!("\nTarget:");
    println!("  Schemes: {}", config.target.schemes.join(", "));
    println!("  Host suffix: {}", config.target.host_suffix);

    println!("\nOutput:");
    println!("  Backend: {:?}", config.output.backend);
    println!("  Archive directory: {}", config.output.archive_dir);
    println!("  Database: {}", config.output.database_path);
    println!("  Re-crawl policy: {:?}", config.output.recrawl_policy);

    let target = Target::from(&config.target);
    let mut usable = 0;
    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        match onion_harvest::url::canonicalize(seed, &target) {
            Ok(url) => {
                usable += 1;
                println!("  - {}", url);
            }
            Err(e) => println!("  ! {} ({})", seed, e),
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling with {} seed addresses", usable);

    Ok(())
}

fn describe_limit<T: std::fmt::Display>(limit: Option<T>) -> String {
    limit
        .map(|l| l.to_string())
        .unwrap_or_else(|| "unbounded".to_string())
}

/// Verifies the proxy by fetching the check page through it
async fn handle_check_proxy(
    transport: &HttpTransport,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let check_url = Url::parse(&config.transport.check_url).map_err(HarvestError::from)?;
    tracing::info!(
        "Checking proxy with {} (timeout {}s)",
        check_url,
        transport.timeout().as_secs()
    );

    match check_proxy(transport, &check_url, &config.transport.check_marker).await {
        Ok(true) => {
            println!("✓ Proxy check passed: traffic leaves through the proxy");
            Ok(())
        }
        Ok(false) => Err(HarvestError::ProxyCheck(format!(
            "'{}' not found at {}",
            config.transport.check_marker, check_url
        ))
        .into()),
        Err(failure) => Err(HarvestError::ProxyCheck(failure.to_string()).into()),
    }
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: String,
    check: bool,
    report_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let timeout = Duration::from_secs(config.crawler.request_timeout_secs);
    let transport = HttpTransport::new(&config.transport, timeout).map_err(HarvestError::from)?;

    if check {
        handle_check_proxy(&transport, &config).await?;
    }

    let store = open_store(&config.output).map_err(HarvestError::from)?;
    let seeds = config.seeds.clone();
    let coordinator = Coordinator::with_components(config, Arc::new(transport), store)
        .with_config_hash(config_hash);

    // Ctrl-C stops new claims; in-flight fetches finish or time out
    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing in-flight fetches");
            cancel.cancel();
        }
    });

    let summary = match coordinator.run(&seeds).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    print_summary(&summary);

    if let Some(path) = report_path {
        generate_markdown_report(&summary, path).map_err(HarvestError::from)?;
        println!("\n✓ Report written to: {}", path.display());
    }

    Ok(())
}
