use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Onion-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub transport: TransportConfig,
    #[serde(default)]
    pub target: TargetConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub assets: AssetConfig,
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of workers fetching primary documents concurrently
    #[serde(rename = "worker-pool-size", default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// Number of concurrent asset fetches shared by all sites
    #[serde(rename = "asset-pool-size", default = "default_asset_pool_size")]
    pub asset_pool_size: usize,

    /// Wall-clock timeout applied to every request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum link depth from a seed; unset means unbounded
    #[serde(rename = "max-depth", default)]
    pub max_depth: Option<u32>,

    /// Maximum number of addresses claimed in one run; unset means unbounded
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<usize>,

    /// Whether embedded assets are fetched alongside each primary document
    #[serde(rename = "fetch-assets", default = "default_true")]
    pub fetch_assets: bool,
}

/// Upstream proxy and client identity configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Proxy every request is routed through (e.g. socks5h://127.0.0.1:9150)
    #[serde(rename = "proxy-url")]
    pub proxy_url: String,

    /// Client identity string sent as the User-Agent header
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Page fetched by `--check-proxy`
    #[serde(rename = "check-url", default = "default_check_url")]
    pub check_url: String,

    /// Text that must appear in the check page when routed through the proxy
    #[serde(rename = "check-marker", default = "default_check_marker")]
    pub check_marker: String,
}

/// Which addresses belong to the crawl
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Accepted URL schemes
    #[serde(default = "default_schemes")]
    pub schemes: Vec<String>,

    /// Required host suffix (e.g. ".onion")
    #[serde(rename = "host-suffix", default = "default_host_suffix")]
    pub host_suffix: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            schemes: default_schemes(),
            host_suffix: default_host_suffix(),
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Filesystem,
    Sqlite,
}

/// What to do when a site's primary document already exists in the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecrawlPolicy {
    /// Replace the stored primary document
    Overwrite,
    /// Keep the stored primary document untouched
    Skip,
    /// Store a new timestamped copy next to the existing one
    Version,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Root directory of the filesystem archive
    #[serde(rename = "archive-dir", default = "default_archive_dir")]
    pub archive_dir: String,

    /// Path to the SQLite blob archive
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,

    #[serde(rename = "recrawl-policy", default = "default_recrawl_policy")]
    pub recrawl_policy: RecrawlPolicy,

    /// Optional markdown report written after each run
    #[serde(rename = "report-path", default)]
    pub report_path: Option<String>,
}

/// Accepted asset content types and the file extension each is stored under
#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    #[serde(rename = "content-types", default = "default_content_types")]
    pub content_types: BTreeMap<String, String>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            content_types: default_content_types(),
        }
    }
}

fn default_worker_pool_size() -> usize {
    5
}

fn default_asset_pool_size() -> usize {
    15
}

fn default_request_timeout_secs() -> u64 {
    25
}

fn default_true() -> bool {
    true
}

fn default_check_url() -> String {
    "https://check.torproject.org/".to_string()
}

fn default_check_marker() -> String {
    "Congratulations".to_string()
}

fn default_schemes() -> Vec<String> {
    vec!["http".to_string(), "https".to_string()]
}

fn default_host_suffix() -> String {
    ".onion".to_string()
}

fn default_backend() -> StorageBackend {
    StorageBackend::Filesystem
}

fn default_archive_dir() -> String {
    "scan".to_string()
}

fn default_database_path() -> String {
    "archive.db".to_string()
}

fn default_recrawl_policy() -> RecrawlPolicy {
    RecrawlPolicy::Overwrite
}

fn default_content_types() -> BTreeMap<String, String> {
    [
        ("text/html", "html"),
        ("application/javascript", "js"),
        ("text/javascript", "js"),
        ("text/css", "css"),
        ("image/png", "png"),
        ("image/jpeg", "jpg"),
        ("image/gif", "gif"),
        ("image/webp", "webp"),
        ("image/svg+xml", "svg"),
    ]
    .into_iter()
    .map(|(mime, ext)| (mime.to_string(), ext.to_string()))
    .collect()
}
