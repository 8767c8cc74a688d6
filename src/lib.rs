//! Onion-Harvest: an archiving crawler for proxy-only hidden services
//!
//! This crate crawls seed addresses through an anonymizing SOCKS proxy, follows
//! discovered links transitively, and archives each site's primary document and
//! embedded assets for later offline analysis.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Onion-Harvest setup and teardown operations
///
/// Per-address failures never surface as a `HarvestError`; they are recorded
/// in the crawl summary instead.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Link pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Proxy check failed: {0}")]
    ProxyCheck(String),

    #[error("No usable seed addresses")]
    NoSeeds,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid host suffix: {0}")]
    InvalidSuffix(String),
}

/// URL-specific errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Host {0} is outside the crawl target")]
    OutsideTarget(String),

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Onion-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Coordinator;
pub use output::CrawlSummary;
pub use state::{ItemState, VisitedSet};
pub use url::{canonicalize, site_key, Target};
