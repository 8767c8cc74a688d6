//! Configuration module for Onion-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use onion_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Crawler will use {} workers", config.crawler.worker_pool_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AssetConfig, Config, CrawlerConfig, OutputConfig, RecrawlPolicy, StorageBackend,
    TargetConfig, TransportConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
