//! URL handling module for Onion-Harvest
//!
//! This module provides address canonicalization, site key derivation, and the
//! crawl target filter that decides which addresses belong to the crawl.

mod domain;
mod matcher;
mod normalize;

use crate::config::TargetConfig;
use url::Url;

// Re-export main functions
pub use domain::{extract_host, site_key};
pub use matcher::matches_suffix;
pub use normalize::{canonicalize, canonicalize_url};

/// The set of addresses a crawl is allowed to visit
///
/// An address is inside the target when its scheme is one of `schemes` and its
/// host ends with `host_suffix` (with at least one label in front of it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    schemes: Vec<String>,
    host_suffix: String,
}

impl Target {
    /// Creates a target from explicit schemes and a host suffix
    pub fn new(schemes: Vec<String>, host_suffix: &str) -> Self {
        Self {
            schemes: schemes.into_iter().map(|s| s.to_lowercase()).collect(),
            host_suffix: host_suffix.to_lowercase(),
        }
    }

    /// The default hidden-service target: http/https hosts ending in `.onion`
    pub fn onion() -> Self {
        Self::new(vec!["http".to_string(), "https".to_string()], ".onion")
    }

    /// Accepted URL schemes
    pub fn schemes(&self) -> &[String] {
        &self.schemes
    }

    /// Required host suffix, lowercase, including its leading dot
    pub fn host_suffix(&self) -> &str {
        &self.host_suffix
    }

    /// Returns true if the scheme belongs to the target
    pub fn accepts_scheme(&self, scheme: &str) -> bool {
        self.schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme))
    }

    /// Returns true if the URL's scheme and host both belong to the target
    pub fn accepts(&self, url: &Url) -> bool {
        self.accepts_scheme(url.scheme())
            && url
                .host_str()
                .map(|host| matches_suffix(host, &self.host_suffix))
                .unwrap_or(false)
    }
}

impl From<&TargetConfig> for Target {
    fn from(config: &TargetConfig) -> Self {
        Self::new(config.schemes.clone(), &config.host_suffix)
    }
}
