use crate::config::types::{
    AssetConfig, Config, CrawlerConfig, OutputConfig, StorageBackend, TargetConfig,
    TransportConfig,
};
use crate::ConfigError;
use url::Url;

/// Proxy schemes reqwest can route through; there is no direct mode
const PROXY_SCHEMES: &[&str] = &["socks5h", "socks5", "socks4a", "socks4", "http", "https"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_transport_config(&config.transport)?;
    validate_target_config(&config.target)?;
    validate_output_config(&config.output)?;
    validate_asset_config(&config.assets)?;
    validate_seeds(&config.seeds, &config.target)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.worker_pool_size < 1 || config.worker_pool_size > 64 {
        return Err(ConfigError::Validation(format!(
            "worker_pool_size must be between 1 and 64, got {}",
            config.worker_pool_size
        )));
    }

    if config.asset_pool_size < 1 || config.asset_pool_size > 128 {
        return Err(ConfigError::Validation(format!(
            "asset_pool_size must be between 1 and 128, got {}",
            config.asset_pool_size
        )));
    }

    if config.request_timeout_secs < 1 || config.request_timeout_secs > 600 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be between 1 and 600, got {}",
            config.request_timeout_secs
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates proxy and identity configuration
fn validate_transport_config(config: &TransportConfig) -> Result<(), ConfigError> {
    let proxy = Url::parse(&config.proxy_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy_url: {}", e)))?;

    if !PROXY_SCHEMES.contains(&proxy.scheme()) {
        return Err(ConfigError::Validation(format!(
            "proxy_url scheme must be one of {:?}, got '{}'",
            PROXY_SCHEMES,
            proxy.scheme()
        )));
    }

    if proxy.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "proxy_url '{}' has no host",
            config.proxy_url
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.check_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid check_url: {}", e)))?;

    Ok(())
}

/// Validates the crawl target
fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    if config.schemes.is_empty() {
        return Err(ConfigError::Validation(
            "target schemes cannot be empty".to_string(),
        ));
    }

    for scheme in &config.schemes {
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            return Err(ConfigError::Validation(format!(
                "target scheme must be http or https, got '{}'",
                scheme
            )));
        }
    }

    validate_host_suffix(&config.host_suffix)
}

/// Validates a host suffix such as ".onion" or ".example.onion"
fn validate_host_suffix(suffix: &str) -> Result<(), ConfigError> {
    let Some(labels) = suffix.strip_prefix('.') else {
        return Err(ConfigError::InvalidSuffix(format!(
            "Host suffix '{}' must start with '.'",
            suffix
        )));
    };

    if labels.split('.').any(str::is_empty) {
        return Err(ConfigError::InvalidSuffix(format!(
            "Host suffix '{}' is not a valid domain suffix",
            suffix
        )));
    }

    if !labels
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidSuffix(format!(
            "Host suffix '{}' contains invalid characters",
            suffix
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    match config.backend {
        StorageBackend::Filesystem if config.archive_dir.is_empty() => Err(
            ConfigError::Validation("archive_dir cannot be empty".to_string()),
        ),
        StorageBackend::Sqlite if config.database_path.is_empty() => Err(
            ConfigError::Validation("database_path cannot be empty".to_string()),
        ),
        _ => Ok(()),
    }
}

/// Validates the accepted asset content types
fn validate_asset_config(config: &AssetConfig) -> Result<(), ConfigError> {
    for (mime, ext) in &config.content_types {
        if !mime.contains('/') {
            return Err(ConfigError::Validation(format!(
                "Asset content type '{}' is not a MIME type",
                mime
            )));
        }

        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Validation(format!(
                "Asset extension '{}' for '{}' must be alphanumeric",
                ext, mime
            )));
        }
    }

    Ok(())
}

/// Validates seed URLs
fn validate_seeds(seeds: &[String], target: &TargetConfig) -> Result<(), ConfigError> {
    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        let in_target = target
            .schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(url.scheme()));
        if !in_target {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' uses a scheme outside the target",
                seed
            )));
        }
    }

    Ok(())
}
