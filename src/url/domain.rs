use crate::url::Target;
use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use onion_harvest::url::extract_host;
///
/// let url = Url::parse("http://ALPHA.onion/path").unwrap();
/// assert_eq!(extract_host(&url), Some("alpha.onion".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Derives the stable archive key for the site an address belongs to
///
/// The key is the host with the target suffix removed, plus `-<port>` when the
/// address uses a non-default port. Every character outside `[a-z0-9.-]` is
/// replaced with `_`, so the key is always safe as a directory name. Repeated
/// runs against the same host therefore target the same archive location.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use onion_harvest::url::{site_key, Target};
///
/// let target = Target::onion();
/// let url = Url::parse("http://alpha.example.onion/index").unwrap();
/// assert_eq!(site_key(&url, &target), Some("alpha.example".to_string()));
/// ```
pub fn site_key(url: &Url, target: &Target) -> Option<String> {
    let host = extract_host(url)?;
    let stem = host.strip_suffix(target.host_suffix()).unwrap_or(&host);

    let mut key: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if let Some(port) = url.port() {
        key.push_str(&format!("-{}", port));
    }

    // Never produce "", "." or ".." as a directory name
    if key.trim_matches('.').is_empty() {
        return None;
    }

    Some(key)
}
