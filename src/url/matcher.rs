/// Checks if a host ends with a target suffix
///
/// The comparison is case-insensitive and a trailing root dot on the host is
/// ignored. The host must have at least one label in front of the suffix, so
/// the bare suffix itself never matches.
///
/// # Examples
///
/// ```
/// use onion_harvest::url::matches_suffix;
///
/// assert!(matches_suffix("alpha.onion", ".onion"));
/// assert!(matches_suffix("Alpha.Example.ONION", ".onion"));
/// assert!(matches_suffix("alpha.onion.", ".onion"));
/// assert!(!matches_suffix("onion", ".onion"));
/// assert!(!matches_suffix("alphaonion", ".onion"));
/// assert!(!matches_suffix("alpha.onion.com", ".onion"));
/// ```
pub fn matches_suffix(host: &str, suffix: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host).to_lowercase();
    let suffix = suffix.to_lowercase();

    if host.len() <= suffix.len() || !host.ends_with(&suffix) {
        return false;
    }

    // The part in front of the suffix must be a non-empty label sequence
    let prefix = &host[..host.len() - suffix.len()];
    !prefix.ends_with('.')
}
