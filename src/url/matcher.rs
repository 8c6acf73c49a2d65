/// Checks if a host matches an `internal-hosts` pattern
///
/// Two pattern shapes are understood:
/// - `example.com` matches only that host
/// - `*.example.com` matches the bare host and any subdomain at any depth
///
/// Comparison ignores ASCII case; hosts coming out of the normalizer are
/// already lowercase but patterns come straight from the config file.
///
/// # Examples
///
/// ```
/// use ripple_crawl::url::matches_wildcard;
///
/// assert!(matches_wildcard("Example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "notexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.trim().to_ascii_lowercase();
    let candidate = candidate.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) if !base.is_empty() => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        Some(_) => false,
        None => !pattern.is_empty() && candidate == pattern,
    }
}
