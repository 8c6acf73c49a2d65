use super::matcher::matches_wildcard;
use url::Url;

/// Extracts the host from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (which shouldn't happen for valid HTTP(S) URLs), it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ripple_crawl::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the site identity of a URL: its host without a leading `www.`
///
/// Two URLs belong to the same site when their site hosts are equal, so
/// `www.example.com` and `example.com` are treated as one site while
/// `blog.example.com` is a different one.
pub fn site_host(url: &Url) -> Option<String> {
    extract_host(url).map(|host| match host.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => host,
    })
}

/// Returns the `scheme://host[:port]` origin of a URL as a string key
///
/// Politeness state (robots.txt, pacing) is kept per origin so that two
/// services on the same host but different ports are treated separately.
pub fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Classifies `candidate` as internal to the crawl rooted at `seed`
///
/// A link is internal when it has the same site host as the seed, or when its
/// host matches one of the extra wildcard patterns (e.g. `*.example.com`).
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ripple_crawl::url::is_internal;
///
/// let seed = Url::parse("https://example.com/").unwrap();
/// let link = Url::parse("https://www.example.com/about").unwrap();
/// assert!(is_internal(&link, &seed, &[]));
///
/// let blog = Url::parse("https://blog.example.com/").unwrap();
/// assert!(!is_internal(&blog, &seed, &[]));
/// assert!(is_internal(&blog, &seed, &["*.example.com".to_string()]));
/// ```
pub fn is_internal(candidate: &Url, seed: &Url, extra_patterns: &[String]) -> bool {
    let (Some(candidate_site), Some(seed_site)) = (site_host(candidate), site_host(seed)) else {
        return false;
    };

    if candidate_site == seed_site {
        return true;
    }

    let Some(host) = extract_host(candidate) else {
        return false;
    };
    extra_patterns
        .iter()
        .any(|pattern| matches_wildcard(&pattern.to_lowercase(), &host))
}
