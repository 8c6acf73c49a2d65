use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default user agent sent with every request and matched against robots.txt
pub const DEFAULT_USER_AGENT: &str = concat!(
    "ripple-crawl/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/ripple-crawl/ripple-crawl)"
);

/// Main configuration file structure for Ripple-Crawl
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
///
/// Every field has a default, so an empty `[crawler]` table (or none at all)
/// yields a usable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CrawlConfig {
    /// Maximum link-following depth from the seed URL
    pub max_depth: u32,

    /// Hard cap on total pages fetched (successes plus failures)
    pub max_pages: usize,

    /// Simultaneous in-flight fetches
    pub max_concurrency: usize,

    /// Minimum time between requests to the same host (milliseconds)
    pub per_host_delay_ms: u64,

    /// Whether links to other hosts are enqueued
    pub follow_external_links: bool,

    /// Whether robots.txt rules are enforced
    pub respect_robots: bool,

    /// Identifier sent with every request and matched against robots rules
    pub user_agent: String,

    /// Maximum new crawl candidates taken from a single page
    pub max_links_per_page: usize,

    /// Response bodies larger than this are truncated and marked as errors
    pub max_body_bytes: usize,

    /// Total per-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    pub connect_timeout_secs: u64,

    /// Optional wall-clock deadline for the whole crawl (seconds)
    pub crawl_timeout_secs: Option<u64>,

    /// Whether sitemap.xml and friends are consulted for seed URLs
    pub use_sitemap: bool,

    /// Extra host patterns treated as internal (e.g. "*.example.com")
    pub internal_hosts: Vec<String>,

    /// Path keywords that raise the priority of discovered links
    pub priority_keywords: Vec<String>,

    /// Priority added per matching keyword
    pub keyword_boost: i32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_pages: 100,
            max_concurrency: 5,
            per_host_delay_ms: 500,
            follow_external_links: false,
            respect_robots: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_links_per_page: 10,
            max_body_bytes: 50 * 1024 * 1024,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            crawl_timeout_secs: None,
            use_sitemap: true,
            internal_hosts: Vec::new(),
            priority_keywords: Vec::new(),
            keyword_boost: 10,
        }
    }
}

impl CrawlConfig {
    pub fn per_host_delay(&self) -> Duration {
        Duration::from_millis(self.per_host_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn crawl_timeout(&self) -> Option<Duration> {
        self.crawl_timeout_secs.map(Duration::from_secs)
    }
}

/// Output configuration
///
/// Each configured path enables one result sink.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct OutputConfig {
    /// Path of the JSON report file
    pub json_path: Option<String>,

    /// Path of the markdown summary file
    pub summary_path: Option<String>,

    /// Path to the SQLite database file
    pub database_path: Option<String>,
}
