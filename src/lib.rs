//! Ripple-Crawl: a polite single-site crawl engine
//!
//! This crate discovers and fetches pages within a site under a depth and page
//! budget, respecting robots.txt, consuming sitemaps, bounding concurrency and
//! avoiding duplicate fetches. Fetched pages are handed to a pluggable
//! [`processor::PageProcessor`] and the final [`output::CrawlReport`] to a
//! pluggable [`output::ResultSink`].

pub mod config;
pub mod crawler;
pub mod output;
pub mod processor;
pub mod robots;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Ripple-Crawl operations
///
/// Only setup problems surface as errors. Anything that goes wrong with an
/// individual page is recorded in the crawl report instead.
#[derive(Debug, Error)]
pub enum RippleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-page fetch failures
///
/// These never propagate to the caller; they are stored on the page's
/// [`crawler::FetchResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("Disallowed by robots.txt")]
    PolicyBlocked,

    #[error("Response body exceeded {limit} bytes")]
    SizeLimitExceeded { limit: usize },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Returns true for the failure kinds the coordinator may retry once
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
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

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Ripple-Crawl operations
pub type Result<T> = std::result::Result<T, RippleError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, CrawlConfig};
pub use crawler::{crawl_website, Crawler, CrawlTask, FetchResult, FetchStatus, TaskSource};
pub use output::{CrawlReport, ReportStatus, ResultSink};
pub use processor::{PageProcessor, ProcessedRecord};
pub use crate::url::{is_internal, normalize};
