//! Page fetcher
//!
//! Fetches one task per call through the shared [`Politeness`] layer and
//! classifies the outcome. Redirects are followed hop by hop: every hop waits
//! for its host's slot and must be allowed by robots.txt. The fetcher never
//! retries; that decision belongs to the crawl task.

use crate::config::CrawlConfig;
use crate::crawler::frontier::CrawlTask;
use crate::crawler::parser::DiscoveredLink;
use crate::crawler::transport::{redirect_target, TransportError, MAX_REDIRECTS};
use crate::robots::Politeness;
use crate::FetchError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Outcome class of a fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    /// 2xx response with a complete body
    Success,

    /// Non-2xx response, or a body over the size limit
    HttpError,

    /// Connection, DNS, TLS or protocol failure
    NetworkError,

    /// The request did not finish within the timeout
    Timeout,

    /// Not fetched because robots.txt disallows it (or a redirect target)
    SkippedByPolicy,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::HttpError => "http_error",
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::SkippedByPolicy => "skipped_by_policy",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Counted against `pages_failed`
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::HttpError | Self::NetworkError | Self::Timeout)
    }
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of fetching one crawl task
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The URL that was requested
    pub url: Url,

    /// URL after redirects (equal to `url` when nothing was received); for
    /// a redirect into a disallowed path, the disallowed target
    pub final_url: Url,

    pub status: FetchStatus,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,

    /// Response body for successful fetches
    pub body: Option<Vec<u8>>,

    /// Time taken by the last attempt, redirect hops and their pacing included
    pub elapsed: Duration,

    pub depth: u32,
    pub timestamp: DateTime<Utc>,

    /// Number of fetch attempts made (0 when robots.txt blocked the URL itself)
    pub attempts: u32,

    pub error: Option<FetchError>,

    /// Links found on the page (successful HTML pages only)
    pub links: Vec<DiscoveredLink>,
}

impl FetchResult {
    /// Result for a URL that robots.txt does not allow
    pub fn skipped_by_policy(task: &CrawlTask) -> Self {
        Self {
            url: task.url().clone(),
            final_url: task.url().clone(),
            status: FetchStatus::SkippedByPolicy,
            status_code: None,
            content_type: None,
            body: None,
            elapsed: Duration::ZERO,
            depth: task.depth(),
            timestamp: Utc::now(),
            attempts: 0,
            error: Some(FetchError::PolicyBlocked),
            links: Vec::new(),
        }
    }

    /// Result for a URL whose redirect chain leads somewhere robots.txt forbids
    pub fn redirect_blocked(task: &CrawlTask, target: Url) -> Self {
        Self {
            final_url: target,
            attempts: 1,
            ..Self::skipped_by_policy(task)
        }
    }

    /// Body bytes received (including truncated bodies of oversized responses)
    pub fn body_len(&self) -> usize {
        self.body.as_ref().map_or(0, Vec::len)
    }

    /// Whether links should be extracted from this result
    ///
    /// Only successful responses whose content type mentions HTML (or that
    /// declare no content type at all) are parsed.
    pub fn is_html(&self) -> bool {
        self.status.is_success()
            && self
                .content_type
                .as_deref()
                .map_or(true, |ct| ct.to_ascii_lowercase().contains("html"))
    }
}

/// Issues page requests on behalf of crawl tasks
#[derive(Clone)]
pub struct Fetcher {
    politeness: Arc<Politeness>,
    request_timeout: Duration,
    max_body_bytes: usize,
}

impl Fetcher {
    pub fn new(politeness: Arc<Politeness>, config: &CrawlConfig) -> Self {
        Self {
            politeness,
            request_timeout: config.request_timeout(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Fetches the task's URL once, following redirects
    ///
    /// Returns None when the crawl is cancelled before the request (or the
    /// next redirect hop) is sent. A redirect to a URL robots.txt disallows
    /// ends the fetch with `SkippedByPolicy`.
    ///
    /// # Classification
    ///
    /// | Outcome | Status |
    /// |---------|--------|
    /// | 2xx, body within limit | Success |
    /// | Any other HTTP status | HttpError (`FetchError::Http`) |
    /// | Body over `max-body-bytes` | HttpError (`FetchError::SizeLimitExceeded`) |
    /// | Redirect into a disallowed path | SkippedByPolicy |
    /// | Timeout | Timeout |
    /// | Anything else, including too many redirects | NetworkError |
    pub async fn fetch(&self, task: &CrawlTask) -> Option<FetchResult> {
        let url = task.url();
        tracing::debug!("Fetching {} (depth {})", url, task.depth());

        let started = Instant::now();
        let mut current = url.clone();
        let mut redirects = 0;
        let outcome = loop {
            let outcome = self
                .politeness
                .send(&current, self.request_timeout, self.max_body_bytes)
                .await?;
            let next = outcome.as_ref().ok().and_then(|r| redirect_target(r, &current));
            let Some(next) = next else {
                break outcome;
            };

            redirects += 1;
            if redirects > MAX_REDIRECTS {
                break Err(TransportError::Network(format!("more than {} redirects", MAX_REDIRECTS)));
            }
            if !self.politeness.check(&next).await {
                tracing::debug!("{} redirects to {}, which robots.txt disallows", url, next);
                return Some(FetchResult::redirect_blocked(task, next));
            }
            tracing::debug!("{} redirected to {}", current, next);
            current = next;
        };
        let elapsed = started.elapsed();

        let mut result = FetchResult {
            url: url.clone(),
            final_url: current,
            status: FetchStatus::NetworkError,
            status_code: None,
            content_type: None,
            body: None,
            elapsed,
            depth: task.depth(),
            timestamp: Utc::now(),
            attempts: 1,
            error: None,
            links: Vec::new(),
        };

        match outcome {
            Ok(response) => {
                result.status_code = Some(response.status);
                result.content_type = response.content_type;

                if response.truncated {
                    result.status = FetchStatus::HttpError;
                    result.error = Some(FetchError::SizeLimitExceeded {
                        limit: self.max_body_bytes,
                    });
                    result.body = Some(response.body);
                } else if (200..300).contains(&response.status) {
                    result.status = FetchStatus::Success;
                    result.body = Some(response.body);
                } else {
                    result.status = FetchStatus::HttpError;
                    result.error = Some(FetchError::Http(response.status));
                }
            }
            Err(TransportError::Timeout) => {
                result.status = FetchStatus::Timeout;
                result.error = Some(FetchError::Timeout);
            }
            Err(TransportError::Network(msg)) => {
                result.status = FetchStatus::NetworkError;
                result.error = Some(FetchError::Network(msg));
            }
        }

        tracing::debug!(
            "{} -> {} in {:?}",
            url,
            result.status_code.map_or_else(|| result.status.to_string(), |c| c.to_string()),
            elapsed
        );
        Some(result)
    }
}
