//! Crawl report model and builder
//!
//! The [`ReportBuilder`] accumulates per-page results and counters while the
//! crawl runs; [`ReportBuilder::finish`] freezes them into an immutable
//! [`CrawlReport`].

use crate::crawler::{DiscoveredLink, FetchResult, FetchStatus, TaskSource};
use crate::processor::ProcessedRecord;
use crate::FetchError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// Final status of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// The frontier was exhausted
    Completed,

    /// Stopped early by the page budget, cancellation or the deadline
    CompletedPartial,

    /// The seed URL could not be reached
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::CompletedPartial => "completed_partial",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One attempted page, without its body
#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    pub url: Url,
    pub final_url: Url,
    pub source: TaskSource,
    pub status: FetchStatus,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub depth: u32,
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub bytes: usize,
    pub fetched_at: DateTime<Utc>,
    pub error: Option<FetchError>,
    pub links: Vec<DiscoveredLink>,
    pub record: Option<ProcessedRecord>,
}

/// Counters kept while crawling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    /// Pages fetched with a 2xx response
    pub pages_fetched: u64,

    /// Pages that ended in an HTTP, network or timeout error
    pub pages_failed: u64,

    /// Pages never fetched because robots.txt disallows them
    pub pages_skipped: u64,

    /// Body bytes received
    pub bytes_fetched: u64,

    /// Second attempts made after network errors or timeouts
    pub retries: u64,

    /// Distinct links seen across all pages
    pub links_discovered: u64,

    /// Of those, links pointing off-site
    pub external_links: u64,

    /// Pages per depth
    pub depth_breakdown: BTreeMap<u32, u64>,
}

impl CrawlStats {
    /// Pages that count against the page budget
    pub fn pages_attempted(&self) -> u64 {
        self.pages_fetched + self.pages_failed
    }

    /// Returns the success rate as a percentage of attempted pages
    pub fn success_rate(&self) -> f64 {
        let attempted = self.pages_attempted();
        if attempted == 0 {
            return 0.0;
        }
        (self.pages_fetched as f64 / attempted as f64) * 100.0
    }
}

/// Immutable summary of a finished crawl
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub status: ReportStatus,
    pub cancelled: bool,
    pub start_url: Url,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub stats: CrawlStats,

    /// Tasks still queued when the crawl stopped
    pub frontier_remaining: usize,

    /// SHA-256 of the configuration file, when one was used
    pub config_hash: Option<String>,

    /// Pages in completion order
    pub pages: Vec<PageReport>,
}

impl CrawlReport {
    pub fn successful_pages(&self) -> impl Iterator<Item = &PageReport> {
        self.pages.iter().filter(|p| p.status.is_success())
    }

    pub fn failed_pages(&self) -> impl Iterator<Item = &PageReport> {
        self.pages.iter().filter(|p| p.status.is_failure())
    }

    /// Counts of failed pages keyed by status code or failure kind
    pub fn error_summary(&self) -> BTreeMap<String, u64> {
        let mut summary = BTreeMap::new();
        for page in self.failed_pages() {
            let key = match (&page.error, page.status_code) {
                (Some(FetchError::SizeLimitExceeded { .. }), _) => "size_limit".to_string(),
                (_, Some(code)) => format!("http_{}", code),
                _ => page.status.as_str().to_string(),
            };
            *summary.entry(key).or_insert(0) += 1;
        }
        summary
    }
}

/// How the crawl ended, as observed by the coordinator
#[derive(Debug, Clone, Copy, Default)]
pub struct StopReason {
    pub cancelled: bool,
    pub deadline_reached: bool,
    pub budget_exhausted: bool,
    pub seed_failed: bool,
}

/// Accumulates results during a crawl
#[derive(Debug)]
pub struct ReportBuilder {
    start_url: Url,
    started_at: DateTime<Utc>,
    config_hash: Option<String>,
    stats: CrawlStats,
    pages: Vec<PageReport>,
}

impl ReportBuilder {
    pub fn new(start_url: Url, config_hash: Option<String>) -> Self {
        Self {
            start_url,
            started_at: Utc::now(),
            config_hash,
            stats: CrawlStats::default(),
            pages: Vec::new(),
        }
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    /// Records a completed task and updates the counters
    pub fn record(
        &mut self,
        source: TaskSource,
        result: FetchResult,
        record: Option<ProcessedRecord>,
    ) {
        match result.status {
            FetchStatus::Success => self.stats.pages_fetched += 1,
            FetchStatus::SkippedByPolicy => self.stats.pages_skipped += 1,
            FetchStatus::HttpError | FetchStatus::NetworkError | FetchStatus::Timeout => {
                self.stats.pages_failed += 1
            }
        }

        if result.status != FetchStatus::SkippedByPolicy {
            *self.stats.depth_breakdown.entry(result.depth).or_insert(0) += 1;
        }

        let bytes = result.body_len();
        self.stats.bytes_fetched += bytes as u64;
        self.stats.retries += u64::from(result.attempts.saturating_sub(1));
        self.stats.links_discovered += result.links.len() as u64;
        self.stats.external_links += result.links.iter().filter(|l| !l.internal).count() as u64;

        self.pages.push(PageReport {
            url: result.url,
            final_url: result.final_url,
            source,
            status: result.status,
            status_code: result.status_code,
            content_type: result.content_type,
            depth: result.depth,
            attempts: result.attempts,
            elapsed_ms: result.elapsed.as_millis() as u64,
            bytes,
            fetched_at: result.timestamp,
            error: result.error,
            links: result.links,
            record,
        });
    }

    /// Freezes the accumulated state into a report
    pub fn finish(self, stop: StopReason, frontier_remaining: usize) -> CrawlReport {
        let status = if stop.seed_failed {
            ReportStatus::Failed
        } else if stop.cancelled
            || stop.deadline_reached
            || (stop.budget_exhausted && frontier_remaining > 0)
        {
            ReportStatus::CompletedPartial
        } else {
            ReportStatus::Completed
        };

        let finished_at = Utc::now();
        let duration_ms = (finished_at - self.started_at).num_milliseconds().max(0) as u64;

        CrawlReport {
            status,
            cancelled: stop.cancelled,
            start_url: self.start_url,
            started_at: self.started_at,
            finished_at,
            duration_ms,
            stats: self.stats,
            frontier_remaining,
            config_hash: self.config_hash,
            pages: self.pages,
        }
    }
}
