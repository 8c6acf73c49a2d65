//! Result sink trait and output errors

use crate::output::CrawlReport;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Persists a finished crawl report
///
/// Called once per crawl, after the report is built. A failing sink is
/// logged by the caller and does not affect the report itself.
pub trait ResultSink: Send + Sync {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// Writes the report
    fn save(&self, report: &CrawlReport) -> OutputResult<()>;
}

/// Collects reports in memory; handy for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: std::sync::Mutex<Vec<CrawlReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns copies of every report saved so far
    pub fn reports(&self) -> Vec<CrawlReport> {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ResultSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn save(&self, report: &CrawlReport) -> OutputResult<()> {
        self.reports
            .lock()
            .map_err(|_| OutputError::Write("memory sink lock poisoned".to_string()))?
            .push(report.clone());
        Ok(())
    }
}
