//! Output module for crawl reports
//!
//! This module handles:
//! - Building the [`CrawlReport`] from per-page results
//! - The [`ResultSink`] trait through which reports are persisted
//! - JSON, markdown and SQLite sinks

mod json;
mod markdown;
pub mod report;
mod sqlite;
mod traits;

pub use json::JsonSink;
pub use markdown::{format_markdown_summary, generate_markdown_summary, MarkdownSink};
pub use report::{CrawlReport, CrawlStats, PageReport, ReportBuilder, ReportStatus, StopReason};
pub use sqlite::{initialize_schema, open_database, write_report, SqliteSink};
pub use traits::{MemorySink, OutputError, OutputResult, ResultSink};

use crate::config::OutputConfig;
use std::sync::Arc;

/// Builds the sinks enabled by an `[output]` section
pub fn sinks_from_config(config: &OutputConfig) -> Vec<Arc<dyn ResultSink>> {
    let mut sinks: Vec<Arc<dyn ResultSink>> = Vec::new();
    if let Some(path) = &config.json_path {
        sinks.push(Arc::new(JsonSink::new(path)));
    }
    if let Some(path) = &config.summary_path {
        sinks.push(Arc::new(MarkdownSink::new(path)));
    }
    if let Some(path) = &config.database_path {
        sinks.push(Arc::new(SqliteSink::new(path)));
    }
    sinks
}
