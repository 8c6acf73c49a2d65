//! Page processing
//!
//! A [`PageProcessor`] is handed the body of every successfully fetched page
//! and produces a [`ProcessedRecord`] that travels with the page into the
//! crawl report. Processor failures are logged and never stop the crawl.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Facts about a fetched page passed alongside its body
#[derive(Debug, Clone)]
pub struct PageMetadata {
    /// URL after redirects
    pub final_url: Url,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub depth: u32,
    pub fetched_at: DateTime<Utc>,
}

/// Output of a page processor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedRecord {
    pub url: Url,
    pub title: Option<String>,
    /// Processor-specific fields
    pub data: serde_json::Value,
}

/// Errors a processor may report
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Unsupported content: {0}")]
    Unsupported(String),

    #[error("Processing failed: {0}")]
    Failed(String),
}

/// Extracts data from a fetched page
#[async_trait]
pub trait PageProcessor: Send + Sync {
    /// Called once per successful page
    async fn process(
        &self,
        url: &Url,
        body: &[u8],
        metadata: &PageMetadata,
    ) -> Result<ProcessedRecord, ProcessError>;
}

/// Default processor: title, meta description and visible word count
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlSummaryProcessor;

#[async_trait]
impl PageProcessor for HtmlSummaryProcessor {
    async fn process(
        &self,
        url: &Url,
        body: &[u8],
        metadata: &PageMetadata,
    ) -> Result<ProcessedRecord, ProcessError> {
        if let Some(content_type) = &metadata.content_type {
            if !content_type.to_ascii_lowercase().contains("html") {
                return Err(ProcessError::Unsupported(content_type.clone()));
            }
        }

        let html = String::from_utf8_lossy(body);
        let summary = summarize(&html);

        Ok(ProcessedRecord {
            url: url.clone(),
            title: summary.title,
            data: serde_json::json!({
                "description": summary.description,
                "word_count": summary.word_count,
            }),
        })
    }
}

struct HtmlSummary {
    title: Option<String>,
    description: Option<String>,
    word_count: usize,
}

fn summarize(html: &str) -> HtmlSummary {
    let document = Html::parse_document(html);

    let description = Selector::parse(r#"meta[name="description"]"#)
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|el| el.value().attr("content"))
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty());

    // Count words in text nodes that are not inside script/style
    let word_count = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(|body| {
            body.descendants()
                .filter_map(|node| {
                    let text = node.value().as_text()?;
                    let parent = node.parent()?.value().as_element()?;
                    (!matches!(parent.name(), "script" | "style" | "noscript"))
                        .then(|| text.split_whitespace().count())
                })
                .sum()
        })
        .unwrap_or(0);

    HtmlSummary {
        title: crate::crawler::extract_title(&document),
        description,
        word_count,
    }
}
