//! Markdown summary generation
//!
//! Produces a human-readable summary of a crawl report: run information,
//! counters, per-depth breakdown, failures and the external links found.

use crate::output::traits::{OutputResult, ResultSink};
use crate::output::CrawlReport;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Rows shown in the failures and external link tables
const TABLE_LIMIT: usize = 20;

/// Writes a markdown summary file
#[derive(Debug, Clone)]
pub struct MarkdownSink {
    path: PathBuf,
}

impl MarkdownSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ResultSink for MarkdownSink {
    fn name(&self) -> &str {
        "markdown"
    }

    fn save(&self, report: &CrawlReport) -> OutputResult<()> {
        generate_markdown_summary(report, &self.path)
    }
}

/// Generates a markdown summary from a crawl report
///
/// # Arguments
///
/// * `report` - The finished crawl report
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(report: &CrawlReport, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(report);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl report as markdown
pub fn format_markdown_summary(report: &CrawlReport) -> String {
    let stats = &report.stats;
    let mut md = String::new();

    md.push_str("# Ripple-Crawl Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Start URL**: {}\n", report.start_url));
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", report.finished_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Duration**: {:.2} seconds\n",
        report.duration_ms as f64 / 1000.0
    ));
    md.push_str(&format!("- **Status**: {}\n", report.status));
    if report.cancelled {
        md.push_str("- **Cancelled**: yes\n");
    }
    if let Some(hash) = &report.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    md.push_str("## Overall Statistics\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Pages fetched | {} |\n", stats.pages_fetched));
    md.push_str(&format!("| Pages failed | {} |\n", stats.pages_failed));
    md.push_str(&format!("| Skipped by robots.txt | {} |\n", stats.pages_skipped));
    md.push_str(&format!("| Retries | {} |\n", stats.retries));
    md.push_str(&format!("| Bytes fetched | {} |\n", stats.bytes_fetched));
    md.push_str(&format!("| Links discovered | {} |\n", stats.links_discovered));
    md.push_str(&format!("| External links | {} |\n", stats.external_links));
    md.push_str(&format!("| Left in frontier | {} |\n", report.frontier_remaining));
    md.push_str(&format!("| Success rate | {:.2}% |\n\n", stats.success_rate()));

    if !stats.depth_breakdown.is_empty() {
        md.push_str("## Depth Breakdown\n\n");
        md.push_str("| Depth | Pages |\n");
        md.push_str("|-------|-------|\n");
        for (depth, count) in &stats.depth_breakdown {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');
    }

    let errors = report.error_summary();
    if !errors.is_empty() {
        md.push_str("## Error Summary\n\n");
        md.push_str("| Error Type | Count |\n");
        md.push_str("|------------|-------|\n");
        for (kind, count) in &errors {
            md.push_str(&format!("| {} | {} |\n", kind, count));
        }
        md.push('\n');

        md.push_str("## Failed Pages\n\n");
        md.push_str("| URL | Status | Attempts |\n");
        md.push_str("|-----|--------|----------|\n");
        for page in report.failed_pages().take(TABLE_LIMIT) {
            let status = match &page.error {
                Some(err) => err.to_string(),
                None => page.status.to_string(),
            };
            md.push_str(&format!("| {} | {} | {} |\n", page.url, status, page.attempts));
        }
        md.push('\n');
    }

    let external = external_link_counts(report);
    if !external.is_empty() {
        md.push_str(&format!("## Top {} External Links\n\n", TABLE_LIMIT));
        md.push_str("| URL | References |\n");
        md.push_str("|-----|------------|\n");

        let mut ranked: Vec<_> = external.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (url, count) in ranked.iter().take(TABLE_LIMIT) {
            md.push_str(&format!("| {} | {} |\n", url, count));
        }
        md.push('\n');
    }

    md
}

fn external_link_counts(report: &CrawlReport) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for link in report.pages.iter().flat_map(|p| p.links.iter()) {
        if !link.internal {
            *counts.entry(link.url.to_string()).or_insert(0) += 1;
        }
    }
    counts
}
