//! Ripple-Crawl main entry point
//!
//! This is the command-line interface for the Ripple-Crawl site crawler.

use anyhow::Context;
use clap::Parser;
use ripple_crawl::config::{load_config_with_hash, validate, Config};
use ripple_crawl::output::{sinks_from_config, CrawlReport};
use ripple_crawl::Crawler;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Ripple-Crawl: a polite single-site crawler
///
/// Ripple-Crawl fetches the pages of one site within a depth and page
/// budget, respecting robots.txt and per-host rate limits, and writes a
/// report of everything it found.
#[derive(Parser, Debug)]
#[command(name = "ripple-crawl")]
#[command(version)]
#[command(about = "A polite single-site crawler", long_about = None)]
struct Cli {
    /// URL to start crawling from
    #[arg(value_name = "URL")]
    url: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the maximum number of pages to fetch
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// Override the maximum link depth
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,

    /// Write the full report as JSON
    #[arg(long, value_name = "PATH")]
    json: Option<String>,

    /// Write a markdown summary
    #[arg(long, value_name = "PATH")]
    summary: Option<String>,

    /// Append the run to a SQLite database
    #[arg(long, value_name = "PATH")]
    database: Option<String>,

    /// Validate the configuration and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_configuration(&cli)?;

    if cli.dry_run {
        return handle_dry_run(&cli.url, &config);
    }

    handle_crawl(&cli.url, config, config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_crawl=info,warn"),
            1 => EnvFilter::new("ripple_crawl=debug,info"),
            2 => EnvFilter::new("ripple_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file (if any) and applies command-line overrides
fn load_configuration(cli: &Cli) -> anyhow::Result<(Config, Option<String>)> {
    let (mut config, hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if let Some(max_depth) = cli.max_depth {
        config.crawler.max_depth = max_depth;
    }
    if cli.json.is_some() {
        config.output.json_path = cli.json.clone();
    }
    if cli.summary.is_some() {
        config.output.summary_path = cli.summary.clone();
    }
    if cli.database.is_some() {
        config.output.database_path = cli.database.clone();
    }

    validate(&config).context("invalid configuration")?;
    Ok((config, hash))
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(url: &str, config: &Config) -> anyhow::Result<()> {
    let seed = ripple_crawl::normalize(url, None).context("invalid start URL")?;

    println!("=== Ripple-Crawl Dry Run ===\n");
    println!("Start URL: {}\n", seed);

    println!("[crawler]");
    print!("{}", toml::to_string_pretty(&config.crawler)?);

    println!("\n[output]");
    let none = "-".to_string();
    println!("  JSON report: {}", config.output.json_path.as_ref().unwrap_or(&none));
    println!("  Summary: {}", config.output.summary_path.as_ref().unwrap_or(&none));
    println!("  Database: {}", config.output.database_path.as_ref().unwrap_or(&none));

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(url: &str, config: Config, config_hash: Option<String>) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests");
            on_signal.cancel();
        }
    });

    let mut crawler = Crawler::new(config.crawler);
    for sink in sinks_from_config(&config.output) {
        crawler = crawler.with_sink(sink);
    }
    if let Some(hash) = config_hash {
        crawler = crawler.with_config_hash(hash);
    }

    let report = crawler.crawl(url, cancel).await.context("crawl failed")?;
    print_report(&report);

    Ok(())
}

fn print_report(report: &CrawlReport) {
    let stats = &report.stats;
    println!("\n=== Crawl {} ===", report.status);
    println!("Start URL:        {}", report.start_url);
    println!("Duration:         {:.2}s", report.duration_ms as f64 / 1000.0);
    println!("Pages fetched:    {}", stats.pages_fetched);
    println!("Pages failed:     {}", stats.pages_failed);
    println!("Pages skipped:    {}", stats.pages_skipped);
    println!("Links discovered: {}", stats.links_discovered);
    println!("External links:   {}", stats.external_links);
    println!("Left in frontier: {}", report.frontier_remaining);
}
