//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The HTTP transport seam and the single-shot fetcher
//! - The priority frontier and its visited set
//! - HTML link extraction and sitemap loading
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod sitemap;
mod transport;

pub use coordinator::{crawl_website, Crawler};
pub use fetcher::{FetchResult, FetchStatus, Fetcher};
pub use frontier::{
    CrawlTask, Frontier, KeywordScorer, NoBoost, PriorityScorer, TaskSource, DISCOVERED_PRIORITY,
    SEED_PRIORITY, SITEMAP_PRIORITY,
};
pub use parser::{extract_links, extract_title, DiscoveredLink, ExtractedLinks, LinkScope};
pub use sitemap::{SitemapLoader, MAX_SITEMAP_URLS};
pub use transport::{
    build_http_client, redirect_target, FetchTransport, ReqwestTransport, TransportError,
    TransportResponse, MAX_REDIRECTS,
};
