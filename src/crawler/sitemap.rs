//! Sitemap discovery
//!
//! Candidates are tried in order: `Sitemap:` URLs declared in robots.txt,
//! then `/sitemap.xml`, `/sitemap_index.xml` and `/sitemap.txt`. The first
//! candidate that yields any URLs wins. Sitemap indexes are followed one
//! level deep.

use crate::crawler::parser::LinkScope;
use crate::robots::Politeness;
use crate::url::normalize;
use sitemap::reader::{SiteMapEntity, SiteMapReader};
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Upper bound on URLs taken from sitemaps
pub const MAX_SITEMAP_URLS: usize = 10_000;

/// Well-known sitemap locations relative to the site root
const COMMON_PATHS: [&str; 3] = ["/sitemap.xml", "/sitemap_index.xml", "/sitemap.txt"];

/// Entries found in one sitemap document
#[derive(Debug, Default, PartialEq)]
struct SitemapDocument {
    urls: Vec<String>,
    nested: Vec<String>,
}

/// Loads seed URLs from a site's sitemaps
pub struct SitemapLoader {
    politeness: Arc<Politeness>,
    timeout: Duration,
    max_body_bytes: usize,
}

impl SitemapLoader {
    pub fn new(politeness: Arc<Politeness>, timeout: Duration, max_body_bytes: usize) -> Self {
        Self {
            politeness,
            timeout,
            max_body_bytes,
        }
    }

    /// Returns normalized, deduplicated, in-scope URLs listed in the site's
    /// sitemap, or an empty vector when none is found
    ///
    /// # Arguments
    ///
    /// * `base` - Any URL on the site (normally the seed)
    /// * `scope` - Filters out URLs the crawl would not follow
    pub async fn load(&self, base: &Url, scope: &LinkScope) -> Vec<Url> {
        for candidate in self.candidates(base).await {
            let raw = self.load_candidate(&candidate).await;
            if raw.is_empty() {
                continue;
            }

            let urls = filter_urls(raw, scope);
            tracing::info!("Loaded {} URLs from sitemap {}", urls.len(), candidate);
            return urls;
        }

        tracing::debug!("No sitemap found for {}", base);
        Vec::new()
    }

    async fn candidates(&self, base: &Url) -> Vec<Url> {
        let mut candidates = Vec::new();

        if self.politeness.respects_robots() {
            let rules = self.politeness.load_robots(base).await;
            candidates.extend(
                rules
                    .sitemaps()
                    .iter()
                    .filter_map(|s| Url::parse(s).ok()),
            );
        }

        candidates.extend(COMMON_PATHS.iter().filter_map(|p| base.join(p).ok()));

        let mut seen = HashSet::new();
        candidates.retain(|u| seen.insert(u.as_str().to_string()));
        candidates
    }

    /// Fetches one candidate, following an index one level
    async fn load_candidate(&self, url: &Url) -> Vec<String> {
        let Some(document) = self.fetch_document(url).await else {
            return Vec::new();
        };

        let mut urls = document.urls;
        for nested in document.nested.iter().filter_map(|n| Url::parse(n).ok()) {
            if urls.len() >= MAX_SITEMAP_URLS {
                break;
            }
            if let Some(child) = self.fetch_document(&nested).await {
                // Nested indexes are not followed further
                urls.extend(child.urls);
            }
        }

        urls
    }

    async fn fetch_document(&self, url: &Url) -> Option<SitemapDocument> {
        let (served_from, outcome) = self
            .politeness
            .fetch_following(url, self.timeout, self.max_body_bytes)
            .await?;

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Sitemap {} unavailable: {}", url, e);
                return None;
            }
        };

        if response.status != 200 || response.truncated {
            tracing::debug!("Sitemap {} returned status {}", url, response.status);
            return None;
        }

        let is_text = served_from.path().ends_with(".txt")
            || response
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with("text/plain"));

        let document = if is_text {
            parse_text_sitemap(&String::from_utf8_lossy(&response.body))
        } else {
            parse_xml_sitemap(&response.body)
        };
        Some(document)
    }
}

/// Parses a `<urlset>` or `<sitemapindex>` document
fn parse_xml_sitemap(body: &[u8]) -> SitemapDocument {
    let mut document = SitemapDocument::default();

    for entity in SiteMapReader::new(Cursor::new(body)) {
        match entity {
            SiteMapEntity::Url(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    document.urls.push(url.to_string());
                }
            }
            SiteMapEntity::SiteMap(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    document.nested.push(url.to_string());
                }
            }
            _ => tracing::debug!("Skipping unreadable sitemap entry"),
        }
    }

    document
}

/// Parses a plain-text sitemap: one absolute URL per line
fn parse_text_sitemap(body: &str) -> SitemapDocument {
    SitemapDocument {
        urls: body
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("http"))
            .map(|line| line.to_string())
            .collect(),
        nested: Vec::new(),
    }
}

/// Normalizes, deduplicates, scopes and caps raw sitemap entries
fn filter_urls(raw: Vec<String>, scope: &LinkScope) -> Vec<Url> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|entry| normalize(entry, None).ok())
        .filter(|url| scope.should_follow(url))
        .filter(|url| seen.insert(url.as_str().to_string()))
        .take(MAX_SITEMAP_URLS)
        .collect()
}
