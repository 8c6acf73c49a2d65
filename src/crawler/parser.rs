//! Link extraction from fetched HTML
//!
//! Links come from `<a href>` elements and from string literals assigned to
//! `window.location` / `location.href` or passed to `location.assign` /
//! `location.replace` in inline scripts. Script scanning is best effort.

use crate::config::CrawlConfig;
use crate::crawler::frontier::{CrawlTask, NoBoost, PriorityScorer};
use crate::url::{is_internal, normalize};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use url::Url;

/// A link found on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredLink {
    /// Normalized absolute URL
    pub url: Url,

    /// Whether the link stays on the crawled site
    pub internal: bool,

    /// Whether the link became a crawl task
    ///
    /// [`extract_links`] marks every candidate; the crawl loop then clears
    /// the flag for candidates the frontier did not accept.
    pub followed: bool,
}

/// Result of extracting links from one page
#[derive(Debug, Clone, Default)]
pub struct ExtractedLinks {
    /// Every distinct link found, in document order
    pub links: Vec<DiscoveredLink>,

    /// Candidate tasks in document order, one per followable link
    pub tasks: Vec<CrawlTask>,
}

/// Decides which URLs belong to the crawl and how discovered links are scored
#[derive(Clone)]
pub struct LinkScope {
    seed: Url,
    internal_hosts: Vec<String>,
    follow_external: bool,
    max_depth: u32,
    scorer: Arc<dyn PriorityScorer>,
}

impl LinkScope {
    pub fn new(seed: Url, config: &CrawlConfig) -> Self {
        Self {
            seed,
            internal_hosts: config.internal_hosts.clone(),
            follow_external: config.follow_external_links,
            max_depth: config.max_depth,
            scorer: Arc::new(NoBoost),
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn PriorityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    pub fn is_internal(&self, url: &Url) -> bool {
        is_internal(url, &self.seed, &self.internal_hosts)
    }

    /// Whether a link to `url` may become a crawl task
    pub fn should_follow(&self, url: &Url) -> bool {
        self.follow_external || self.is_internal(url)
    }

    /// Whether pages at `depth` are still within the crawl
    pub fn within_depth(&self, depth: u32) -> bool {
        depth <= self.max_depth
    }

    pub fn score(&self, url: &Url, depth: u32) -> i32 {
        self.scorer.score(url, depth)
    }
}

impl std::fmt::Debug for LinkScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkScope")
            .field("seed", &self.seed.as_str())
            .field("internal_hosts", &self.internal_hosts)
            .field("follow_external", &self.follow_external)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

/// Extracts links from an HTML page and turns the followable ones into tasks
///
/// # Arguments
///
/// * `body` - The page HTML
/// * `page_url` - URL the body was served from (after redirects)
/// * `current_depth` - Depth of the page; new tasks get `current_depth + 1`
/// * `scope` - Internal/external classification and priority scoring
///
/// # Returns
///
/// Every distinct link (self-links excluded) plus one candidate task per
/// followable link. Links past `max-depth` or out of scope get no task and
/// `followed = false`. The per-page cap is applied when the candidates are
/// queued, after duplicates are dropped.
pub fn extract_links(
    body: &str,
    page_url: &Url,
    current_depth: u32,
    scope: &LinkScope,
) -> ExtractedLinks {
    let document = Html::parse_document(body);
    let base = document_base(&document, page_url);

    let hrefs = anchor_hrefs(&document)
        .into_iter()
        .chain(script_locations(&document));

    let self_url = normalize(page_url.as_str(), None).ok();
    let mut seen = HashSet::new();
    let mut extracted = ExtractedLinks::default();

    for href in hrefs {
        let Some(url) = resolve_link(&href, &base) else {
            continue;
        };
        if self_url.as_ref() == Some(&url) || !seen.insert(url.as_str().to_string()) {
            continue;
        }

        let internal = scope.is_internal(&url);
        let depth = current_depth + 1;
        let followed = scope.within_depth(depth) && scope.should_follow(&url);

        if followed {
            let boost = scope.score(&url, depth);
            extracted
                .tasks
                .push(CrawlTask::discovered(url.clone(), depth, boost));
        }

        extracted.links.push(DiscoveredLink {
            url,
            internal,
            followed,
        });
    }

    extracted
}

/// Extracts the page title from an HTML document
pub fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Honours `<base href>` when present
fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|el| el.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

fn anchor_hrefs(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|element| element.value().attr("download").is_none())
        .filter_map(|element| element.value().attr("href"))
        .map(|href| href.to_string())
        .collect()
}

fn location_regex() -> Option<&'static Regex> {
    static LOCATION: OnceLock<Option<Regex>> = OnceLock::new();
    LOCATION
        .get_or_init(|| {
            Regex::new(
                r#"(?:(?:window\.)?location(?:\.href)?\s*=\s*|location\.(?:assign|replace)\(\s*)["']([^"']+)["']"#,
            )
            .ok()
        })
        .as_ref()
}

/// String literals navigated to from inline scripts
fn script_locations(document: &Html) -> Vec<String> {
    let (Ok(selector), Some(regex)) = (Selector::parse("script:not([src])"), location_regex())
    else {
        return Vec::new();
    };

    document
        .select(&selector)
        .flat_map(|script| {
            let source = script.text().collect::<String>();
            regex
                .captures_iter(&source)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Resolves a link href to a normalized absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only (same page) anchors
/// - anything the normalizer rejects
fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    normalize(href, Some(base)).ok()
}
