//! Robots.txt handling and per-host politeness
//!
//! This module fetches, parses and caches robots.txt files and owns the
//! per-origin pacing state. [`Politeness`] is shared by every crawl task;
//! its two maps are guarded by `std::sync::Mutex` and never held across an
//! await point. Once its cancellation token fires, no further request is
//! sent through it.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::RobotsRules;

use crate::config::CrawlConfig;
use crate::crawler::{redirect_target, FetchTransport, TransportError, TransportResponse, MAX_REDIRECTS};
use crate::state::HostState;
use crate::url::origin_key;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Timeout for robots.txt requests
pub const ROBOTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Robots.txt files larger than this are treated as unavailable
pub const ROBOTS_MAX_BYTES: usize = 512 * 1024;

/// Returns the path (plus query) that robots rules are matched against
pub fn robots_path(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Robots.txt enforcement and per-host request pacing
pub struct Politeness {
    transport: Arc<dyn FetchTransport>,
    cache: RobotsCache,
    hosts: Mutex<HashMap<String, HostState>>,
    user_agent: String,
    per_host_delay: Duration,
    respect_robots: bool,
    robots_timeout: Duration,
    cancel: CancellationToken,
}

impl Politeness {
    /// Creates a controller for one crawl session
    ///
    /// # Arguments
    ///
    /// * `transport` - Used for robots.txt requests
    /// * `config` - Supplies the user agent, per-host delay and robots switch
    pub fn new(transport: Arc<dyn FetchTransport>, config: &CrawlConfig) -> Self {
        Self {
            transport,
            cache: RobotsCache::new(),
            hosts: Mutex::new(HashMap::new()),
            user_agent: config.user_agent.clone(),
            per_host_delay: config.per_host_delay(),
            respect_robots: config.respect_robots,
            robots_timeout: ROBOTS_TIMEOUT.min(config.request_timeout()),
            cancel: CancellationToken::new(),
        }
    }

    /// Stops all pacing waits (and the requests behind them) once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn respects_robots(&self) -> bool {
        self.respect_robots
    }

    /// Returns the robots rules for `url`'s origin, fetching them on first use
    ///
    /// Any failure (network, timeout, non-200, oversize) yields a permissive
    /// ruleset. With robots disabled nothing is fetched and everything is
    /// allowed.
    pub async fn load_robots(&self, url: &Url) -> Arc<RobotsRules> {
        if !self.respect_robots {
            return Arc::new(RobotsRules::allow_all());
        }

        let origin = origin_key(url);
        self.cache
            .get_or_load(&origin, || self.fetch_robots(url))
            .await
    }

    /// Checks `url` against already-loaded rules
    pub fn is_allowed(&self, rules: &RobotsRules, url: &Url) -> bool {
        !self.respect_robots || rules.is_allowed(&robots_path(url), &self.user_agent)
    }

    /// Loads the rules for `url`'s origin if needed and checks `url` against them
    pub async fn check(&self, url: &Url) -> bool {
        if !self.respect_robots {
            return true;
        }
        let rules = self.load_robots(url).await;
        self.is_allowed(&rules, url)
    }

    /// Drops the cached robots.txt for `url`'s origin
    pub fn invalidate_robots(&self, url: &Url) -> bool {
        self.cache.invalidate(&origin_key(url))
    }

    /// Earliest instant a request to `url`'s origin may start
    pub fn next_allowed_time(&self, url: &Url) -> Instant {
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        hosts
            .get(&origin_key(url))
            .map_or(now, |state| state.next_allowed_time(self.per_host_delay, now))
    }

    /// Reserves the next request slot for `url`'s origin and sleeps until it
    ///
    /// The reservation is made under the host map lock, so concurrent callers
    /// for the same origin receive slots at least one effective delay apart.
    ///
    /// Returns false, without waiting out the slot, once the crawl is
    /// cancelled; the caller must then not send its request.
    pub async fn wait_turn(&self, url: &Url) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let slot = {
            let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
            hosts
                .entry(origin_key(url))
                .or_default()
                .reserve_slot(self.per_host_delay, Instant::now())
        };

        if slot > Instant::now() {
            tracing::trace!("Waiting {:?} for {}", slot - Instant::now(), url);
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    tracing::debug!("Cancelled while waiting to fetch {}", url);
                }
                _ = tokio::time::sleep_until(slot) => {}
            }
        }

        !self.cancel.is_cancelled()
    }

    /// Waits for `url`'s slot and sends a single request
    ///
    /// Returns None when the crawl was cancelled before the request went out.
    pub async fn send(
        &self,
        url: &Url,
        timeout: Duration,
        max_body_bytes: usize,
    ) -> Option<Result<TransportResponse, TransportError>> {
        if !self.wait_turn(url).await {
            return None;
        }
        Some(self.transport.get(url, timeout, max_body_bytes).await)
    }

    /// Like [`Politeness::send`], but follows redirects, pacing every hop
    ///
    /// Robots rules are not consulted; this serves robots.txt and sitemap
    /// documents. Returns the URL the response was served from.
    pub async fn fetch_following(
        &self,
        url: &Url,
        timeout: Duration,
        max_body_bytes: usize,
    ) -> Option<(Url, Result<TransportResponse, TransportError>)> {
        let mut current = url.clone();
        for _ in 0..=MAX_REDIRECTS {
            let outcome = self.send(&current, timeout, max_body_bytes).await?;
            let next = outcome.as_ref().ok().and_then(|r| redirect_target(r, &current));
            match next {
                Some(next) => {
                    tracing::debug!("{} redirected to {}", current, next);
                    current = next;
                }
                None => return Some((current, outcome)),
            }
        }
        let err = TransportError::Network(format!("more than {} redirects", MAX_REDIRECTS));
        Some((current, Err(err)))
    }

    /// Number of requests reserved against `url`'s origin
    pub fn request_count(&self, url: &Url) -> u32 {
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts.get(&origin_key(url)).map_or(0, |s| s.request_count)
    }

    /// Fetches and parses robots.txt for `url`'s origin
    async fn fetch_robots(&self, url: &Url) -> RobotsRules {
        let Ok(robots_url) = url.join("/robots.txt") else {
            return RobotsRules::allow_all();
        };

        let Some((_, outcome)) = self
            .fetch_following(&robots_url, self.robots_timeout, ROBOTS_MAX_BYTES)
            .await
        else {
            tracing::debug!("Crawl cancelled before {} was fetched, allowing all", robots_url);
            return RobotsRules::allow_all();
        };

        let rules = match outcome {
            Ok(response) if response.status == 200 && !response.truncated => {
                RobotsRules::parse(&String::from_utf8_lossy(&response.body))
            }
            Ok(response) => {
                tracing::debug!(
                    "robots.txt at {} unavailable (status {}), allowing all",
                    robots_url,
                    response.status
                );
                RobotsRules::allow_all()
            }
            Err(e) => {
                tracing::debug!("Failed to fetch {}: {}, allowing all", robots_url, e);
                RobotsRules::allow_all()
            }
        };

        if let Some(delay) = rules.crawl_delay(&self.user_agent) {
            tracing::info!("Honouring Crawl-delay of {:?} for {}", delay, origin_key(url));
            let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
            hosts
                .entry(origin_key(url))
                .or_default()
                .set_crawl_delay(Some(delay));
        }

        rules
    }
}

impl std::fmt::Debug for Politeness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Politeness")
            .field("user_agent", &self.user_agent)
            .field("per_host_delay", &self.per_host_delay)
            .field("respect_robots", &self.respect_robots)
            .field("cached_origins", &self.cache.len())
            .finish()
    }
}
