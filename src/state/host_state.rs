use std::time::Duration;
use tokio::time::Instant;

/// Robots.txt `Crawl-delay` values above this are clamped
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(60);

/// Pacing state for one origin during a crawl
///
/// The politeness controller keeps one of these per `scheme://host[:port]`
/// behind a mutex. Reserving a slot and updating `last_slot` happen in the
/// same critical section, which is what keeps concurrent tasks from hitting
/// the same host closer together than the effective delay.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests reserved against this host so far
    pub request_count: u32,

    /// Start instant of the most recently reserved request
    pub last_slot: Option<Instant>,

    /// Crawl-delay declared by the host's robots.txt (already clamped)
    pub crawl_delay: Option<Duration>,
}

impl HostState {
    /// Creates a new HostState with no history
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the robots.txt crawl delay, clamping it to [`MAX_CRAWL_DELAY`]
    pub fn set_crawl_delay(&mut self, delay: Option<Duration>) {
        self.crawl_delay = delay.map(|d| d.min(MAX_CRAWL_DELAY));
    }

    /// The delay that actually applies: the larger of the configured
    /// per-host delay and the robots.txt crawl delay
    pub fn effective_delay(&self, per_host_delay: Duration) -> Duration {
        match self.crawl_delay {
            Some(crawl_delay) => per_host_delay.max(crawl_delay),
            None => per_host_delay,
        }
    }

    /// Earliest instant a new request may start, without reserving it
    pub fn next_allowed_time(&self, per_host_delay: Duration, now: Instant) -> Instant {
        match self.last_slot {
            Some(last) => now.max(last + self.effective_delay(per_host_delay)),
            None => now,
        }
    }

    /// Reserves the next request slot and returns its start instant
    ///
    /// # Arguments
    ///
    /// * `per_host_delay` - The configured minimum spacing between requests
    /// * `now` - The current time instant
    ///
    /// # Returns
    ///
    /// The instant at which the caller may start its request. The caller is
    /// expected to sleep until then.
    pub fn reserve_slot(&mut self, per_host_delay: Duration, now: Instant) -> Instant {
        let slot = self.next_allowed_time(per_host_delay, now);
        self.last_slot = Some(slot);
        self.request_count += 1;
        slot
    }
}
