//! Robots.txt caching implementation
//!
//! One entry per origin for the lifetime of a crawl session. Concurrent
//! lookups for an origin that is still loading wait on the same load instead
//! of issuing their own request.

use crate::robots::RobotsRules;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<Arc<RobotsRules>>>;

/// Session-scoped robots.txt cache keyed by origin
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, Slot>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached rules for `origin`, running `load` if this is the
    /// first request for it
    ///
    /// # Arguments
    ///
    /// * `origin` - The `scheme://host[:port]` key
    /// * `load` - Produces the rules; called at most once per origin
    pub async fn get_or_load<F, Fut>(&self, origin: &str, load: F) -> Arc<RobotsRules>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RobotsRules>,
    {
        let slot = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.entry(origin.to_string()).or_default().clone()
        };

        slot.get_or_init(|| async { Arc::new(load().await) })
            .await
            .clone()
    }

    /// Returns the rules for `origin` if they have finished loading
    pub fn get(&self, origin: &str) -> Option<Arc<RobotsRules>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(origin).and_then(|slot| slot.get().cloned())
    }

    /// Drops the entry for `origin` so the next lookup loads it again
    ///
    /// # Returns
    ///
    /// * `true` - If an entry was removed
    pub fn invalidate(&self, origin: &str) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(origin).is_some()
    }

    /// Number of origins with an entry (loaded or loading)
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
