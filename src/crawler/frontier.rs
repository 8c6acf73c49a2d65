//! Crawl frontier: the priority queue of URLs waiting to be fetched
//!
//! The frontier also owns the visited set. A URL is marked visited at the
//! moment it is dequeued, and once visited (or while queued) it cannot be
//! enqueued again, so every URL is dispatched at most once per crawl.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use url::Url;

/// Base priority of the start URL
pub const SEED_PRIORITY: i32 = 100;

/// Base priority of URLs listed in a sitemap
pub const SITEMAP_PRIORITY: i32 = 50;

/// Base priority of links found on crawled pages, before scoring
pub const DISCOVERED_PRIORITY: i32 = 0;

/// Where a crawl task came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    Seed,
    Sitemap,
    Discovered,
}

impl TaskSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::Sitemap => "sitemap",
            Self::Discovered => "discovered",
        }
    }
}

/// A URL scheduled for fetching
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    url: Url,
    depth: u32,
    source: TaskSource,
    priority: i32,
}

impl CrawlTask {
    pub fn new(url: Url, depth: u32, source: TaskSource, priority: i32) -> Self {
        Self {
            url,
            depth,
            source,
            priority,
        }
    }

    /// The start URL at depth 0
    pub fn seed(url: Url) -> Self {
        Self::new(url, 0, TaskSource::Seed, SEED_PRIORITY)
    }

    /// A sitemap entry; sitemap URLs are treated as one hop from the seed
    pub fn sitemap(url: Url) -> Self {
        Self::new(url, 1, TaskSource::Sitemap, SITEMAP_PRIORITY)
    }

    /// A link found on a page at `depth - 1`
    pub fn discovered(url: Url, depth: u32, boost: i32) -> Self {
        Self::new(
            url,
            depth,
            TaskSource::Discovered,
            DISCOVERED_PRIORITY.saturating_add(boost),
        )
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn source(&self) -> TaskSource {
        self.source
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }
}

/// Computes the priority boost for a discovered link
pub trait PriorityScorer: Send + Sync {
    fn score(&self, url: &Url, depth: u32) -> i32;
}

/// Scorer that leaves every discovered link at the base priority
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBoost;

impl PriorityScorer for NoBoost {
    fn score(&self, _url: &Url, _depth: u32) -> i32 {
        0
    }
}

/// Boosts links whose path mentions any configured keyword
///
/// Each distinct keyword found in the lowercased path adds `boost`.
#[derive(Debug, Clone)]
pub struct KeywordScorer {
    keywords: Vec<String>,
    boost: i32,
}

impl KeywordScorer {
    pub fn new(keywords: &[String], boost: i32) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            boost,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

impl PriorityScorer for KeywordScorer {
    fn score(&self, url: &Url, _depth: u32) -> i32 {
        let path = url.path().to_lowercase();
        let hits = self
            .keywords
            .iter()
            .filter(|k| path.contains(k.as_str()))
            .count() as i32;
        hits.saturating_mul(self.boost)
    }
}

/// Heap entry: higher priority first, then earlier discovery
#[derive(Debug)]
struct QueuedTask {
    task: CrawlTask,
    sequence: u64,
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.task
            .priority
            .cmp(&other.task.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for QueuedTask {}

/// Priority queue of pending crawl tasks plus the visited set
#[derive(Debug)]
pub struct Frontier {
    heap: BinaryHeap<QueuedTask>,
    queued: HashSet<String>,
    visited: HashSet<String>,
    next_sequence: u64,
    max_depth: u32,
}

impl Frontier {
    /// Creates an empty frontier that refuses tasks deeper than `max_depth`
    pub fn new(max_depth: u32) -> Self {
        Self {
            heap: BinaryHeap::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            next_sequence: 0,
            max_depth,
        }
    }

    /// Adds a task to the frontier
    ///
    /// # Returns
    ///
    /// * `true` - The task was queued
    /// * `false` - The URL was already visited or queued, or the task is too deep
    pub fn enqueue(&mut self, task: CrawlTask) -> bool {
        if task.depth > self.max_depth {
            return false;
        }

        let key = task.url.as_str().to_string();
        if self.visited.contains(&key) || self.queued.contains(&key) {
            return false;
        }

        self.queued.insert(key);
        self.heap.push(QueuedTask {
            task,
            sequence: self.next_sequence,
        });
        self.next_sequence += 1;
        true
    }

    /// Removes the highest-priority task and marks its URL visited
    pub fn dequeue(&mut self) -> Option<CrawlTask> {
        while let Some(QueuedTask { task, .. }) = self.heap.pop() {
            let key = task.url.as_str().to_string();
            if !self.queued.remove(&key) {
                // Marked visited while it sat in the heap
                continue;
            }
            self.visited.insert(key);
            return Some(task);
        }
        None
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    /// Marks a URL visited without dispatching it, e.g. the target of a redirect
    ///
    /// Returns `false` if the URL was already visited. A queued copy stays in
    /// the heap but is skipped on dequeue.
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        let key = url.as_str().to_string();
        self.queued.remove(&key);
        self.visited.insert(key)
    }

    /// Number of URLs dequeued so far
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Number of tasks waiting
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}
