//! Crawler coordinator - main crawl orchestration logic
//!
//! The coordinator loop is the single owner of the [`Frontier`] and the
//! [`ReportBuilder`]. It dispatches tasks into a `JoinSet` bounded by a
//! semaphore, merges completions one at a time, and moves the crawl through
//! the [`CrawlPhase`] state machine:
//!
//! - **Seeding**: the start URL and any sitemap URLs enter the frontier
//! - **Running**: tasks are dispatched while concurrency and budget allow
//! - **Draining**: nothing new is dispatched; in-flight tasks are awaited,
//!   and tasks still waiting for a host slot give up without fetching
//! - **Done**: the report is built and handed to every sink

use crate::config::{validate_crawl_config, CrawlConfig};
use crate::crawler::fetcher::{FetchResult, FetchStatus, Fetcher};
use crate::crawler::frontier::{CrawlTask, Frontier, KeywordScorer, NoBoost, PriorityScorer, TaskSource};
use crate::crawler::parser::{extract_links, LinkScope};
use crate::crawler::sitemap::SitemapLoader;
use crate::crawler::transport::{FetchTransport, ReqwestTransport};
use crate::output::{CrawlReport, ReportBuilder, ResultSink, StopReason};
use crate::processor::{HtmlSummaryProcessor, PageMetadata, PageProcessor, ProcessError, ProcessedRecord};
use crate::robots::Politeness;
use crate::state::CrawlPhase;
use crate::url::normalize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Pages between progress log lines
const PROGRESS_INTERVAL: u64 = 10;

/// Configurable crawl session
///
/// # Example
///
/// ```no_run
/// use ripple_crawl::{CrawlConfig, Crawler};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> ripple_crawl::Result<()> {
/// let report = Crawler::new(CrawlConfig::default())
///     .crawl("https://example.com/", CancellationToken::new())
///     .await?;
/// println!("{} pages fetched", report.stats.pages_fetched);
/// # Ok(())
/// # }
/// ```
pub struct Crawler {
    config: CrawlConfig,
    transport: Option<Arc<dyn FetchTransport>>,
    processor: Arc<dyn PageProcessor>,
    scorer: Option<Arc<dyn PriorityScorer>>,
    sinks: Vec<Arc<dyn ResultSink>>,
    config_hash: Option<String>,
}

impl Crawler {
    pub fn new(config: CrawlConfig) -> Self {
        Self {
            config,
            transport: None,
            processor: Arc::new(HtmlSummaryProcessor),
            scorer: None,
            sinks: Vec::new(),
            config_hash: None,
        }
    }

    /// Replaces the reqwest transport (used by tests and embedders)
    pub fn with_transport(mut self, transport: Arc<dyn FetchTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn PageProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Overrides the scorer derived from `priority-keywords`
    pub fn with_scorer(mut self, scorer: Arc<dyn PriorityScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Records the configuration file hash in the report
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawls the site rooted at `start_url`
    ///
    /// # Arguments
    ///
    /// * `start_url` - The seed URL; must be absolute http(s)
    /// * `cancel` - Cancelling stops dispatch and yields a partial report
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The crawl ran (possibly with per-page failures)
    /// * `Err(RippleError)` - Invalid configuration or start URL, or the
    ///   HTTP client could not be built
    pub async fn crawl(&self, start_url: &str, cancel: CancellationToken) -> crate::Result<CrawlReport> {
        validate_crawl_config(&self.config)?;
        let seed = normalize(start_url, None)?;

        let transport = match &self.transport {
            Some(transport) => transport.clone(),
            None => Arc::new(ReqwestTransport::new(&self.config)?) as Arc<dyn FetchTransport>,
        };

        // Fires on caller cancellation and on the crawl deadline
        let stop = cancel.child_token();
        let politeness = Arc::new(
            Politeness::new(transport, &self.config).with_cancellation(stop.clone()),
        );
        let scorer = self.scorer.clone().unwrap_or_else(|| self.default_scorer());
        let context = Arc::new(TaskContext {
            politeness: politeness.clone(),
            fetcher: Fetcher::new(politeness.clone(), &self.config),
            scope: LinkScope::new(seed.clone(), &self.config).with_scorer(scorer),
            processor: self.processor.clone(),
            stop,
        });

        let mut session = Session {
            config: &self.config,
            phase: CrawlPhase::Idle,
            frontier: Frontier::new(self.config.max_depth),
            builder: ReportBuilder::new(seed.clone(), self.config_hash.clone()),
            stop: StopReason::default(),
            not_started: 0,
            started: Instant::now(),
        };

        tracing::info!("Starting crawl of {}", seed);
        session.transition(CrawlPhase::Seeding);
        session.frontier.enqueue(CrawlTask::seed(seed.clone()));

        if self.config.max_depth > 0 && self.config.use_sitemap {
            let loader = SitemapLoader::new(
                politeness,
                self.config.request_timeout(),
                self.config.max_body_bytes,
            );
            tokio::select! {
                urls = loader.load(&seed, &context.scope) => {
                    let queued = urls
                        .into_iter()
                        .filter(|url| session.frontier.enqueue(CrawlTask::sitemap(url.clone())))
                        .count();
                    tracing::debug!("Queued {} sitemap URLs", queued);
                }
                _ = cancel.cancelled() => {
                    tracing::info!("Crawl cancelled while loading sitemaps");
                }
            }
        }

        if cancel.is_cancelled() {
            session.stop.cancelled = true;
            session.transition(CrawlPhase::Draining);
        } else {
            session.transition(CrawlPhase::Running);
        }

        session.run(context, &cancel).await;

        let remaining = session.frontier.len() + session.not_started;
        let report = session.builder.finish(session.stop, remaining);
        tracing::info!(
            "Crawl {}: {} fetched, {} failed, {} skipped in {:.2}s",
            report.status,
            report.stats.pages_fetched,
            report.stats.pages_failed,
            report.stats.pages_skipped,
            report.duration_ms as f64 / 1000.0
        );

        for sink in &self.sinks {
            if let Err(e) = sink.save(&report) {
                tracing::warn!("Result sink '{}' failed: {}", sink.name(), e);
            }
        }

        Ok(report)
    }

    fn default_scorer(&self) -> Arc<dyn PriorityScorer> {
        let scorer = KeywordScorer::new(&self.config.priority_keywords, self.config.keyword_boost);
        if scorer.is_empty() {
            Arc::new(NoBoost)
        } else {
            Arc::new(scorer)
        }
    }
}

/// Crawls `start_url` with the default transport, processor and no sinks
pub async fn crawl_website(start_url: &str, config: CrawlConfig) -> crate::Result<CrawlReport> {
    Crawler::new(config)
        .crawl(start_url, CancellationToken::new())
        .await
}

/// Shared, read-only state handed to every crawl task
struct TaskContext {
    politeness: Arc<Politeness>,
    fetcher: Fetcher,
    scope: LinkScope,
    processor: Arc<dyn PageProcessor>,
    stop: CancellationToken,
}

/// What a finished crawl task reports back to the loop
struct TaskOutcome {
    source: TaskSource,
    result: FetchResult,
    record: Option<ProcessedRecord>,
    discovered: Vec<CrawlTask>,
}

/// Mutable state owned by the coordinator loop
struct Session<'a> {
    config: &'a CrawlConfig,
    phase: CrawlPhase,
    frontier: Frontier,
    builder: ReportBuilder,
    stop: StopReason,
    /// Dispatched tasks that gave up before sending a request
    not_started: usize,
    started: Instant,
}

impl Session<'_> {
    fn transition(&mut self, next: CrawlPhase) {
        if self.phase == next {
            return;
        }
        if !self.phase.can_transition_to(next) {
            tracing::warn!("Ignoring illegal phase change {} -> {}", self.phase, next);
            return;
        }
        tracing::info!("Crawl phase: {} -> {}", self.phase, next);
        self.phase = next;
    }

    /// Runs the dispatch/merge loop until the crawl reaches `Done`
    async fn run(&mut self, context: Arc<TaskContext>, cancel: &CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let deadline = self.config.crawl_timeout().map(|d| self.started + d);
        let mut in_flight: JoinSet<Option<TaskOutcome>> = JoinSet::new();

        loop {
            if self.phase.accepts_dispatch() && cancel.is_cancelled() {
                self.stop.cancelled = true;
                self.transition(CrawlPhase::Draining);
            }

            if self.phase.accepts_dispatch() {
                self.dispatch(&context, &semaphore, &mut in_flight);
            }

            if in_flight.is_empty() {
                self.transition(CrawlPhase::Done);
                break;
            }

            let running = self.phase.accepts_dispatch();
            tokio::select! {
                biased;

                _ = cancel.cancelled(), if running => {
                    tracing::info!("Crawl cancelled, draining {} in-flight tasks", in_flight.len());
                    self.stop.cancelled = true;
                    self.transition(CrawlPhase::Draining);
                }
                _ = wait_for_deadline(deadline), if running && deadline.is_some() => {
                    tracing::info!("Crawl deadline reached, draining {} in-flight tasks", in_flight.len());
                    self.stop.deadline_reached = true;
                    self.transition(CrawlPhase::Draining);
                    context.stop.cancel();
                }
                joined = in_flight.join_next() => match joined {
                    Some(Ok(Some(outcome))) => self.merge(outcome),
                    Some(Ok(None)) => self.not_started += 1,
                    Some(Err(e)) => tracing::error!("Crawl task failed to complete: {}", e),
                    None => {}
                },
            }
        }
    }

    fn dispatch(
        &mut self,
        context: &Arc<TaskContext>,
        semaphore: &Arc<Semaphore>,
        in_flight: &mut JoinSet<Option<TaskOutcome>>,
    ) {
        while in_flight.len() < self.config.max_concurrency
            && self.pages_attempted() + in_flight.len() < self.config.max_pages
        {
            let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                break;
            };
            let Some(task) = self.frontier.dequeue() else {
                break;
            };

            tracing::debug!("Dispatching {} (depth {}, priority {})", task.url(), task.depth(), task.priority());
            in_flight.spawn(run_task(context.clone(), task, permit));
        }
    }

    fn merge(&mut self, outcome: TaskOutcome) {
        let TaskOutcome {
            source,
            mut result,
            record,
            discovered,
        } = outcome;

        if result.final_url != result.url {
            if let Ok(final_url) = normalize(result.final_url.as_str(), None) {
                self.frontier.mark_visited(&final_url);
            }
        }

        let seed_failed = source == TaskSource::Seed
            && matches!(result.status, FetchStatus::NetworkError | FetchStatus::Timeout);
        if seed_failed {
            tracing::warn!("Seed URL {} could not be fetched: {:?}", result.url, result.error);
        }

        let counted = matches!(
            result.status,
            FetchStatus::Success | FetchStatus::HttpError | FetchStatus::NetworkError | FetchStatus::Timeout
        );
        let queued = self.enqueue_discovered(discovered);
        for link in &mut result.links {
            link.followed = queued.contains(link.url.as_str());
        }
        self.builder.record(source, result, record);

        let attempted = self.builder.stats().pages_attempted();
        if counted && attempted % PROGRESS_INTERVAL == 0 {
            let elapsed = self.started.elapsed().as_secs_f64();
            tracing::info!(
                "Progress: {} pages attempted, {} in frontier, {:.2} pages/sec",
                attempted,
                self.frontier.len(),
                attempted as f64 / elapsed.max(f64::EPSILON)
            );
        }

        if !self.phase.accepts_dispatch() {
            return;
        }
        if seed_failed {
            self.stop.seed_failed = true;
            self.transition(CrawlPhase::Draining);
        } else if self.pages_attempted() >= self.config.max_pages {
            tracing::info!("Page budget of {} reached", self.config.max_pages);
            self.stop.budget_exhausted = true;
            self.transition(CrawlPhase::Draining);
        }
    }

    /// Offers a page's candidates to the frontier until `max-links-per-page`
    /// have been accepted; returns the accepted URLs
    fn enqueue_discovered(&mut self, discovered: Vec<CrawlTask>) -> HashSet<String> {
        let mut queued = HashSet::new();
        for task in discovered {
            if queued.len() >= self.config.max_links_per_page {
                break;
            }
            let url = task.url().to_string();
            if self.frontier.enqueue(task) {
                queued.insert(url);
            }
        }
        queued
    }

    fn pages_attempted(&self) -> usize {
        self.builder.stats().pages_attempted() as usize
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Robots check, fetch with one retry, link extraction and processing
///
/// Returns None when the crawl stopped before the task sent its request.
async fn run_task(
    context: Arc<TaskContext>,
    task: CrawlTask,
    _permit: OwnedSemaphorePermit,
) -> Option<TaskOutcome> {
    let source = task.source();

    if !context.politeness.check(task.url()).await {
        tracing::debug!("Skipping {} (disallowed by robots.txt)", task.url());
        return Some(TaskOutcome {
            source,
            result: FetchResult::skipped_by_policy(&task),
            record: None,
            discovered: Vec::new(),
        });
    }

    let Some(mut result) = context.fetcher.fetch(&task).await else {
        tracing::debug!("Crawl stopped before {} was fetched", task.url());
        return None;
    };
    let retryable = result.error.as_ref().is_some_and(|e| e.is_retryable());
    if retryable && !context.stop.is_cancelled() {
        tracing::debug!("Retrying {} after {}", task.url(), result.status);
        if let Some(retry) = context.fetcher.fetch(&task).await {
            result = retry;
            result.attempts = 2;
        }
    }

    let mut discovered = Vec::new();
    if result.is_html() {
        if let Some(body) = &result.body {
            let extracted = extract_links(
                &String::from_utf8_lossy(body),
                &result.final_url,
                task.depth(),
                &context.scope,
            );
            result.links = extracted.links;
            discovered = extracted.tasks;
        }
    }

    let record = match (result.status, result.status_code, &result.body) {
        (FetchStatus::Success, Some(status_code), Some(body)) => {
            let metadata = PageMetadata {
                final_url: result.final_url.clone(),
                status_code,
                content_type: result.content_type.clone(),
                depth: result.depth,
                fetched_at: result.timestamp,
            };
            match context.processor.process(task.url(), body, &metadata).await {
                Ok(record) => Some(record),
                Err(ProcessError::Unsupported(kind)) => {
                    tracing::debug!("Processor skipped {} ({})", task.url(), kind);
                    None
                }
                Err(e) => {
                    tracing::warn!("Processor failed for {}: {}", task.url(), e);
                    None
                }
            }
        }
        _ => None,
    };

    Some(TaskOutcome {
        source,
        result,
        record,
        discovered,
    })
}
