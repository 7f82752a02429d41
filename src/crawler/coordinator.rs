//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Restoring the graph and frontier from the last checkpoint
//! - Popping titles from the frontier and fetching their links
//! - Updating the graph store and frontier with each result
//! - Checkpointing every N processed titles and on shutdown
//! - Reacting to cancellation between units of work

use crate::config::Config;
use crate::crawler::fetcher::{FetchError, LinkFetcher, MediaWikiFetcher};
use crate::crawler::scheduler::{RequeueOutcome, Scheduler};
use crate::graph::GraphStore;
use crate::state::DriverState;
use crate::storage::{CheckpointStore, JsonCheckpointStore, Snapshot};
use crate::{Result, WikiGraphError};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Tunables for a crawl run
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Successfully processed titles between checkpoints
    pub checkpoint_interval: u32,

    /// Pause after a failed fetch
    pub retry_delay: Duration,

    /// Failures allowed per title before it is dead-lettered (0 = unlimited)
    pub max_retries: u32,

    /// Extra attempts for a failed checkpoint write
    pub checkpoint_retries: u32,

    /// Pause between checkpoint write attempts
    pub checkpoint_retry_delay: Duration,

    /// Known wiki size, for progress reporting only
    pub expected_total_pages: Option<u64>,

    /// Hash of the configuration, recorded in every checkpoint
    pub config_hash: Option<String>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            checkpoint_interval: 1,
            retry_delay: Duration::from_millis(1000),
            max_retries: 5,
            checkpoint_retries: 3,
            checkpoint_retry_delay: Duration::from_millis(500),
            expected_total_pages: None,
            config_hash: None,
        }
    }
}

impl CrawlSettings {
    /// Builds settings from the loaded configuration
    pub fn from_config(config: &Config, config_hash: Option<String>) -> Self {
        Self {
            checkpoint_interval: config.crawler.checkpoint_interval.max(1),
            retry_delay: Duration::from_millis(config.crawler.retry_delay_ms),
            max_retries: config.crawler.max_retries,
            checkpoint_retries: config.output.checkpoint_retries,
            expected_total_pages: config.crawler.expected_total_pages,
            config_hash,
            ..Self::default()
        }
    }
}

/// Summary of one `run` of the coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Titles fetched successfully
    pub processed: u64,

    /// Fetch attempts that failed
    pub failed_fetches: u64,

    /// Titles dead-lettered during this run
    pub dead_lettered: u64,

    /// Checkpoints written, including the final one
    pub checkpoints: u64,

    /// Whether the run ended because of cancellation
    pub cancelled: bool,

    /// Titles still queued when the run ended
    pub remaining: usize,

    /// Pages in the graph when the run ended
    pub total_pages: usize,
}

/// Main crawler coordinator structure
///
/// Owns the graph store and the frontier scheduler exclusively; the only
/// suspension points are the link fetch and the pause after a failure, so a
/// single coordinator never has two fetches in flight.
pub struct Coordinator<F, S> {
    graph: GraphStore,
    scheduler: Scheduler,
    fetcher: F,
    store: S,
    settings: CrawlSettings,
    state: DriverState,
    last_save: Option<DateTime<Utc>>,
    processed_since_checkpoint: u32,
    report: CrawlReport,
}

impl<F: LinkFetcher, S: CheckpointStore> Coordinator<F, S> {
    /// Creates a coordinator with an empty graph and frontier
    pub fn new(fetcher: F, store: S, settings: CrawlSettings) -> Self {
        let scheduler = Scheduler::new(settings.max_retries);
        Self {
            graph: GraphStore::new(),
            scheduler,
            fetcher,
            store,
            settings,
            state: DriverState::Running,
            last_save: None,
            processed_since_checkpoint: 0,
            report: CrawlReport::default(),
        }
    }

    /// Creates a coordinator, restores the last checkpoint and queues the seeds
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Source of page links
    /// * `store` - Checkpoint backend
    /// * `settings` - Crawl tunables
    /// * `seeds` - Titles to start from; ones already known are ignored
    /// * `fresh` - Ignore any existing checkpoint (it is overwritten by the
    ///   first save)
    pub fn open(
        fetcher: F,
        store: S,
        settings: CrawlSettings,
        seeds: &[String],
        fresh: bool,
    ) -> Result<Self> {
        let mut coordinator = Self::new(fetcher, store, settings);

        if fresh {
            tracing::info!("Starting fresh crawl (ignoring previous checkpoint)");
        } else {
            tracing::info!("Starting crawl (will resume from checkpoint if present)");
            let snapshot = coordinator.store.load()?;
            coordinator.restore(snapshot);
        }

        let added = coordinator.seed(seeds);
        tracing::info!(
            "Frontier ready: {} queued ({} new seeds), {} visited, {} pages in graph",
            coordinator.scheduler.frontier_size(),
            added,
            coordinator.scheduler.visited_count(),
            coordinator.graph.size()
        );

        Ok(coordinator)
    }

    /// Replaces the graph and frontier with a loaded snapshot
    pub fn restore(&mut self, snapshot: Snapshot) {
        let Snapshot { graph, state, origin } = snapshot;

        tracing::info!(
            "Restoring checkpoint ({:?}): {} pages, {} visited, {} queued, {} dead-lettered",
            origin,
            graph.size(),
            state.visited.len(),
            state.to_visit.len(),
            state.dead_letter.len()
        );

        if let (Some(saved), Some(current)) = (&state.config_hash, &self.settings.config_hash) {
            if saved != current {
                tracing::warn!(
                    "Checkpoint was written under a different configuration (hash {})",
                    saved
                );
            }
        }

        self.scheduler = Scheduler::from_state(&state, self.settings.max_retries);
        self.last_save = state.last_save;
        self.graph = graph;
    }

    /// Queues seed titles, creating their graph records
    ///
    /// # Returns
    ///
    /// The number of seeds that were not already known
    pub fn seed(&mut self, titles: &[String]) -> usize {
        for title in titles {
            self.graph.ensure(title);
        }
        self.scheduler.seed(titles)
    }

    /// Runs the main crawl loop until the frontier is empty or `cancel` fires
    ///
    /// Cancellation is checked between titles: a fetch already in flight is
    /// completed and recorded, then exactly one final checkpoint is written.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The driver reached `Stopped`
    /// * `Err(WikiGraphError)` - A checkpoint could not be written, or the
    ///   coordinator had already stopped
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<CrawlReport> {
        if self.state.is_terminal() {
            return Err(WikiGraphError::InvalidTransition {
                from: self.state,
                to: DriverState::Running,
            });
        }

        tracing::info!(
            "Starting crawl: {} queued, {} visited",
            self.scheduler.frontier_size(),
            self.scheduler.visited_count()
        );
        let start_time = Instant::now();

        while self.state.accepts_work() {
            if cancel.is_cancelled() {
                tracing::info!("Cancellation requested, stopping after current work");
                self.transition(DriverState::Stopping)?;
                self.report.cancelled = true;
                break;
            }

            let title = match self.scheduler.next() {
                Some(title) => title,
                None => {
                    tracing::info!("Frontier is empty, crawl complete");
                    break;
                }
            };

            if self.scheduler.is_visited(&title) {
                tracing::debug!("Skipping already visited '{}'", title);
                self.scheduler.mark_visited(&title);
                continue;
            }

            tracing::debug!(
                "Processing: {} ({} pages read)",
                title,
                self.progress_fraction()
            );

            match self.fetcher.fetch_links(&title).await {
                Ok(links) => {
                    self.record_links(&title, links);

                    if self.processed_since_checkpoint >= self.settings.checkpoint_interval
                        && !cancel.is_cancelled()
                    {
                        self.checkpoint().await?;
                        self.log_progress(start_time);
                    }
                }
                Err(e) => {
                    self.record_failure(&title, &e);

                    if !self.settings.retry_delay.is_zero() && !cancel.is_cancelled() {
                        tokio::select! {
                            _ = tokio::time::sleep(self.settings.retry_delay) => {}
                            _ = cancel.cancelled() => {}
                        }
                    }
                }
            }
        }

        self.checkpoint().await?;
        self.transition(DriverState::Stopped)?;

        self.report.remaining = self.scheduler.frontier_size();
        self.report.total_pages = self.graph.size();

        tracing::info!(
            "Crawl {}: {} pages processed, {} failed fetches, {} visited in total, {} still queued, in {:?}",
            if self.report.cancelled { "stopped" } else { "finished" },
            self.report.processed,
            self.report.failed_fetches,
            self.scheduler.visited_count(),
            self.report.remaining,
            start_time.elapsed()
        );

        Ok(self.report.clone())
    }

    /// Applies a successful fetch to the graph and frontier
    fn record_links(&mut self, title: &str, links: Vec<String>) {
        let mut discovered = 0;
        for link in &links {
            if self.scheduler.enqueue_if_new(link) {
                discovered += 1;
            }
        }

        tracing::debug!(
            "'{}' links to {} pages ({} newly discovered)",
            title,
            links.len(),
            discovered
        );

        self.graph.set_outbound_links(title, links);
        self.scheduler.mark_visited(title);
        self.processed_since_checkpoint += 1;
        self.report.processed += 1;
    }

    /// Hands a failed title back to the scheduler
    fn record_failure(&mut self, title: &str, error: &FetchError) {
        self.report.failed_fetches += 1;

        match self.scheduler.requeue(title) {
            RequeueOutcome::Requeued { failures } => {
                tracing::warn!(
                    "Failed to fetch '{}' (attempt {}): {}; requeued",
                    title,
                    failures,
                    error
                );
            }
            RequeueOutcome::DeadLettered { failures } => {
                self.report.dead_lettered += 1;
                tracing::warn!(
                    "Failed to fetch '{}' {} times: {}; giving up on it",
                    title,
                    failures,
                    error
                );
            }
        }
    }

    /// Writes a full checkpoint, retrying failed writes
    async fn checkpoint(&mut self) -> Result<()> {
        let mut state = self.scheduler.snapshot();
        state.config_hash = self.settings.config_hash.clone();

        let mut attempt = 0;
        loop {
            match self.store.save(&self.graph, &state) {
                Ok(saved_at) => {
                    self.last_save = Some(saved_at);
                    self.processed_since_checkpoint = 0;
                    self.report.checkpoints += 1;
                    tracing::debug!(
                        "Checkpoint saved: {} pages, {} visited, {} queued",
                        self.graph.size(),
                        state.visited.len(),
                        state.to_visit.len()
                    );
                    return Ok(());
                }
                Err(e) if attempt < self.settings.checkpoint_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Checkpoint write failed (attempt {} of {}): {}",
                        attempt,
                        self.settings.checkpoint_retries + 1,
                        e
                    );
                    tokio::time::sleep(self.settings.checkpoint_retry_delay).await;
                }
                Err(e) => {
                    tracing::error!("Checkpoint write failed, giving up: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    fn transition(&mut self, next: DriverState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(WikiGraphError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("Driver {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn progress_fraction(&self) -> String {
        match self.settings.expected_total_pages {
            Some(expected) => format!("{}/{}", self.scheduler.visited_count(), expected),
            None => self.scheduler.visited_count().to_string(),
        }
    }

    fn log_progress(&self, start_time: Instant) {
        let elapsed = start_time.elapsed();
        let rate = self.report.processed as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
        tracing::info!(
            "Progress: {} visited, {} in frontier, {} pages in graph, {:.2} pages/sec",
            self.progress_fraction(),
            self.scheduler.frontier_size(),
            self.graph.size(),
            rate
        );
    }

    /// Current driver state
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// The accumulated link graph
    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    /// The frontier scheduler
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The checkpoint backend
    pub fn store(&self) -> &S {
        &self.store
    }

    /// When the last checkpoint was written (or loaded)
    pub fn last_save(&self) -> Option<DateTime<Utc>> {
        self.last_save
    }
}

/// Runs the main crawl operation against the configured wiki
///
/// This function:
///
/// 1. Builds the MediaWiki link fetcher
/// 2. Opens the JSON checkpoint (with recovery) unless `fresh` is set
/// 3. Seeds the frontier
/// 4. Runs the crawl loop until the frontier empties or `cancel` fires
///
/// # Example
///
/// ```no_run
/// use wiki_graph::config::load_config;
/// use wiki_graph::crawler::run_crawl;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// run_crawl(&config, None, false, CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    config_hash: Option<String>,
    fresh: bool,
    cancel: CancellationToken,
) -> Result<CrawlReport> {
    let fetcher = MediaWikiFetcher::from_config(&config.api, &config.user_agent)?;
    let store = JsonCheckpointStore::new(&config.output.checkpoint_path)
        .with_max_recovery_attempts(config.crawler.max_recovery_attempts);
    let settings = CrawlSettings::from_config(config, config_hash);

    let mut coordinator = Coordinator::open(fetcher, store, settings, &config.seeds, fresh)?;
    coordinator.run(&cancel).await
}
