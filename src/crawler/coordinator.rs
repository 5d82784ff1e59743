//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Seeding the frontier, or restoring it from the crawl store
//! - Running a fixed pool of workers over the shared frontier
//! - Coordinating rate limiting, fetching, persisting and link extraction
//! - Handling cancellation and recording the run outcome

use crate::config::Config;
use crate::crawler::parser::{decode_body, extract_links, is_html};
use crate::crawler::{
    CrawlTask, FetchOutcome, FetchResult, Fetcher, Frontier, HostLimiter, VisitedSet,
};
use crate::output::{CrawlStats, Persister, StatsRecorder};
use crate::policy::{self, FetchPolicy};
use crate::state::{HostLimits, TaskState};
use crate::storage::{CrawlStore, RunStatus, StorageResult};
use crate::url::{host_key, normalize_url};
use crate::{CrawlError, UrlError};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

const NOT_ENQUEUED: &str = "not enqueued: depth limit or page budget reached";

type SharedStore = Arc<Mutex<Box<dyn CrawlStore>>>;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    store: Option<SharedStore>,
    policy: Arc<dyn FetchPolicy>,
    config_hash: String,
    fresh: bool,
    shutdown: CancellationToken,
}

impl Coordinator {
    /// Creates a coordinator for the given configuration
    ///
    /// The fetch policy is built from `crawler.allowed-domains`; no crawl store
    /// is attached until [`with_store`](Self::with_store) is called.
    pub fn new(config: Config) -> Self {
        let policy: Arc<dyn FetchPolicy> =
            Arc::from(policy::from_allowed_domains(&config.crawler.allowed_domains));
        let config_hash = config.fingerprint();

        Self {
            config: Arc::new(config),
            store: None,
            policy,
            config_hash,
            fresh: false,
            shutdown: CancellationToken::new(),
        }
    }

    /// Attaches a crawl store, making the crawl resumable
    pub fn with_store(mut self, store: impl CrawlStore + 'static) -> Self {
        self.store = Some(Arc::new(Mutex::new(Box::new(store))));
        self
    }

    /// Replaces the fetch policy
    pub fn with_policy(mut self, policy: impl FetchPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Sets the configuration hash recorded with the run
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// Ignore any resumable run in the crawl store and start over
    pub fn fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    /// Token that stops the crawl when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs the crawl until the frontier drains or the crawl is cancelled
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlStats)` - Crawl completed or was interrupted cleanly
    /// * `Err(CrawlError)` - Startup failed (HTTP client, output directory, crawl store)
    pub async fn run(&self, seed: &Url) -> Result<CrawlStats, CrawlError> {
        let seed = normalize_url(seed.as_str())?;
        let crawler = &self.config.crawler;

        let fetcher = Fetcher::new(crawler, &self.config.user_agent)?;
        let persister = Persister::create(&self.config.output.output_dir).await?;

        let limits = HostLimits::new(crawler.per_host_concurrency, crawler.per_host_delay());
        let frontier = Frontier::new(crawler.max_depth, crawler.max_pages, self.shutdown.clone());
        let stats = StatsRecorder::new();

        let (run_id, visited) = self.prepare_session(&seed, &frontier, &stats)?;

        let ctx = Arc::new(CrawlContext {
            frontier,
            visited,
            limiter: HostLimiter::new(limits, self.shutdown.clone()),
            fetcher,
            persister,
            policy: Arc::clone(&self.policy),
            stats,
            store: self.store.clone(),
            run_id,
            shutdown: self.shutdown.clone(),
        });

        tracing::info!(
            "Starting crawl from {} (max depth {}, {} workers, {} queued)",
            seed,
            crawler.max_depth,
            crawler.parallelism,
            ctx.frontier.len()
        );

        let mut workers = JoinSet::new();
        for worker_id in 0..crawler.parallelism.max(1) {
            let ctx = Arc::clone(&ctx);
            workers.spawn(async move { ctx.worker(worker_id).await });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Crawl worker stopped abnormally: {}", e);
            }
        }

        let cancelled = self.shutdown.is_cancelled();
        if let Some(run_id) = run_id {
            let status = if cancelled {
                RunStatus::Interrupted
            } else {
                RunStatus::Completed
            };
            ctx.with_store(|store| store.finish_run(run_id, status));
        }

        let stats = ctx
            .stats
            .snapshot(ctx.limiter.host_count() as u64, cancelled);

        if cancelled {
            tracing::warn!(
                "Crawl interrupted after {} pages ({} still queued)",
                stats.pages_persisted,
                ctx.frontier.len()
            );
        } else {
            tracing::info!(
                "Crawl complete: {} pages persisted in {:.1}s",
                stats.pages_persisted,
                stats.elapsed.as_secs_f64()
            );
        }

        Ok(stats)
    }

    /// Seeds the frontier, resuming from the crawl store when possible
    ///
    /// Crawl store errors here are fatal; once the crawl runs they are only logged.
    fn prepare_session(
        &self,
        seed: &Url,
        frontier: &Frontier,
        stats: &StatsRecorder,
    ) -> Result<(Option<i64>, VisitedSet), CrawlError> {
        let Some(store) = &self.store else {
            let visited = VisitedSet::new();
            visited.mark_visited(seed);
            frontier.push(CrawlTask::new(seed.clone(), 0));
            return Ok((None, visited));
        };

        let mut store = store.lock().unwrap_or_else(|e| e.into_inner());

        let resumable = match store.get_latest_run()? {
            Some(run) if run.is_resumable() && !self.fresh => Some(run),
            _ => None,
        };

        if let Some(run) = resumable {
            if run.seed != seed.as_str() {
                tracing::warn!(
                    "Resuming run {} which started from {}, not {}",
                    run.id,
                    run.seed,
                    seed
                );
            }
            store.update_run_status(run.id, RunStatus::Running)?;

            let visited = VisitedSet::from_urls(store.load_visited()?);
            let mut restored = 0;
            for record in store.load_pending()? {
                let dropped = match Url::parse(&record.url) {
                    Ok(url) => {
                        if frontier.push(CrawlTask::new(url, record.depth)) {
                            restored += 1;
                            continue;
                        }
                        NOT_ENQUEUED.to_string()
                    }
                    Err(e) => {
                        tracing::warn!("Dropping stored task {}: {}", record.url, e);
                        format!("unparseable URL: {}", e)
                    }
                };
                store.update_task_state(&record.url, TaskState::Failed, Some(dropped.as_str()))?;
            }

            stats.tasks_resumed(restored);
            tracing::info!(
                "Resuming run {}: {} known URLs, {} pending tasks",
                run.id,
                visited.len(),
                restored
            );
            return Ok((Some(run.id), visited));
        }

        store.clear_tasks()?;
        let run_id = store.create_run(&self.config_hash, seed.as_str())?;
        tracing::info!("Starting new run {}", run_id);

        let visited = VisitedSet::new();
        visited.mark_visited(seed);
        store.record_task(seed.as_str(), 0, run_id)?;
        frontier.push(CrawlTask::new(seed.clone(), 0));

        Ok((Some(run_id), visited))
    }
}

/// State shared by all workers of one crawl
struct CrawlContext {
    frontier: Frontier,
    visited: VisitedSet,
    limiter: HostLimiter,
    fetcher: Fetcher,
    persister: Persister,
    policy: Arc<dyn FetchPolicy>,
    stats: StatsRecorder,
    store: Option<SharedStore>,
    run_id: Option<i64>,
    shutdown: CancellationToken,
}

/// How a popped task ended
enum TaskOutcome {
    Done,
    Failed(String),
    /// Abandoned because of cancellation; stays pending in the crawl store
    Cancelled,
}

/// Calls `task_done` even if processing the task panics
struct InFlightGuard<'a>(&'a Frontier);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.task_done();
    }
}

impl CrawlContext {
    async fn worker(&self, worker_id: u32) {
        tracing::debug!("Worker {} started", worker_id);

        while let Some(task) = self.frontier.pop().await {
            let _in_flight = InFlightGuard(&self.frontier);

            match self.execute(&task).await {
                TaskOutcome::Done => self.journal(&task, TaskState::Done, None),
                TaskOutcome::Failed(reason) => {
                    self.journal(&task, TaskState::Failed, Some(&reason))
                }
                TaskOutcome::Cancelled => {
                    tracing::debug!("Abandoned {} after cancellation", task.url);
                }
            }
        }

        tracing::debug!("Worker {} finished", worker_id);
    }

    async fn execute(&self, task: &CrawlTask) -> TaskOutcome {
        match self.process(task).await {
            Ok(()) => TaskOutcome::Done,
            Err(CrawlError::Cancelled) => TaskOutcome::Cancelled,
            Err(e) => TaskOutcome::Failed(e.to_string()),
        }
    }

    /// Drives one task through its lifecycle
    async fn process(&self, task: &CrawlTask) -> Result<(), CrawlError> {
        let mut state = TaskState::Queued;

        if !self.policy.allows(&task.url) {
            self.stats.skipped_by_policy();
            tracing::debug!("Fetch policy rejected {}", task.url);
            return Err(CrawlError::PolicyRejected(task.url.to_string()));
        }

        let host = host_key(&task.url).ok_or(UrlError::MissingDomain)?;

        state = advance(task, state, TaskState::Limited)?;
        let permit = self.limiter.acquire(&host).await?;

        state = advance(task, state, TaskState::Fetching)?;
        let fetched = tokio::select! {
            result = self.fetcher.fetch(&task.url) => result,
            _ = self.shutdown.cancelled() => return Err(CrawlError::Cancelled),
        };
        permit.release();

        let fetched = match fetched {
            Ok(FetchOutcome::Page(fetched)) => {
                self.stats.page_fetched();
                fetched
            }
            Ok(FetchOutcome::Redirect { status, location }) => {
                state = advance(task, state, TaskState::Extracting)?;
                tracing::debug!("{} redirected ({}) to {}", task.url, status, location);
                self.follow_redirect(task, &location)?;
                advance(task, state, TaskState::Done)?;
                return Ok(());
            }
            Err(e) => {
                self.stats.fetch_failed(&e);
                tracing::warn!("Failed to fetch {} ({}): {}", task.url, e.kind(), e);
                return Err(e.into());
            }
        };

        state = advance(task, state, TaskState::Extracting)?;
        if self.shutdown.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }

        let persisted = self.persist(task, &fetched).await;

        if task.depth < self.frontier.max_depth()
            && is_html(fetched.content_type.as_deref())
        {
            self.enqueue_links(task, &fetched.final_url, &fetched.body);
        }

        persisted?;
        advance(task, state, TaskState::Done)?;
        Ok(())
    }

    async fn persist(&self, task: &CrawlTask, fetched: &FetchResult) -> Result<(), CrawlError> {
        let page = self.persister.assign(fetched, task.depth);
        match self.persister.save(&page).await {
            Ok(path) => {
                let total = self.stats.page_persisted();
                tracing::info!("[depth {}] {} -> {}", task.depth, task.url, path.display());
                if total % 10 == 0 {
                    tracing::info!(
                        "Progress: {} pages persisted, {} queued, {} in flight",
                        total,
                        self.frontier.len(),
                        self.frontier.in_flight()
                    );
                }
                Ok(())
            }
            Err(e) => {
                self.stats.persist_failed();
                tracing::warn!("Failed to persist {}: {}", task.url, e);
                Err(e.into())
            }
        }
    }

    /// Queues a redirect target at the depth of the task that was redirected
    ///
    /// The target is checked against the fetch policy and the visited set
    /// like any other link; a target that was already seen ends here.
    fn follow_redirect(&self, task: &CrawlTask, location: &Url) -> Result<(), CrawlError> {
        let target = normalize_url(location.as_str())?;

        if !self.policy.allows(&target) {
            self.stats.skipped_by_policy();
            tracing::debug!("Fetch policy rejected redirect target {}", target);
            return Err(CrawlError::PolicyRejected(target.to_string()));
        }

        if !self.visited.mark_visited(&target) {
            tracing::debug!("Redirect target {} already seen", target);
            return Ok(());
        }

        if self.enqueue(CrawlTask::new(target, task.depth)) {
            self.stats.redirect_enqueued();
        }
        Ok(())
    }

    /// Extracts links from a fetched page and enqueues the unseen ones
    fn enqueue_links(&self, parent: &CrawlTask, base: &Url, body: &[u8]) {
        let html = decode_body(body);
        let depth = parent.depth + 1;
        let mut discovered = 0;

        for link in extract_links(&html, base) {
            discovered += 1;

            if !self.policy.allows(&link) {
                self.stats.skipped_by_policy();
                continue;
            }

            if !self.visited.mark_visited(&link) {
                continue;
            }

            if self.enqueue(CrawlTask::new(link, depth)) {
                self.stats.link_enqueued();
            }
        }

        self.stats.links_discovered(discovered);
        tracing::debug!("{} links found on {}", discovered, parent.url);
    }

    /// Journals a newly discovered task and pushes it onto the frontier
    fn enqueue(&self, task: CrawlTask) -> bool {
        if let Some(run_id) = self.run_id {
            self.with_store(|store| store.record_task(task.url.as_str(), task.depth, run_id));
        }

        let url = task.url.clone();
        let queued = self.frontier.push(task);
        if !queued {
            self.journal_url(&url, TaskState::Failed, Some(NOT_ENQUEUED));
        }
        queued
    }

    fn journal(&self, task: &CrawlTask, state: TaskState, error: Option<&str>) {
        self.journal_url(&task.url, state, error);
    }

    fn journal_url(&self, url: &Url, state: TaskState, error: Option<&str>) {
        if self.run_id.is_some() {
            self.with_store(|store| store.update_task_state(url.as_str(), state, error));
        }
    }

    /// Runs a crawl store operation, logging (not propagating) failures
    fn with_store<T>(
        &self,
        op: impl FnOnce(&mut dyn CrawlStore) -> StorageResult<T>,
    ) -> Option<T> {
        let store = self.store.as_ref()?;
        let mut guard = store.lock().unwrap_or_else(|e| e.into_inner());
        match op(guard.as_mut()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Crawl store error: {}", e);
                None
            }
        }
    }
}

fn advance(task: &CrawlTask, from: TaskState, to: TaskState) -> Result<TaskState, CrawlError> {
    let next = from.advance(to)?;
    tracing::trace!("{}: {} -> {}", task.url, from, next);
    Ok(next)
}
