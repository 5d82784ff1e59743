use crate::crawler::CrawlTask;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct FrontierInner {
    queue: VecDeque<CrawlTask>,

    /// Tasks popped but not yet reported back with `task_done`
    in_flight: usize,

    /// Tasks accepted by `push` over the frontier's lifetime
    accepted: u64,
}

/// FIFO backlog of crawl tasks shared by all workers
///
/// The crawl is over when the queue is empty and no popped task is still in
/// flight: only an in-flight task can push more work. Workers therefore wait
/// in `pop` instead of exiting as soon as the queue runs dry.
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    notify: Notify,
    max_depth: u32,
    max_pages: Option<u64>,
    shutdown: CancellationToken,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `max_depth` - Tasks deeper than this are dropped on push
    /// * `max_pages` - Optional budget of tasks the frontier accepts in total
    /// * `shutdown` - Cancelling it makes every `pop` return `None`
    pub fn new(max_depth: u32, max_pages: Option<u64>, shutdown: CancellationToken) -> Self {
        Self {
            inner: Mutex::new(FrontierInner::default()),
            notify: Notify::new(),
            max_depth,
            max_pages,
            shutdown,
        }
    }

    /// Enqueues a task
    ///
    /// Returns false (and drops the task) if it is deeper than the max depth
    /// or the page budget is used up.
    pub fn push(&self, task: CrawlTask) -> bool {
        if task.depth > self.max_depth {
            tracing::trace!("Dropping {} (depth {} > {})", task.url, task.depth, self.max_depth);
            return false;
        }

        {
            let mut inner = self.lock();
            if let Some(budget) = self.max_pages {
                if inner.accepted >= budget {
                    tracing::trace!("Dropping {} (page budget of {} reached)", task.url, budget);
                    return false;
                }
            }
            inner.accepted += 1;
            inner.queue.push_back(task);
        }

        self.notify.notify_waiters();
        true
    }

    /// Takes the next task, waiting while the queue is empty but work is in flight
    ///
    /// Returns `None` once the crawl is finished or cancelled.
    pub async fn pop(&self) -> Option<CrawlTask> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a push between the check and the await is not missed
            notified.as_mut().enable();

            if self.shutdown.is_cancelled() {
                return None;
            }

            {
                let mut inner = self.lock();
                if let Some(task) = inner.queue.pop_front() {
                    inner.in_flight += 1;
                    return Some(task);
                }
                if inner.in_flight == 0 {
                    return None;
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = self.shutdown.cancelled() => return None,
            }
        }
    }

    /// Marks a popped task as finished (after its children were pushed)
    pub fn task_done(&self) {
        {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Number of queued tasks
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Number of popped tasks not yet marked done
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FrontierInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
