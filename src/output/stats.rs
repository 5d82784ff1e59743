//! Crawl statistics
//!
//! Workers bump lock-free counters on a shared [`StatsRecorder`]; the
//! coordinator turns them into a [`CrawlStats`] snapshot when the crawl ends.

use crate::crawler::FetchError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Successful (2xx) fetches
    pub pages_fetched: u64,

    /// Pages written to the output directory
    pub pages_persisted: u64,

    /// Failed fetches by kind (`network`, `timeout`, `http-status`, `too-large`,
    /// `too-many-redirects`)
    pub fetch_failures: BTreeMap<&'static str, u64>,

    /// Pages fetched but lost while writing
    pub persist_failures: u64,

    /// URLs rejected by the fetch policy
    pub skipped_by_policy: u64,

    /// Links found on fetched pages (after normalization)
    pub links_discovered: u64,

    /// Links that became new crawl tasks
    pub links_enqueued: u64,

    /// Redirects to another URL that became new crawl tasks
    pub redirects_enqueued: u64,

    /// Distinct hosts contacted
    pub hosts_contacted: u64,

    /// Tasks restored from the crawl store at startup
    pub resumed_tasks: u64,

    /// True if the crawl was interrupted before the frontier drained
    pub cancelled: bool,

    pub elapsed: Duration,
}

impl CrawlStats {
    pub fn total_fetch_failures(&self) -> u64 {
        self.fetch_failures.values().sum()
    }
}

/// Shared counters updated by the workers
#[derive(Debug)]
pub struct StatsRecorder {
    started: Instant,
    pages_fetched: AtomicU64,
    pages_persisted: AtomicU64,
    network_failures: AtomicU64,
    timeouts: AtomicU64,
    http_status_failures: AtomicU64,
    too_large: AtomicU64,
    redirect_loops: AtomicU64,
    persist_failures: AtomicU64,
    skipped_by_policy: AtomicU64,
    links_discovered: AtomicU64,
    links_enqueued: AtomicU64,
    redirects_enqueued: AtomicU64,
    resumed_tasks: AtomicU64,
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            pages_fetched: AtomicU64::new(0),
            pages_persisted: AtomicU64::new(0),
            network_failures: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            http_status_failures: AtomicU64::new(0),
            too_large: AtomicU64::new(0),
            redirect_loops: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            skipped_by_policy: AtomicU64::new(0),
            links_discovered: AtomicU64::new(0),
            links_enqueued: AtomicU64::new(0),
            redirects_enqueued: AtomicU64::new(0),
            resumed_tasks: AtomicU64::new(0),
        }
    }

    pub fn page_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a persisted page and returns the new total
    pub fn page_persisted(&self) -> u64 {
        self.pages_persisted.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn fetch_failed(&self, error: &FetchError) {
        let counter = match error {
            FetchError::Network(_) => &self.network_failures,
            FetchError::Timeout => &self.timeouts,
            FetchError::HttpStatus { .. } => &self.http_status_failures,
            FetchError::TooLarge { .. } => &self.too_large,
            FetchError::TooManyRedirects => &self.redirect_loops,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn persist_failed(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped_by_policy(&self) {
        self.skipped_by_policy.fetch_add(1, Ordering::Relaxed);
    }

    pub fn links_discovered(&self, count: u64) {
        self.links_discovered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn link_enqueued(&self) {
        self.links_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn redirect_enqueued(&self) {
        self.redirects_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tasks_resumed(&self, count: u64) {
        self.resumed_tasks.fetch_add(count, Ordering::Relaxed);
    }

    /// Takes a snapshot of the counters
    pub fn snapshot(&self, hosts_contacted: u64, cancelled: bool) -> CrawlStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);

        let fetch_failures = [
            ("network", load(&self.network_failures)),
            ("timeout", load(&self.timeouts)),
            ("http-status", load(&self.http_status_failures)),
            ("too-large", load(&self.too_large)),
            ("too-many-redirects", load(&self.redirect_loops)),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .collect();

        CrawlStats {
            pages_fetched: load(&self.pages_fetched),
            pages_persisted: load(&self.pages_persisted),
            fetch_failures,
            persist_failures: load(&self.persist_failures),
            skipped_by_policy: load(&self.skipped_by_policy),
            links_discovered: load(&self.links_discovered),
            links_enqueued: load(&self.links_enqueued),
            redirects_enqueued: load(&self.redirects_enqueued),
            hosts_contacted,
            resumed_tasks: load(&self.resumed_tasks),
            cancelled,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStats) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Pages fetched: {}", stats.pages_fetched);
    println!("  Pages persisted: {}", stats.pages_persisted);
    println!("  Hosts contacted: {}", stats.hosts_contacted);
    println!("  Links discovered: {}", stats.links_discovered);
    println!("  Links enqueued: {}", stats.links_enqueued);
    if stats.redirects_enqueued > 0 {
        println!("  Redirects enqueued: {}", stats.redirects_enqueued);
    }
    if stats.resumed_tasks > 0 {
        println!("  Tasks resumed: {}", stats.resumed_tasks);
    }
    println!("  Elapsed: {:.1}s", stats.elapsed.as_secs_f64());
    println!();

    if !stats.fetch_failures.is_empty() || stats.persist_failures > 0 {
        println!("Failures:");
        for (kind, count) in &stats.fetch_failures {
            println!("  {}: {}", kind, count);
        }
        if stats.persist_failures > 0 {
            println!("  persist: {}", stats.persist_failures);
        }
        println!();
    }

    if stats.skipped_by_policy > 0 {
        println!("Skipped by policy: {}", stats.skipped_by_policy);
        println!();
    }

    let attempted = stats.pages_fetched + stats.total_fetch_failures();
    let success_rate = if attempted > 0 {
        (stats.pages_persisted as f64 / attempted as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} fetches persisted)",
        success_rate, stats.pages_persisted, attempted
    );

    if stats.cancelled {
        println!("\nCrawl was interrupted; run again to resume.");
    }
}
