use std::time::Duration;
use tokio::time::Instant;

/// Politeness limits applied to every host independently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostLimits {
    /// Maximum number of fetches in flight to one host
    pub max_concurrent: u32,

    /// Minimum time between two fetch starts to one host
    pub min_delay: Duration,
}

impl HostLimits {
    pub fn new(max_concurrent: u32, min_delay: Duration) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            min_delay,
        }
    }
}

/// Whether a host can take another fetch right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// A fetch may start immediately
    Ready,

    /// All slots are taken; wait for a fetch to finish
    AtCapacity,

    /// A slot is free but the minimum delay has not elapsed yet
    CoolingDown(Duration),
}

/// Tracks the state of a host during crawling
///
/// Only the rate limiter mutates this; everything else sees snapshots.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// When the most recent fetch to this host started
    pub last_fetch_at: Option<Instant>,

    /// Fetches currently in flight to this host
    pub active_count: u32,

    /// Fetches started against this host in this session
    pub total_fetches: u64,
}

impl HostState {
    /// Creates a HostState for a host nobody has fetched from yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether a fetch may start at `now`
    ///
    /// Concurrency is checked before the delay, so a host that is both full and
    /// cooling down reports `AtCapacity`: its waiters need a release first.
    pub fn readiness(&self, limits: &HostLimits, now: Instant) -> Readiness {
        if self.active_count >= limits.max_concurrent {
            return Readiness::AtCapacity;
        }

        match self.time_until_next_fetch(limits, now) {
            Some(wait) => Readiness::CoolingDown(wait),
            None => Readiness::Ready,
        }
    }

    /// Time left until the minimum delay since the last fetch start has passed
    ///
    /// Returns None if the delay has already elapsed (or nothing was fetched yet).
    pub fn time_until_next_fetch(&self, limits: &HostLimits, now: Instant) -> Option<Duration> {
        let last = self.last_fetch_at?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < limits.min_delay {
            Some(limits.min_delay - elapsed)
        } else {
            None
        }
    }

    /// Records that a fetch to this host started at `now`
    pub fn record_start(&mut self, now: Instant) {
        self.active_count += 1;
        self.total_fetches += 1;
        self.last_fetch_at = Some(now);
    }

    /// Records that an in-flight fetch to this host finished
    pub fn record_finish(&mut self) {
        self.active_count = self.active_count.saturating_sub(1);
    }
}
