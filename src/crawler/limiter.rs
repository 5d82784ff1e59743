//! Per-host politeness limiter
//!
//! Every host gets its own slot (state + wake-up signal). The map of slots is
//! locked only to look a slot up; waiting for a host never holds any lock, so a
//! busy host cannot stall workers headed for other hosts.

use crate::state::{HostLimits, HostState, Readiness};
use crate::CrawlError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct HostSlot {
    state: Mutex<HostState>,
    released: Notify,
}

impl HostSlot {
    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Enforces the per-host concurrency cap and minimum delay between fetch starts
#[derive(Debug)]
pub struct HostLimiter {
    limits: HostLimits,
    hosts: Mutex<HashMap<String, Arc<HostSlot>>>,
    shutdown: CancellationToken,
}

impl HostLimiter {
    pub fn new(limits: HostLimits, shutdown: CancellationToken) -> Self {
        Self {
            limits,
            hosts: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    pub fn limits(&self) -> HostLimits {
        self.limits
    }

    /// Waits until a fetch to `host` may start and reserves a slot for it
    ///
    /// # Returns
    ///
    /// * `Ok(HostPermit)` - The fetch may start; drop the permit when the request is done
    /// * `Err(CrawlError::Cancelled)` - The crawl was cancelled while waiting
    pub async fn acquire(&self, host: &str) -> Result<HostPermit, CrawlError> {
        let slot = self.slot(host);

        loop {
            let released = slot.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            if self.shutdown.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }

            let cool_down = {
                let mut state = slot.lock();
                let now = Instant::now();
                match state.readiness(&self.limits, now) {
                    Readiness::Ready => {
                        state.record_start(now);
                        tracing::trace!(
                            "Host {} permit granted ({} active)",
                            host,
                            state.active_count
                        );
                        return Ok(HostPermit {
                            host: host.to_string(),
                            slot: Arc::clone(&slot),
                        });
                    }
                    Readiness::AtCapacity => None,
                    Readiness::CoolingDown(wait) => Some(wait),
                }
            };

            let delay = async {
                match cool_down {
                    Some(wait) => tokio::time::sleep(wait).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = delay => {}
                _ = &mut released => {}
                _ = self.shutdown.cancelled() => return Err(CrawlError::Cancelled),
            }
        }
    }

    /// Snapshot of a host's state, if the host was ever acquired
    pub fn host_state(&self, host: &str) -> Option<HostState> {
        let slot = self.lock_hosts().get(host).cloned()?;
        let state = slot.lock().clone();
        Some(state)
    }

    /// Number of hosts seen so far
    pub fn host_count(&self) -> usize {
        self.lock_hosts().len()
    }

    fn slot(&self, host: &str) -> Arc<HostSlot> {
        let mut hosts = self.lock_hosts();
        Arc::clone(hosts.entry(host.to_string()).or_default())
    }

    fn lock_hosts(&self) -> MutexGuard<'_, HashMap<String, Arc<HostSlot>>> {
        self.hosts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A reserved fetch slot for one host
///
/// Dropping the permit frees the slot and wakes tasks waiting on that host.
#[derive(Debug)]
pub struct HostPermit {
    host: String,
    slot: Arc<HostSlot>,
}

impl HostPermit {
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Frees the slot now (same as dropping the permit)
    pub fn release(self) {}
}

impl Drop for HostPermit {
    fn drop(&mut self) {
        self.slot.lock().record_finish();
        self.slot.released.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn limiter(max_concurrent: u32, delay: Duration) -> Arc<HostLimiter> {
        Arc::new(HostLimiter::new(
            HostLimits::new(max_concurrent, delay),
            CancellationToken::new(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_and_delay_are_respected() {
        let limiter = limiter(2, Duration::from_secs(2));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let permit = limiter.acquire("example.com").await.unwrap();
                    let started = Instant::now();
                    let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now_active, Ordering::SeqCst);

                    tokio::time::sleep(Duration::from_secs(5)).await;

                    active.fetch_sub(1, Ordering::SeqCst);
                    permit.release();
                    started
                })
            })
            .collect();

        let mut starts = Vec::new();
        for handle in handles {
            starts.push(handle.await.unwrap());
        }
        starts.sort();

        assert!(peak.load(Ordering::SeqCst) <= 2);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(2));
        }

        let state = limiter.host_state("example.com").unwrap();
        assert_eq!(state.active_count, 0);
        assert_eq!(state.total_fetches, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_host_does_not_block_other_hosts() {
        let limiter = limiter(1, Duration::from_secs(60));

        let _held = limiter.acquire("slow.example").await.unwrap();

        let before = Instant::now();
        let other = limiter.acquire("fast.example").await.unwrap();
        assert_eq!(Instant::now(), before);
        assert_eq!(other.host(), "fast.example");
        assert_eq!(limiter.host_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_slot() {
        let limiter = limiter(1, Duration::ZERO);

        let permit = limiter.acquire("example.com").await.unwrap();
        assert_eq!(limiter.host_state("example.com").unwrap().active_count, 1);

        drop(permit);
        assert_eq!(limiter.host_state("example.com").unwrap().active_count, 0);

        let _again = limiter.acquire("example.com").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_while_waiting() {
        let token = CancellationToken::new();
        let limiter = Arc::new(HostLimiter::new(
            HostLimits::new(1, Duration::ZERO),
            token.clone(),
        ));

        let _held = limiter.acquire("example.com").await.unwrap();

        let waiter = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.acquire("example.com").await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        assert!(matches!(
            waiter.await.unwrap(),
            Err(CrawlError::Cancelled)
        ));
    }

    #[test]
    fn test_unknown_host_has_no_state() {
        let limiter = limiter(2, Duration::ZERO);
        assert!(limiter.host_state("nowhere.example").is_none());
    }
}
