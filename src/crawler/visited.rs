use std::collections::HashSet;
use std::sync::Mutex;
use url::Url;

/// Set of normalized URLs that were already enqueued or fetched
///
/// The set only grows during a session. `mark_visited` is the single
/// check-and-insert used by the workers, so two workers that discover the same
/// link at the same time cannot both enqueue it.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a set, e.g. from the crawl store when resuming
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: Mutex::new(urls.into_iter().map(Into::into).collect()),
        }
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.lock().contains(url.as_str())
    }

    /// Inserts `url`, returning true only if it was not present before
    pub fn mark_visited(&self, url: &Url) -> bool {
        self.lock().insert(url.as_str().to_string())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // A panic while holding the guard cannot leave the set half-updated
        self.urls.lock().unwrap_or_else(|e| e.into_inner())
    }
}
