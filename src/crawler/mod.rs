//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The visited set and the frontier queue shared by the workers
//! - Per-host rate limiting
//! - HTTP fetching with error classification
//! - HTML parsing and link extraction
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod limiter;
mod parser;
mod visited;

pub use coordinator::Coordinator;
pub use fetcher::{
    build_http_client, FetchError, FetchOutcome, FetchResult, Fetcher, MAX_REDIRECTS,
};
pub use frontier::Frontier;
pub use limiter::{HostLimiter, HostPermit};
pub use parser::{decode_body, extract_links, is_html};
pub use visited::VisitedSet;

use crate::config::Config;
use crate::output::CrawlStats;
use crate::CrawlError;
use url::Url;

/// A URL scheduled for fetching, with its distance from the seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Normalized absolute URL
    pub url: Url,

    /// Number of links followed from the seed (the seed is 0)
    pub depth: u32,
}

impl CrawlTask {
    pub fn new(url: Url, depth: u32) -> Self {
        Self { url, depth }
    }
}

/// Runs a complete crawl from `seed` without a crawl store
///
/// # Returns
///
/// * `Ok(CrawlStats)` - Crawl finished (or was cancelled) cleanly
/// * `Err(CrawlError)` - Startup failed
pub async fn crawl(config: Config, seed: &Url) -> Result<CrawlStats, CrawlError> {
    Coordinator::new(config).run(seed).await
}
