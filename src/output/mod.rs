//! Output module for crawl results
//!
//! This module handles:
//! - Writing fetched pages to the output directory
//! - Recording crawl statistics and printing them when the crawl ends

mod persister;
pub mod stats;

pub use persister::{list_pages, read_page, PersistError, PersistedPage, Persister};
pub use stats::{print_statistics, CrawlStats, StatsRecorder};
