//! Storage module for the durable crawl store
//!
//! This module journals crawl progress to SQLite, including:
//! - Database initialization and schema management
//! - Run tracking (running, completed, interrupted)
//! - Every enqueued task and its lifecycle state, for resumption

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{CrawlStore, StorageError, StorageResult};

use crate::state::TaskState;
use std::path::Path;

/// Opens (or creates) the crawl store at `path`
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub seed: String,
    pub status: RunStatus,
}

impl RunRecord {
    /// True if this run stopped before its frontier drained
    pub fn is_resumable(&self) -> bool {
        matches!(self.status, RunStatus::Running | RunStatus::Interrupted)
    }
}

/// A journaled crawl task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub url: String,
    pub depth: u32,
    pub state: TaskState,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}
