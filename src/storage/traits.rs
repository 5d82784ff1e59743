//! Storage traits and error types
//!
//! This module defines the trait interface for crawl store backends and
//! associated error types.

use crate::state::TaskState;
use crate::storage::{RunRecord, RunStatus, TaskRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Unknown task state in store: {0}")]
    UnknownState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for crawl store implementations
///
/// The store journals runs and tasks so a crawl can be resumed: every
/// enqueued URL is recorded once, and its state follows the task lifecycle.
pub trait CrawlStore: Send {
    // ===== Run Management =====

    /// Creates a new crawl run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration
    /// * `seed` - Normalized seed URL
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str, seed: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recently created run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run (e.g. back to `running` when resuming)
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Sets the final status and finish time of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Task Management =====

    /// Records a newly enqueued task; an already known URL is left untouched
    fn record_task(&mut self, url: &str, depth: u32, run_id: i64) -> StorageResult<()>;

    /// Updates a task's state, with an optional error message for failures
    fn update_task_state(
        &mut self,
        url: &str,
        state: TaskState,
        error: Option<&str>,
    ) -> StorageResult<()>;

    /// Every URL ever enqueued (the visited set)
    fn load_visited(&self) -> StorageResult<Vec<String>>;

    /// Tasks not yet done or failed, in the order they were enqueued
    fn load_pending(&self) -> StorageResult<Vec<TaskRecord>>;

    /// Counts tasks in the given state
    fn count_tasks_by_state(&self, state: TaskState) -> StorageResult<u64>;

    /// Forgets all tasks (a fresh crawl); run history is kept
    fn clear_tasks(&mut self) -> StorageResult<()>;
}
