//! Lifecycle of a single crawl task
//!
//! ```text
//! Queued -> Limited -> Fetching -> Extracting -> Done
//!    \          \          \            \
//!     +----------+----------+------------+--> Failed
//! ```

use crate::CrawlError;
use std::fmt;

/// Represents the current state of a crawl task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Waiting in the frontier
    Queued,

    /// Popped and waiting for a host permit
    Limited,

    /// HTTP request in flight
    Fetching,

    /// Body received; persisting and extracting links
    Extracting,

    /// Page persisted and children enqueued
    Done,

    /// Task dropped (policy, fetch, or persist failure)
    Failed,
}

impl TaskState {
    /// Returns true if no further processing happens for this task
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal step
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        match (self, next) {
            (Self::Queued, Self::Limited)
            | (Self::Limited, Self::Fetching)
            | (Self::Fetching, Self::Extracting)
            | (Self::Extracting, Self::Done) => true,
            (from, Self::Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Moves to `next`, rejecting transitions the lifecycle does not allow
    pub fn advance(self, next: TaskState) -> Result<TaskState, CrawlError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CrawlError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Converts the task state to its crawl store representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Limited => "limited",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parses a task state from its crawl store representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "limited" => Some(Self::Limited),
            "fetching" => Some(Self::Fetching),
            "extracting" => Some(Self::Extracting),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
