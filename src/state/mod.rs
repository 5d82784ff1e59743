//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TaskState`: lifecycle of a single crawl task (queued, limited, fetching, ...)
//! - `HostState`: per-host in-flight count and last fetch time, owned by the rate limiter

mod host_state;
mod task_state;

// Re-export main types
pub use host_state::{HostLimits, HostState, Readiness};
pub use task_state::TaskState;
