//! URL handling module
//!
//! This module provides link resolution and normalization, host extraction and
//! wildcard domain matching.

mod domain;
mod matcher;
mod normalize;

// Re-export main functions
pub use domain::host_key;
pub use matcher::matches_wildcard;
pub use normalize::{normalize_link, normalize_url};
