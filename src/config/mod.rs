//! Configuration module for Linkdump
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key is optional; command-line flags are applied on top by the binary.
//!
//! # Example
//!
//! ```no_run
//! use linkdump::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("linkdump.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub(crate) use parser::hash_bytes;
pub use validation::{resolve_seed, validate};

impl Config {
    /// Validates the configuration (after command-line overrides were applied)
    pub fn validate(&self) -> crate::ConfigResult<()> {
        validate(self)
    }

    /// Hash identifying this configuration when it was not loaded from a file
    pub fn fingerprint(&self) -> String {
        hash_bytes(format!("{:?}", self).as_bytes())
    }
}
