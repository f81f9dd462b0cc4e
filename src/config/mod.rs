//! Configuration module for Crossword Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every setting has a default, so the crawler can run without a config file.
//!
//! # Example
//!
//! ```no_run
//! use crossword_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Crawling {}", config.site.base_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FetcherConfig, OutputConfig, SiteConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, DEFAULT_CONFIG_HASH};
pub use validation::validate;
