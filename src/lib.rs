//! Crossword Harvest: a resumable crossword-answers crawler
//!
//! This crate walks the sitemap of a crossword-answers website, discovers one
//! crossword page per publication date, extracts the clue/answer pairs from each
//! page and stores them in a normalized SQLite database. Every pass is
//! idempotent, so an interrupted run picks up where it stopped.

pub mod config;
pub mod crawler;
pub mod output;
pub mod site;
pub mod storage;

use thiserror::Error;

/// Main error type for Crossword Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] crawler::ExtractionError),

    #[error("Sitemap error: {0}")]
    Sitemap(#[from] crawler::SitemapError),

    #[error("Failed to fetch {url} after {attempts} attempts: {reason}")]
    Fetch {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Root sitemap {url} unavailable after {attempts} attempts: {reason}")]
    RootSitemapUnavailable {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid URL pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Crossword Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, RunSummary};
pub use site::SiteLayout;
pub use storage::{SqliteStorage, Storage};
