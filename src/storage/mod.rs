//! Storage module for persisting harvested crossword data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database creation, rebuild and schema management
//! - Sitemap and crossword page queues with `processed` flags
//! - Normalized clue/answer storage and their date links
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use std::path::Path;

/// Opens the store at `path`, rebuilding it when asked or when it is missing
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
/// * `rebuild` - Discard any existing database first
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Store ready for use
/// * `Err(StorageError::Init)` - The location is not usable
pub fn open_storage(path: &Path, rebuild: bool) -> StorageResult<SqliteStorage> {
    SqliteStorage::open_or_create(path, rebuild)
}

/// A second-level sitemap in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapRecord {
    pub id: i64,
    pub url: String,
    pub processed: bool,
}

/// A crossword page in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrosswordPageRecord {
    pub id: i64,
    pub url: String,
    pub processed: bool,
    /// `DD-MM-YY` token taken from the page URL
    pub date: String,
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
