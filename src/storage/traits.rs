//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::crawler::ClueAnswer;
use crate::storage::{CrosswordPageRecord, RunRecord, RunStatus, SitemapRecord};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store could not be created or opened
    #[error("Failed to initialize store at {}: {source}", path.display())]
    Init {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A write hit an integrity violation other than an expected duplicate key
    #[error("Write rejected: {0}")]
    Write(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Inserts of sitemap entries and crossword pages are insert-or-ignore: a
/// duplicate URL (or date) is not an error, the call just reports that nothing
/// was inserted. `processed` flags only ever move from false to true.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new harvest run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Records the final status of a run with a finish timestamp
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Sitemaps =====

    /// Inserts a second-level sitemap URL
    ///
    /// # Returns
    ///
    /// `true` if a row was inserted, `false` if the URL was already known
    fn insert_sitemap_entry(&mut self, url: &str, processed: bool) -> StorageResult<bool>;

    /// All sitemap entries with `processed = false`, in ID order
    fn list_unprocessed_sitemap_entries(&self) -> StorageResult<Vec<SitemapRecord>>;

    /// Marks a sitemap entry as processed
    fn mark_sitemap_processed(&mut self, id: i64) -> StorageResult<()>;

    // ===== Crossword Pages =====

    /// Inserts a crossword page URL with its date
    ///
    /// A page whose URL or date is already stored is ignored.
    ///
    /// # Returns
    ///
    /// `true` if a row was inserted
    fn insert_crossword_page(
        &mut self,
        url: &str,
        processed: bool,
        date: &str,
    ) -> StorageResult<bool>;

    /// All crossword pages with `processed = false`, in ID order
    fn list_unprocessed_crossword_pages(&self) -> StorageResult<Vec<CrosswordPageRecord>>;

    /// Gets a crossword page by its date token
    fn get_crossword_page_by_date(&self, date: &str) -> StorageResult<Option<CrosswordPageRecord>>;

    /// Marks a crossword page as processed
    fn mark_crossword_page_processed(&mut self, id: i64) -> StorageResult<()>;

    // ===== Clues and Answers =====

    /// Records one clue/answer pair seen on the page `page_id`
    ///
    /// The clue is looked up by text and created if missing; a new answer row is
    /// always inserted. Both are linked to the page and to each other. Either
    /// all of these rows are written or none are.
    fn record_clue_answer(&mut self, clue: &str, answer: &str, page_id: i64) -> StorageResult<()>;

    /// Records every pair of the page `page_id` and marks the page processed
    ///
    /// The whole page is one unit: on error nothing is written and the page
    /// stays unprocessed, so a retry does not duplicate answer rows or links.
    fn record_page(&mut self, page_id: i64, pairs: &[ClueAnswer]) -> StorageResult<()>;

    // ===== Statistics =====

    /// Counts sitemap entries, optionally filtered by processed flag
    fn count_sitemap_entries(&self, processed: Option<bool>) -> StorageResult<u64>;

    /// Counts crossword pages, optionally filtered by processed flag
    fn count_crossword_pages(&self, processed: Option<bool>) -> StorageResult<u64>;

    /// Counts distinct clues
    fn count_clues(&self) -> StorageResult<u64>;

    /// Counts answer rows
    fn count_answers(&self) -> StorageResult<u64>;

    /// Counts clue/answer links
    fn count_clue_answer_links(&self) -> StorageResult<u64>;

    /// Counts clue/date and answer/date links
    fn count_date_links(&self) -> StorageResult<(u64, u64)>;
}
