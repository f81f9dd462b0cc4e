//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::crawler::ClueAnswer;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{CrosswordPageRecord, RunRecord, RunStatus, SitemapRecord};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::{Path, PathBuf};

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens the database at `path`, creating a fresh one when needed
    ///
    /// When `rebuild` is true, or no file exists at `path`, any existing database
    /// (including its WAL side files) is deleted and a new schema is created.
    /// Otherwise the existing data is kept as-is.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `rebuild` - Whether to discard existing data
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError::Init)` - The location could not be used
    pub fn open_or_create(path: &Path, rebuild: bool) -> StorageResult<Self> {
        if rebuild || !path.exists() {
            if rebuild {
                tracing::info!("Rebuilding database at {}", path.display());
            } else {
                tracing::info!("Creating new database at {}", path.display());
            }
            remove_database_files(path).map_err(|e| init_error(path, e))?;
        }

        let conn = Connection::open(path).map_err(|e| init_error(path, e))?;

        // Configure SQLite for a single sequential writer
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )
        .map_err(|e| init_error(path, e))?;

        initialize_schema(&conn).map_err(|e| init_error(path, e))?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Deletes a database file and its WAL/SHM siblings, ignoring missing files
fn remove_database_files(path: &Path) -> std::io::Result<()> {
    let mut targets = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm"] {
        let mut side = path.as_os_str().to_owned();
        side.push(suffix);
        targets.push(PathBuf::from(side));
    }

    for target in targets {
        match std::fs::remove_file(&target) {
            Ok(()) => tracing::debug!("Removed {}", target.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

fn init_error<E>(path: &Path, source: E) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::Init {
        path: path.to_path_buf(),
        source: Box::new(source),
    }
}

/// Maps constraint failures on a write to `StorageError::Write`
fn write_error(err: rusqlite::Error) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StorageError::Write(message.clone().unwrap_or_else(|| failure.to_string()))
        }
        _ => StorageError::Sqlite(err),
    }
}

/// Writes one clue/answer pair and its links on an open transaction
fn insert_pair(conn: &Connection, clue: &str, answer: &str, page_id: i64) -> StorageResult<()> {
    conn.execute("INSERT OR IGNORE INTO questions (question) VALUES (?1)", params![clue])
        .map_err(write_error)?;
    let question_id: i64 = conn.query_row(
        "SELECT id FROM questions WHERE question = ?1",
        params![clue],
        |row| row.get(0),
    )?;

    // A new answer row on every call; links go to the oldest row with this text
    conn.execute("INSERT INTO answers (answer) VALUES (?1)", params![answer])
        .map_err(write_error)?;
    let answer_id: i64 = conn.query_row(
        "SELECT id FROM answers WHERE answer = ?1 ORDER BY id LIMIT 1",
        params![answer],
        |row| row.get(0),
    )?;

    conn.execute(
        "INSERT INTO questions_date (question_id, date_id) VALUES (?1, ?2)",
        params![question_id, page_id],
    )
    .map_err(write_error)?;
    conn.execute(
        "INSERT INTO answers_date (answer_id, date_id) VALUES (?1, ?2)",
        params![answer_id, page_id],
    )
    .map_err(write_error)?;
    conn.execute(
        "INSERT OR IGNORE INTO question_answer (question_id, answer_id) VALUES (?1, ?2)",
        params![question_id, answer_id],
    )
    .map_err(write_error)?;

    Ok(())
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status: String = row.get(4)?;
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&status).unwrap_or(RunStatus::Failed),
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
                params![now, config_hash, RunStatus::Running.to_db_string()],
            )
            .map_err(write_error)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self
            .conn
            .execute(
                "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
                params![status.to_db_string(), now, run_id],
            )
            .map_err(write_error)?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Sitemaps =====

    fn insert_sitemap_entry(&mut self, url: &str, processed: bool) -> StorageResult<bool> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO sitemap_url (url, processed) VALUES (?1, ?2)",
                params![url, processed],
            )
            .map_err(write_error)?;
        Ok(inserted > 0)
    }

    fn list_unprocessed_sitemap_entries(&self) -> StorageResult<Vec<SitemapRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, url, processed FROM sitemap_url WHERE processed = 0 ORDER BY id")?;

        let entries = stmt
            .query_map([], |row| {
                Ok(SitemapRecord {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    processed: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn mark_sitemap_processed(&mut self, id: i64) -> StorageResult<()> {
        self.conn
            .execute(
                "UPDATE sitemap_url SET processed = 1 WHERE id = ?1",
                params![id],
            )
            .map_err(write_error)?;
        Ok(())
    }

    // ===== Crossword Pages =====

    fn insert_crossword_page(
        &mut self,
        url: &str,
        processed: bool,
        date: &str,
    ) -> StorageResult<bool> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO crossword_url (url, processed, date) VALUES (?1, ?2, ?3)",
                params![url, processed, date],
            )
            .map_err(write_error)?;
        Ok(inserted > 0)
    }

    fn list_unprocessed_crossword_pages(&self) -> StorageResult<Vec<CrosswordPageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, processed, date FROM crossword_url WHERE processed = 0 ORDER BY id",
        )?;

        let pages = stmt
            .query_map([], |row| {
                Ok(CrosswordPageRecord {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    processed: row.get(2)?,
                    date: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pages)
    }

    fn get_crossword_page_by_date(&self, date: &str) -> StorageResult<Option<CrosswordPageRecord>> {
        let page = self
            .conn
            .query_row(
                "SELECT id, url, processed, date FROM crossword_url WHERE date = ?1",
                params![date],
                |row| {
                    Ok(CrosswordPageRecord {
                        id: row.get(0)?,
                        url: row.get(1)?,
                        processed: row.get(2)?,
                        date: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(page)
    }

    fn mark_crossword_page_processed(&mut self, id: i64) -> StorageResult<()> {
        self.conn
            .execute(
                "UPDATE crossword_url SET processed = 1 WHERE id = ?1",
                params![id],
            )
            .map_err(write_error)?;
        Ok(())
    }

    // ===== Clues and Answers =====

    fn record_clue_answer(&mut self, clue: &str, answer: &str, page_id: i64) -> StorageResult<()> {
        // Dropping the transaction on an early return rolls everything back
        let tx = self.conn.transaction()?;
        insert_pair(&tx, clue, answer, page_id)?;
        tx.commit()?;
        Ok(())
    }

    fn record_page(&mut self, page_id: i64, pairs: &[ClueAnswer]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        for pair in pairs {
            insert_pair(&tx, &pair.clue, &pair.answer, page_id)?;
        }
        tx.execute("UPDATE crossword_url SET processed = 1 WHERE id = ?1", params![page_id])
            .map_err(write_error)?;
        tx.commit()?;
        Ok(())
    }

    // ===== Statistics =====

    fn count_sitemap_entries(&self, processed: Option<bool>) -> StorageResult<u64> {
        match processed {
            None => self.count("SELECT COUNT(*) FROM sitemap_url"),
            Some(true) => self.count("SELECT COUNT(*) FROM sitemap_url WHERE processed = 1"),
            Some(false) => self.count("SELECT COUNT(*) FROM sitemap_url WHERE processed = 0"),
        }
    }

    fn count_crossword_pages(&self, processed: Option<bool>) -> StorageResult<u64> {
        match processed {
            None => self.count("SELECT COUNT(*) FROM crossword_url"),
            Some(true) => self.count("SELECT COUNT(*) FROM crossword_url WHERE processed = 1"),
            Some(false) => self.count("SELECT COUNT(*) FROM crossword_url WHERE processed = 0"),
        }
    }

    fn count_clues(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM questions")
    }

    fn count_answers(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM answers")
    }

    fn count_clue_answer_links(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM question_answer")
    }

    fn count_date_links(&self) -> StorageResult<(u64, u64)> {
        let clue_links = self.count("SELECT COUNT(*) FROM questions_date")?;
        let answer_links = self.count("SELECT COUNT(*) FROM answers_date")?;
        Ok((clue_links, answer_links))
    }
}
