//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the crossword database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Second-level sitemaps discovered from the sitemap index
CREATE TABLE IF NOT EXISTS sitemap_url (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    processed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_sitemap_url_processed ON sitemap_url(processed);

-- One crossword page per publication date
CREATE TABLE IF NOT EXISTS crossword_url (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    processed INTEGER NOT NULL DEFAULT 0,
    date TEXT NOT NULL UNIQUE
);

CREATE INDEX IF NOT EXISTS idx_crossword_url_processed ON crossword_url(processed);

-- Clue text, deduplicated
CREATE TABLE IF NOT EXISTS questions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    question TEXT NOT NULL UNIQUE
);

-- Answer text, one row per sighting
CREATE TABLE IF NOT EXISTS answers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    answer TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS questions_date (
    question_id INTEGER NOT NULL REFERENCES questions(id),
    date_id INTEGER NOT NULL REFERENCES crossword_url(id)
);

CREATE INDEX IF NOT EXISTS idx_questions_date_question ON questions_date(question_id);
CREATE INDEX IF NOT EXISTS idx_questions_date_date ON questions_date(date_id);

CREATE TABLE IF NOT EXISTS answers_date (
    answer_id INTEGER NOT NULL REFERENCES answers(id),
    date_id INTEGER NOT NULL REFERENCES crossword_url(id)
);

CREATE INDEX IF NOT EXISTS idx_answers_date_answer ON answers_date(answer_id);
CREATE INDEX IF NOT EXISTS idx_answers_date_date ON answers_date(date_id);

CREATE TABLE IF NOT EXISTS question_answer (
    question_id INTEGER NOT NULL REFERENCES questions(id),
    answer_id INTEGER NOT NULL REFERENCES answers(id),
    UNIQUE(question_id, answer_id)
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
