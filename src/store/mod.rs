//! SQLite persistence for the glossary, its token index, translation history,
//! approved translations and glossary candidates.
//! One connection behind a mutex; every method is a short critical section.

mod candidates;
mod feedback;
mod glossary;

use std::path::Path;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;

pub use glossary::TokenHit;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS glossary_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_url TEXT NOT NULL DEFAULT '',
    key_name TEXT NOT NULL DEFAULT '',
    ko TEXT NOT NULL,
    en TEXT NOT NULL DEFAULT '',
    ja TEXT NOT NULL DEFAULT '',
    zh_hans TEXT NOT NULL DEFAULT '',
    zh_hant TEXT NOT NULL DEFAULT '',
    es TEXT NOT NULL DEFAULT '',
    de TEXT NOT NULL DEFAULT '',
    fr TEXT NOT NULL DEFAULT '',
    en_north_america TEXT,
    ja_japan TEXT,
    zh_hans_china TEXT,
    zh_hant_taiwan TEXT,
    es_latin_america TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_glossary_ko ON glossary_entries(ko);

CREATE TABLE IF NOT EXISTS glossary_tokens (
    token TEXT NOT NULL,
    entry_id INTEGER NOT NULL,
    token_length INTEGER NOT NULL,
    lang TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tokens_lookup ON glossary_tokens(lang, token);
CREATE INDEX IF NOT EXISTS idx_tokens_entry ON glossary_tokens(entry_id);

CREATE TABLE IF NOT EXISTS translation_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_text TEXT NOT NULL,
    source_hash TEXT NOT NULL,
    source_lang TEXT NOT NULL,
    target_lang TEXT NOT NULL,
    translated_text TEXT NOT NULL,
    strategy TEXT NOT NULL,
    page_url TEXT,
    status TEXT NOT NULL DEFAULT 'PENDING',
    rating INTEGER,
    corrected_text TEXT,
    is_from_cache INTEGER NOT NULL DEFAULT 0,
    match_count INTEGER NOT NULL DEFAULT 0,
    verification_passed INTEGER,
    verification_issues TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_history_created ON translation_history(created_at);
CREATE INDEX IF NOT EXISTS idx_history_hash ON translation_history(source_hash, target_lang);

CREATE TABLE IF NOT EXISTS approved_translations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_hash TEXT NOT NULL,
    target_lang TEXT NOT NULL,
    source_text TEXT NOT NULL,
    approved_text TEXT NOT NULL,
    usage_count INTEGER NOT NULL DEFAULT 0,
    approval_count INTEGER NOT NULL DEFAULT 1,
    quality_score REAL NOT NULL DEFAULT 1.0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(source_hash, target_lang)
);
CREATE INDEX IF NOT EXISTS idx_approved_usage ON approved_translations(target_lang, usage_count);

CREATE TABLE IF NOT EXISTS glossary_candidates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_ko TEXT NOT NULL,
    target_lang TEXT NOT NULL,
    proposed_translation TEXT NOT NULL,
    confidence REAL NOT NULL,
    context_snippet TEXT NOT NULL DEFAULT '',
    page_url TEXT,
    occurrence_count INTEGER NOT NULL DEFAULT 1,
    status TEXT NOT NULL DEFAULT 'PENDING',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(source_ko, target_lang)
);
CREATE INDEX IF NOT EXISTS idx_candidates_status ON glossary_candidates(status);
";

/// SQLite-backed store shared by every subsystem.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path`. `:memory:` opens a private
    /// in-memory database.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = if path.as_os_str() == ":memory:" {
            Connection::open_in_memory()?
        } else {
            let conn = Connection::open(path)?;
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
            conn
        };
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        info!(path = %path.display(), "store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(Path::new(":memory:"))
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

/// Current time as Unix timestamp (seconds).
pub(crate) fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
