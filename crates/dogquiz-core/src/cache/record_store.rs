//! SQLite record store
//!
//! Schema:
//! - breeds: one row per breed or breed variant, keyed by id
//! - images: zero or more per breed, `ON DELETE CASCADE` from breeds,
//!   partial unique index keeps at most one primary image per breed
//! - daily_stats: counters keyed by (date, category)
//! - cache_metadata: schema version
//!
//! Concurrency: one connection behind a mutex. Every multi-row write runs in
//! a transaction while holding the lock, so readers never see half of it.
//!
//! A stored schema version different from `SCHEMA_VERSION` drops and
//! recreates the breeds and images tables.

use crate::error::{QueryContext, StorageError};
use crate::event::{CacheEvent, EventBus, Table};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Current schema version
///
/// Bump when the breeds or images layout changes; those tables are rebuilt
/// on mismatch (statistics are kept).
const SCHEMA_VERSION: i32 = 1;

/// Database file name inside the data directory
pub const CACHE_DB_FILE: &str = "dogquiz-cache.db";

const METADATA_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS cache_metadata (
        key TEXT PRIMARY KEY,
        value INTEGER NOT NULL
    );
"#;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS breeds (
        id TEXT PRIMARY KEY,
        breed_key TEXT NOT NULL,
        variant TEXT,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        trivia TEXT NOT NULL,
        origin TEXT NOT NULL,
        size TEXT NOT NULL,
        difficulty TEXT NOT NULL,
        temperament TEXT NOT NULL,
        life_span TEXT NOT NULL,
        cached_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL,
        last_updated_at INTEGER NOT NULL,
        source TEXT NOT NULL,
        is_favorite INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_breeds_expires ON breeds(expires_at);
    CREATE INDEX IF NOT EXISTS idx_breeds_difficulty ON breeds(difficulty);

    CREATE TABLE IF NOT EXISTS images (
        id TEXT PRIMARY KEY,
        breed_id TEXT NOT NULL REFERENCES breeds(id) ON DELETE CASCADE,
        url TEXT NOT NULL,
        image_type TEXT NOT NULL,
        is_primary INTEGER NOT NULL DEFAULT 0,
        cached_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL,
        last_accessed_at INTEGER NOT NULL,
        access_count INTEGER NOT NULL DEFAULT 0,
        byte_size INTEGER NOT NULL DEFAULT 0,
        local_path TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_images_breed ON images(breed_id);
    CREATE INDEX IF NOT EXISTS idx_images_lru ON images(last_accessed_at);
    CREATE INDEX IF NOT EXISTS idx_images_expires ON images(expires_at);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_images_one_primary
        ON images(breed_id) WHERE is_primary = 1;

    CREATE TABLE IF NOT EXISTS daily_stats (
        date TEXT NOT NULL,
        category TEXT NOT NULL,
        hits INTEGER NOT NULL DEFAULT 0,
        misses INTEGER NOT NULL DEFAULT 0,
        bytes_cached INTEGER NOT NULL DEFAULT 0,
        items_cached INTEGER NOT NULL DEFAULT 0,
        items_expired INTEGER NOT NULL DEFAULT 0,
        clears INTEGER NOT NULL DEFAULT 0,
        last_updated_at INTEGER NOT NULL,
        PRIMARY KEY (date, category)
    );
"#;

/// SQLite-based record store (thread-safe)
pub struct RecordStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    events: EventBus,
}

impl RecordStore {
    /// Create or open the store inside `data_dir`
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir).map_err(|source| StorageError::CreateDir {
            path: data_dir.to_path_buf(),
            source,
        })?;

        let path = data_dir.join(CACHE_DB_FILE);
        let conn = Connection::open(&path).map_err(|source| StorageError::Open {
            path: path.clone(),
            source,
        })?;

        // WAL lets readers proceed while a write transaction is open
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .ctx("enable WAL mode")?;

        let store = Self::init(conn, Some(path.clone()))?;
        debug!(path = %path.display(), journal_mode = %mode, "Record store opened");
        Ok(store)
    }

    /// Volatile store, nothing is written to disk
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StorageError> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .ctx("enable foreign keys")?;
        conn.execute_batch(METADATA_SCHEMA)
            .ctx("create metadata table")?;

        let stored_version: Option<i32> = conn
            .query_row(
                "SELECT value FROM cache_metadata WHERE key = 'version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .ctx("query schema version")?;

        match stored_version {
            Some(v) if v != SCHEMA_VERSION => {
                warn!(
                    stored = v,
                    current = SCHEMA_VERSION,
                    "Schema version mismatch detected, rebuilding cached tables"
                );

                conn.execute_batch("DROP TABLE IF EXISTS images; DROP TABLE IF EXISTS breeds;")
                    .ctx("drop stale tables")?;
                conn.execute(
                    "INSERT OR REPLACE INTO cache_metadata (key, value) VALUES ('version', ?)",
                    params![SCHEMA_VERSION],
                )
                .ctx("update schema version")?;
            }
            None => {
                conn.execute(
                    "INSERT INTO cache_metadata (key, value) VALUES ('version', ?)",
                    params![SCHEMA_VERSION],
                )
                .ctx("initialize schema version")?;
                debug!("Schema version initialized to {}", SCHEMA_VERSION);
            }
            Some(_) => {}
        }

        conn.execute_batch(SCHEMA).ctx("create schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            events: EventBus::default_capacity(),
        })
    }

    /// Database file path, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Change events published after each committed write
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    pub(crate) fn notify(&self, table: Table, rows: usize) {
        if rows > 0 {
            self.events.publish(CacheEvent::Changed(table));
        }
    }

    /// Size of the database file on disk (0 for in-memory stores)
    pub fn file_size(&self) -> u64 {
        self.path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Vacuum database to reclaim space
    pub fn vacuum(&self) -> Result<(), StorageError> {
        self.conn().execute("VACUUM", []).ctx("vacuum")?;
        debug!("Database vacuumed");
        Ok(())
    }
}

impl Drop for RecordStore {
    fn drop(&mut self) {
        if self.path.is_none() {
            return;
        }
        // Flush the WAL so it does not grow across restarts
        let conn = self.conn.lock();
        if let Err(e) = conn.pragma_update(None, "wal_checkpoint", "TRUNCATE") {
            warn!("Failed to checkpoint WAL on RecordStore drop: {}", e);
        }
    }
}

pub(crate) fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

pub(crate) fn read_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp out of range: {}", ms).into(),
        )
    })
}

pub(crate) fn parse_col<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}
