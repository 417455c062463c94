//! Error types for dogquiz-core
//!
//! Three layers, matching where failures originate:
//! - `StorageError`: the SQLite record store (I/O, corruption, bad rows)
//! - `UpstreamError`: the remote breed fetcher (never surfaced raw to consumers)
//! - `CoreError`: everything a public operation can return

use std::path::PathBuf;
use thiserror::Error;

/// Failure inside the record store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create data directory: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open record store: {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Record store query failed: {context}")]
    Query {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Corrupt row ({context}): {message}")]
    Corrupt {
        context: &'static str,
        message: String,
    },

    #[error("Failed to serialize {field}")]
    Serialization {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Attach a short description to a rusqlite failure
///
/// Column values that fail to decode become `Corrupt`, everything else `Query`.
pub(crate) trait QueryContext<T> {
    fn ctx(self, context: &'static str) -> std::result::Result<T, StorageError>;
}

impl<T> QueryContext<T> for rusqlite::Result<T> {
    fn ctx(self, context: &'static str) -> std::result::Result<T, StorageError> {
        self.map_err(|source| match source {
            rusqlite::Error::FromSqlConversionFailure(column, _, err) => StorageError::Corrupt {
                context,
                message: format!("column {}: {}", column, err),
            },
            source => StorageError::Query { context, source },
        })
    }
}

/// Failure talking to the remote breed API
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status}")]
    Status { status: u16 },

    #[error("Upstream reported status '{status}'")]
    Api { status: String },

    #[error("Failed to decode upstream response: {message}")]
    Decode { message: String },

    #[error("Upstream returned no usable data")]
    Empty,

    #[error("Network access disabled")]
    Offline,
}

/// Core error type for dogquiz operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Quiz generation could not assemble enough distinct breeds
    #[error(
        "Not enough distinct breeds for a quiz: need {needed}, found {found} after {attempts} attempts"
    )]
    InsufficientData {
        needed: usize,
        found: usize,
        attempts: u32,
    },

    #[error("Breed not found: {id}")]
    BreedNotFound { id: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// True for errors the retrieval path answers with stale or static data
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoreError::Storage(_) | CoreError::Upstream(_))
    }
}

/// Which rung of the fallback chain produced a breed list
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Valid records served from the record store
    Cache,
    /// Freshly fetched and written through
    Network,
    /// Upstream failed, expired records served instead
    Stale,
    /// Nothing usable anywhere, built-in dataset served
    Static,
}

impl DataSource {
    pub fn is_degraded(&self) -> bool {
        matches!(self, DataSource::Stale | DataSource::Static)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DataSource::Cache => "cache",
            DataSource::Network => "network",
            DataSource::Stale => "stale cache",
            DataSource::Static => "built-in",
        }
    }
}
