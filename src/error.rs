//! Error types for song-dl
//!
//! Errors are grouped by the layer that raises them:
//! - [`Error`] is the crate-wide error returned from public operations
//! - [`DatabaseError`] covers the persistent task store, including corrupt records
//!   encountered during recovery
//! - [`DownloadError`] covers task state violations and pipeline stage failures
//!
//! Only a subset of these ever reaches a caller. Persistence failures are logged by the
//! scheduler and degrade durability only; non-fatal asset failures are absorbed by the
//! pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for song-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for song-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_downloads")
        key: Option<String>,
    },

    /// Persistent store operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Task state or pipeline error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The song is already pending or running (rejected before admission)
    #[error("duplicate operation: {0}")]
    Duplicate(String),

    /// Task not found
    #[error("task not found: {0}")]
    NotFound(String),

    /// Shutdown in progress
    #[error("shutdown in progress")]
    ShuttingDown,

    /// Not enough free space in the download directory
    #[error("insufficient disk space: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        /// Number of bytes that must remain free
        required: u64,
        /// Number of bytes currently available on disk
        available: u64,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Persistent store errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// A persisted record could not be decoded and was skipped
    #[error("corrupt task record {id}: {reason}")]
    CorruptRecord {
        /// Key of the malformed record
        id: String,
        /// What failed to decode
        reason: String,
    },
}

/// Task state and pipeline errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Task not known to the scheduler
    #[error("task {id} not found")]
    NotFound {
        /// The task ID that was not found
        id: String,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} task {id} in state {current_state}")]
    InvalidState {
        /// The task ID that is in an invalid state for the operation
        id: String,
        /// The operation that was attempted (e.g., "cancel", "retry")
        operation: String,
        /// The current state that prevents the operation (e.g., "running")
        current_state: String,
    },

    /// Audio could not be resolved or fetched; fails the whole task
    #[error("failed to fetch audio for song {song_id}: {reason}")]
    FetchFailed {
        /// Song whose audio could not be fetched
        song_id: String,
        /// The underlying failure
        reason: String,
    },

    /// An optional asset (cover, lyric) could not be written; never fails a task
    #[error("failed to write {asset} to {path}: {reason}")]
    AssetFailed {
        /// Asset kind ("cover" or "lyric")
        asset: &'static str,
        /// Destination that was being written
        path: PathBuf,
        /// The underlying failure
        reason: String,
    },
}

impl Error {
    /// Whether this error stems from the persistent store
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Sqlx(_))
    }
}
