//! Persistent task store for song-dl
//!
//! A durable key→record map of download tasks backed by SQLite. The scheduler is the
//! only writer; every other component reads through the scheduler.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`tasks`] - Task record CRUD and recovery loading

use crate::error::DatabaseError;
use crate::types::{DownloadTask, SongRef, Status, TaskId};
use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod tasks;

pub use tasks::LoadedTasks;

/// Serializable projection of a [`DownloadTask`]
///
/// Mirrors the `download_tasks` table. The song descriptor is stored twice: its
/// identifying fields as columns (for inspection and queries) and the full
/// descriptor as JSON so a recovered task can be re-run.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TaskRecord {
    /// Task key
    pub id: String,
    /// Song identity
    pub song_id: String,
    /// Track title
    pub title: String,
    /// Performing artist
    pub artist: String,
    /// Song source
    pub source: String,
    /// Lowercase status (`pending|running|completed|failed|cancelled`)
    pub status: String,
    /// Serialized [`SongRef`]
    pub song_json: String,
    /// Unix ms when the task was submitted
    pub created_at: i64,
    /// Unix ms when the pipeline started
    pub started_at: Option<i64>,
    /// Unix ms when the task finished
    pub completed_at: Option<i64>,
    /// Error message if the task failed
    pub error_message: Option<String>,
}

impl TaskRecord {
    /// Project a task into its persisted form
    pub fn from_task(task: &DownloadTask) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: task.id.0.clone(),
            song_id: task.song.song_id.clone(),
            title: task.song.title.clone(),
            artist: task.song.artist.clone(),
            source: task.song.source.clone(),
            status: task.status.as_str().to_string(),
            song_json: serde_json::to_string(&task.song)?,
            created_at: task.created_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
            error_message: task.last_error.clone(),
        })
    }

    /// Rebuild the task, rejecting records whose status or payload cannot be decoded
    pub fn into_task(self) -> Result<DownloadTask, DatabaseError> {
        let status: Status = self
            .status
            .parse()
            .map_err(|reason| DatabaseError::CorruptRecord {
                id: self.id.clone(),
                reason,
            })?;
        let song: SongRef =
            serde_json::from_str(&self.song_json).map_err(|e| DatabaseError::CorruptRecord {
                id: self.id.clone(),
                reason: format!("invalid song payload: {}", e),
            })?;

        Ok(DownloadTask {
            id: TaskId(self.id),
            song,
            status,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            last_error: self.error_message,
        })
    }
}

/// Database handle for song-dl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
