//! Core types for song-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a download task
///
/// Derived from the song identity and the task's creation time in Unix milliseconds,
/// e.g. `"S1_1700000000000"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Build the id for a song submitted at `created_at` (Unix ms)
    pub fn generate(song_id: &str, created_at: i64) -> Self {
        Self(format!("{song_id}_{created_at}"))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque descriptor of a song as handed over by the song source
///
/// The scheduler never looks inside beyond `song_id`; the resolver interprets the
/// locator fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRef {
    /// Stable identity of the song within its source
    pub song_id: String,
    /// Track title
    pub title: String,
    /// Performing artist
    pub artist: String,
    /// Album name, if known
    #[serde(default)]
    pub album: Option<String>,
    /// Song source the descriptor came from (e.g. "netease", "local-share")
    pub source: String,
    /// Audio locator, if the source already resolved one
    #[serde(default)]
    pub audio_url: Option<String>,
    /// Cover image locator
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Lyric text (LRC) shipped with the descriptor
    #[serde(default)]
    pub lyric: Option<String>,
}

impl SongRef {
    /// Create a descriptor with only the identifying fields set
    pub fn new(
        song_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            song_id: song_id.into(),
            title: title.into(),
            artist: artist.into(),
            album: None,
            source: source.into(),
            audio_url: None,
            cover_url: None,
            lyric: None,
        }
    }
}

/// Task status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting in the FIFO for a free slot
    Pending,
    /// Pipeline executing
    Running,
    /// Artifact produced
    Completed,
    /// Audio stage failed
    Failed,
    /// Removed from the FIFO before it started
    Cancelled,
}

impl Status {
    /// Lowercase form used in the persistent store
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Completed => "completed",
            Status::Failed => "failed",
            Status::Cancelled => "cancelled",
        }
    }

    /// Whether the task has reached a state it will not leave on its own
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed | Status::Cancelled)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "running" => Ok(Status::Running),
            "completed" => Ok(Status::Completed),
            "failed" => Ok(Status::Failed),
            "cancelled" => Ok(Status::Cancelled),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// A song download request tracked by the scheduler
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Task identifier
    pub id: TaskId,
    /// Song being downloaded
    pub song: SongRef,
    /// Current status
    pub status: Status,
    /// Unix ms when the task was submitted
    pub created_at: i64,
    /// Unix ms when the pipeline started
    pub started_at: Option<i64>,
    /// Unix ms when the task reached Completed/Failed/Cancelled
    pub completed_at: Option<i64>,
    /// Error message of the last failure
    pub last_error: Option<String>,
}

impl DownloadTask {
    pub(crate) fn new(song: SongRef, created_at: i64) -> Self {
        Self {
            id: TaskId::generate(&song.song_id, created_at),
            song,
            status: Status::Pending,
            created_at,
            started_at: None,
            completed_at: None,
            last_error: None,
        }
    }
}

/// Locally persisted files for a completed task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Audio file
    pub audio_path: PathBuf,
    /// Cover image, if one was fetched
    pub cover_path: Option<PathBuf>,
    /// Lyric file, if one was written
    pub lyric_path: Option<PathBuf>,
    /// True when the song was already present and nothing was fetched
    pub reused: bool,
}

/// Event emitted during the task lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task appended to the pending FIFO (new submission or retry)
    Queued {
        /// Task ID
        id: TaskId,
        /// Song the task downloads
        song_id: String,
    },

    /// Task moved to Running and its pipeline was dispatched
    Started {
        /// Task ID
        id: TaskId,
    },

    /// Pipeline progress (fraction in [0, 1])
    Progress {
        /// Task ID
        id: TaskId,
        /// Completed fraction
        fraction: f32,
    },

    /// Task finished; `success` is false after a [`Event::Failed`]
    Completed {
        /// Task ID
        id: TaskId,
        /// Whether an artifact was produced
        success: bool,
        /// The produced artifact
        #[serde(skip_serializing_if = "Option::is_none")]
        artifact: Option<Artifact>,
    },

    /// Task failed in its audio stage
    Failed {
        /// Task ID
        id: TaskId,
        /// Error message
        error: String,
    },

    /// Pending task cancelled
    Cancelled {
        /// Task ID
        id: TaskId,
    },

    /// Finished task removed from the logs and the store
    Removed {
        /// Task ID
        id: TaskId,
    },

    /// A background recheck found a previously present song missing
    ExistenceChanged {
        /// Song whose presence changed
        song_id: String,
        /// New presence value
        exists: bool,
    },

    /// Scheduler shut down
    Shutdown,
}

/// Queue statistics snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Tasks waiting in the FIFO
    pub pending_count: usize,
    /// Tasks whose pipeline is running
    pub active_count: usize,
    /// Tasks in the completed log
    pub completed_count: usize,
    /// Tasks in the failed log
    pub failed_count: usize,
    /// Tasks ever admitted (including recovered history)
    pub total_created: u64,
    /// Tasks ever completed successfully (including recovered history)
    pub total_successful: u64,
    /// Concurrency bound
    pub max_concurrent: usize,
}

impl QueueStats {
    /// Percentage of created tasks that succeeded, `None` before any task exists
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_created == 0 {
            None
        } else {
            Some(self.total_successful as f64 / self.total_created as f64 * 100.0)
        }
    }

    /// Success rate formatted for display, e.g. `"66.7%"` or `"N/A"`
    pub fn success_rate_display(&self) -> String {
        match self.success_rate() {
            Some(rate) => format!("{rate:.1}%"),
            None => "N/A".to_string(),
        }
    }
}
