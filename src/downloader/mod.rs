//! Task scheduler split into focused submodules.
//!
//! The `DownloadScheduler` struct and its methods are organized by domain:
//! - [`queue`] - Submission, FIFO drain and cancellation
//! - [`completion`] - Terminal outcomes of pipeline runs
//! - [`control`] - Retry, removal and log clearing
//! - [`lifecycle`] - Startup recovery and shutdown
//! - [`persistence`] - Single-writer task store actor
//! - [`stats`] - Read-only views of queue state

mod completion;
mod control;
mod lifecycle;
mod persistence;
mod queue;
mod stats;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::cache::{DiskExistence, ExistenceCheck, StateCache};
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::library::{LibraryWriter, NoOpLibrary};
use crate::pipeline::PipelineContext;
use crate::resolver::{HttpResolver, SongResolver};
use crate::types::{DownloadTask, Event, TaskId};
use persistence::PersistenceHandle;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// External capabilities the scheduler drives
///
/// Tests substitute mocks; [`Collaborators::http`] wires the production set.
#[derive(Clone)]
pub struct Collaborators {
    /// Fetches audio, cover and lyric for a song
    pub resolver: Arc<dyn SongResolver>,
    /// Receives a record for every finished download
    pub library: Arc<dyn LibraryWriter>,
    /// Source of truth behind the existence cache
    pub existence: Arc<dyn ExistenceCheck>,
}

impl Collaborators {
    /// HTTP resolver, no library writes, existence checked on disk
    pub fn http(config: &Config) -> Result<Self> {
        Ok(Self {
            resolver: Arc::new(HttpResolver::new(config.retry.clone())?),
            library: Arc::new(NoOpLibrary),
            existence: Arc::new(DiskExistence::new(
                config.download.download_dir.clone(),
                config.download.audio_extension.clone(),
            )),
        })
    }
}

/// FIFO, active set and terminal logs
///
/// Every mutation happens under one lock and never across an await, so queue
/// operations are serialized and return promptly.
#[derive(Default)]
pub(crate) struct QueueState {
    /// Pending task ids in submission order
    pub(crate) pending: VecDeque<TaskId>,
    /// Tasks whose pipeline is running (bounded by max_concurrent_downloads)
    pub(crate) active: HashSet<TaskId>,
    /// Completed tasks in completion order
    pub(crate) completed: Vec<TaskId>,
    /// Failed tasks in failure order
    pub(crate) failed: Vec<TaskId>,
    /// Every known task, including cancelled ones
    pub(crate) tasks: HashMap<TaskId, DownloadTask>,
    /// Highest creation timestamp handed out or recovered
    pub(crate) last_created_at: i64,
    pub(crate) total_created: u64,
    pub(crate) total_successful: u64,
    /// Cleared by shutdown; pending tasks are no longer dispatched
    pub(crate) dispatching: bool,
}

impl QueueState {
    /// Creation timestamp for a new task, strictly greater than every previous one
    pub(crate) fn next_created_at(&mut self, now: i64) -> i64 {
        let created_at = now.max(self.last_created_at + 1);
        self.last_created_at = created_at;
        created_at
    }
}

/// Bounded-concurrency download scheduler (cloneable - all fields are Arc-wrapped)
///
/// Construct one per application and share clones of it. Queue operations are
/// synchronous and must be called from within a Tokio runtime, since they dispatch
/// pipelines with `tokio::spawn`.
#[derive(Clone)]
pub struct DownloadScheduler {
    /// Database handle, read directly only during recovery
    pub(crate) db: Arc<Database>,
    /// Ordered writes to the database
    pub(crate) store: PersistenceHandle,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) config: Arc<Config>,
    pub(crate) state: Arc<Mutex<QueueState>>,
    pub(crate) pipeline: PipelineContext,
}

impl DownloadScheduler {
    /// Create a scheduler with its own database
    ///
    /// Validates the configuration, creates the download directory and opens (or
    /// creates) the task store. Persisted tasks are not loaded until
    /// [`recover`](Self::recover) is called.
    pub async fn new(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let db = Database::new(&config.persistence.database_path).await?;
        Ok(Self::with_database(config, db, collaborators))
    }

    /// Create a scheduler over an already opened database
    pub fn with_database(config: Config, db: Database, collaborators: Collaborators) -> Self {
        // Buffer of 1000 events per subscriber before it lags
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let config = Arc::new(config);
        let db = Arc::new(db);
        let cache = StateCache::new(&config.cache, collaborators.existence, event_tx.clone());
        let pipeline = PipelineContext::new(
            config.clone(),
            cache,
            collaborators.resolver,
            collaborators.library,
        );

        tracing::info!(
            max_concurrent = config.download.max_concurrent_downloads,
            download_dir = %config.download.download_dir.display(),
            "Download scheduler created"
        );

        Self {
            store: PersistenceHandle::spawn(db.clone()),
            db,
            event_tx,
            config,
            state: Arc::new(Mutex::new(QueueState {
                dispatching: true,
                ..QueueState::default()
            })),
            pipeline,
        }
    }

    /// Subscribe to task events
    ///
    /// Every subscriber receives every event. A subscriber more than 1000 events
    /// behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The existence/progress cache shared with every pipeline
    pub fn cache(&self) -> &StateCache {
        &self.pipeline.cache
    }

    /// Current configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Critical sections never panic midway, so a poisoned lock still holds consistent data
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emit an event to all subscribers
    ///
    /// Having no subscribers is not an error; the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

/// Current wall-clock time in Unix milliseconds
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
