//! Caller layer in front of the scheduler.
//!
//! [`DownloadService`] is what a player UI talks to. It rejects a song that already has
//! a pending or running task and answers "is this song downloaded?" from the state
//! cache with the read policy that suits the call site.

use crate::config::Config;
use crate::downloader::{Collaborators, DownloadScheduler};
use crate::error::{Error, Result};
use crate::types::{Event, SongRef, TaskId};
use std::sync::{Arc, Mutex, PoisonError};

/// Duplicate-rejecting entry point for song downloads
#[derive(Clone)]
pub struct DownloadService {
    scheduler: DownloadScheduler,
    /// Serializes the find-then-submit sequence of concurrent `download` calls
    admission: Arc<Mutex<()>>,
}

impl DownloadService {
    /// Wrap an existing scheduler
    pub fn new(scheduler: DownloadScheduler) -> Self {
        Self {
            scheduler,
            admission: Arc::new(Mutex::new(())),
        }
    }

    /// Open the store, recover persisted tasks and start dispatching them
    ///
    /// Uses the HTTP resolver and on-disk existence checks.
    pub async fn open(config: Config) -> Result<Self> {
        let collaborators = Collaborators::http(&config)?;
        let scheduler = DownloadScheduler::new(config, collaborators).await?;
        let requeued = scheduler.recover().await?;
        scheduler.drain();
        tracing::info!(requeued, "Download service ready");
        Ok(Self::new(scheduler))
    }

    /// Submit a song unless it already has a pending or running task
    ///
    /// # Errors
    ///
    /// Returns [`Error::Duplicate`] naming the existing task.
    pub fn download(&self, song: SongRef) -> Result<TaskId> {
        let _admission = self.admission.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = self.scheduler.find_active(&song.song_id) {
            tracing::debug!(song_id = %song.song_id, existing = %existing, "Duplicate download rejected");
            return Err(Error::Duplicate(format!(
                "song {} is already queued as task {}",
                song.song_id, existing
            )));
        }

        Ok(self.scheduler.submit(song))
    }

    /// Whether a song is downloaded, answered immediately
    ///
    /// Suited to list rendering. A stale or unknown answer is refreshed in the
    /// background and a change is published as [`Event::ExistenceChanged`].
    pub fn is_downloaded(&self, song_id: &str) -> bool {
        self.scheduler.cache().check_optimistic(song_id)
    }

    /// Whether a song is downloaded, checked against the source of truth when stale
    pub async fn is_downloaded_fresh(&self, song_id: &str) -> Result<bool> {
        self.scheduler.cache().check_fresh(song_id).await
    }

    /// The user deleted a downloaded song
    pub fn song_deleted(&self, song_id: &str) {
        self.scheduler.cache().mark_missing(song_id);
    }

    /// A song's file was found missing outside of a deletion
    pub fn file_missing(&self, song_id: &str) {
        self.scheduler.cache().invalidate(song_id);
    }

    /// The local library was reloaded wholesale
    pub fn library_reloaded(&self) {
        self.scheduler.cache().invalidate_all();
    }

    /// Subscribe to scheduler and cache events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.scheduler.subscribe()
    }

    /// The underlying scheduler, for queue control and statistics
    pub fn scheduler(&self) -> &DownloadScheduler {
        &self.scheduler
    }
}
