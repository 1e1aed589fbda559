//! Existence entries and the two read policies.

use crate::error::Result;
use crate::utils;
use std::path::PathBuf;
use tokio::time::Instant;

use super::{ExistenceEntry, StateCache};
use crate::types::Event;

/// Source of truth consulted on a cache miss or stale entry
#[async_trait::async_trait]
pub trait ExistenceCheck: Send + Sync {
    /// Whether the song's artifact is present locally
    async fn exists(&self, song_id: &str) -> Result<bool>;
}

/// [`ExistenceCheck`] that looks for the song's audio file in the download directory
pub struct DiskExistence {
    download_dir: PathBuf,
    audio_extension: String,
}

impl DiskExistence {
    /// Check for audio files with `audio_extension` under `download_dir`
    pub fn new(download_dir: impl Into<PathBuf>, audio_extension: impl Into<String>) -> Self {
        Self {
            download_dir: download_dir.into(),
            audio_extension: audio_extension.into(),
        }
    }
}

#[async_trait::async_trait]
impl ExistenceCheck for DiskExistence {
    async fn exists(&self, song_id: &str) -> Result<bool> {
        let mut entries = match tokio::fs::read_dir(&self.download_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if utils::is_audio_for_song(&path, song_id, &self.audio_extension) {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

impl StateCache {
    /// Synchronous-fresh read: a fresh cached answer, otherwise check now and cache it
    ///
    /// Use wherever the answer drives a decision that must be correct, such as skipping
    /// a download. Check errors are returned and nothing is cached.
    pub async fn check_fresh(&self, song_id: &str) -> Result<bool> {
        if let Some(exists) = self.fresh_entry(song_id) {
            tracing::debug!(song_id, exists, "Existence cache hit");
            return Ok(exists);
        }

        let exists = self.checker.exists(song_id).await?;
        self.store(song_id, exists);
        Ok(exists)
    }

    /// Optimistic-async read: the last known answer immediately (true if never checked)
    ///
    /// A missing or stale entry schedules a background recheck. If that recheck turns a
    /// present song into a missing one, an [`Event::ExistenceChanged`] is published.
    pub fn check_optimistic(&self, song_id: &str) -> bool {
        self.check_optimistic_with_recheck(song_id).0
    }

    pub(crate) fn check_optimistic_with_recheck(
        &self,
        song_id: &str,
    ) -> (bool, Option<tokio::task::JoinHandle<()>>) {
        let (known, fresh) = {
            let state = self.lock();
            match state.existence.get(song_id) {
                Some(entry) => (entry.exists, entry.checked_at.elapsed() < self.ttl),
                None => (true, false),
            }
        };

        if fresh {
            return (known, None);
        }

        let cache = self.clone();
        let song_id = song_id.to_string();
        let handle = tokio::spawn(async move {
            cache.recheck(&song_id, known).await;
        });

        (known, Some(handle))
    }

    async fn recheck(&self, song_id: &str, previous: bool) {
        match self.checker.exists(song_id).await {
            Ok(exists) => {
                self.store(song_id, exists);
                if previous && !exists {
                    tracing::debug!(song_id, "Song no longer present");
                    self.emit_event(Event::ExistenceChanged {
                        song_id: song_id.to_string(),
                        exists: false,
                    });
                }
            }
            Err(e) => {
                tracing::warn!(song_id, error = %e, "Background existence recheck failed");
            }
        }
    }

    /// Record a successful download
    pub fn mark_downloaded(&self, song_id: &str) {
        self.store(song_id, true);
    }

    /// Record a deletion or a detected-missing file
    pub fn mark_missing(&self, song_id: &str) {
        self.store(song_id, false);
    }

    /// Drop the entry for one song; the next read goes to the source of truth
    pub fn invalidate(&self, song_id: &str) {
        self.lock().existence.remove(song_id);
    }

    /// Drop every existence entry (the source of truth was reloaded wholesale)
    pub fn invalidate_all(&self) {
        let mut state = self.lock();
        let cleared = state.existence.len();
        state.existence.clear();
        tracing::debug!(cleared, "Existence cache cleared");
    }

    /// Cached answer regardless of freshness
    pub(crate) fn cached_existence(&self, song_id: &str) -> Option<bool> {
        self.lock().existence.get(song_id).map(|entry| entry.exists)
    }

    fn fresh_entry(&self, song_id: &str) -> Option<bool> {
        let state = self.lock();
        state
            .existence
            .get(song_id)
            .filter(|entry| entry.checked_at.elapsed() < self.ttl)
            .map(|entry| entry.exists)
    }

    fn store(&self, song_id: &str, exists: bool) {
        self.lock().existence.insert(
            song_id.to_string(),
            ExistenceEntry {
                exists,
                checked_at: Instant::now(),
            },
        );
    }
}
