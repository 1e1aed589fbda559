//! Individual pipeline stages.

use super::{AUDIO_PROGRESS_END, COVER_PROGRESS, DownloadPipeline, LYRIC_PROGRESS};
use crate::error::{DownloadError, Error, Result};
use crate::library::LibraryRecord;
use crate::types::Artifact;
use std::path::{Path, PathBuf};

impl DownloadPipeline {
    /// Stage 1: synchronous-fresh existence check
    ///
    /// A failed check counts as "not present" so the song is fetched again.
    pub(super) async fn already_present(&self) -> bool {
        match self.ctx.cache.check_fresh(&self.song.song_id).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(
                    task_id = %self.task_id,
                    song_id = %self.song.song_id,
                    error = %e,
                    "Existence check failed, fetching anyway"
                );
                false
            }
        }
    }

    /// Artifact for a song that was already present
    pub(super) async fn existing_artifact(&self) -> Artifact {
        Artifact {
            audio_path: self.ctx.audio_path(&self.song),
            cover_path: existing(self.ctx.cover_path(&self.song)).await,
            lyric_path: existing(self.ctx.lyric_path(&self.song)).await,
            reused: true,
        }
    }

    /// Stage 2: fetch the audio, mapping byte progress onto [0, 0.80]
    ///
    /// The resolver writes to a `.part` file that is renamed into place only once the
    /// fetch finished, so an interrupted run never leaves a file that looks downloaded.
    /// Any failure is fatal and the partial file is removed.
    pub(super) async fn fetch_audio(&self) -> Result<PathBuf> {
        tokio::fs::create_dir_all(self.ctx.config.download_dir()).await?;
        self.check_disk_space()?;

        let dest = self.ctx.audio_path(&self.song);
        let staging = crate::utils::partial_path(&dest);
        let cache = self.ctx.cache.clone();
        let task_id = self.task_id.clone();
        let on_progress = move |received: u64, total: u64| {
            if total > 0 {
                let fraction = (received as f64 / total as f64).min(1.0) as f32;
                cache.report_progress(&task_id, fraction * AUDIO_PROGRESS_END);
            }
        };

        let fetched = match self
            .ctx
            .resolver
            .fetch_audio(&self.song, &staging, &on_progress)
            .await
        {
            Ok(bytes) => tokio::fs::rename(&staging, &dest)
                .await
                .map(|()| bytes)
                .map_err(Error::from),
            Err(e) => Err(e),
        };

        match fetched {
            Ok(bytes) => {
                tracing::debug!(
                    task_id = %self.task_id,
                    bytes,
                    path = %dest.display(),
                    "Audio stage complete"
                );
                self.ctx
                    .cache
                    .report_progress(&self.task_id, AUDIO_PROGRESS_END);
                Ok(dest)
            }
            Err(e) => {
                remove_partial(&staging).await;
                let err = self.fatal(e);
                tracing::error!(
                    task_id = %self.task_id,
                    song_id = %self.song.song_id,
                    error = %err,
                    "Audio stage failed"
                );
                Err(err)
            }
        }
    }

    /// Stage 3: fetch the cover; failures leave it out
    pub(super) async fn fetch_cover(&self) -> Option<PathBuf> {
        let dest = self.ctx.cover_path(&self.song);
        let result = self.ctx.resolver.fetch_cover(&self.song, &dest).await;
        let path = self.absorb("cover", &dest, result).await;
        self.ctx.cache.report_progress(&self.task_id, COVER_PROGRESS);
        path
    }

    /// Stage 4: write the lyric; failures leave it out
    pub(super) async fn write_lyric(&self) -> Option<PathBuf> {
        let dest = self.ctx.lyric_path(&self.song);
        let result = self.ctx.resolver.fetch_lyric(&self.song, &dest).await;
        let path = self.absorb("lyric", &dest, result).await;
        self.ctx.cache.report_progress(&self.task_id, LYRIC_PROGRESS);
        path
    }

    /// Stage 5: best-effort library write
    pub(super) async fn write_library(&self, artifact: &Artifact) {
        let downloaded_at = chrono::Utc::now().timestamp_millis();
        let record = LibraryRecord::new(&self.song, artifact, downloaded_at);
        if let Err(e) = self.ctx.library.upsert(record).await {
            // The file stays on disk; a library rescan will find it
            tracing::warn!(
                task_id = %self.task_id,
                song_id = %self.song.song_id,
                error = %e,
                "Library write failed"
            );
        }
    }

    fn check_disk_space(&self) -> Result<()> {
        let settings = &self.ctx.config.disk_space;
        if !settings.enabled {
            return Ok(());
        }

        let dir = self.ctx.config.download_dir();
        let available = match crate::utils::get_available_space(dir) {
            Ok(available) => available,
            Err(e) => {
                tracing::warn!(
                    path = %dir.display(),
                    error = %e,
                    "Could not query free space, continuing"
                );
                return Ok(());
            }
        };

        if available < settings.min_free_space {
            return Err(Error::InsufficientSpace {
                required: settings.min_free_space,
                available,
            });
        }
        Ok(())
    }

    fn fatal(&self, error: Error) -> Error {
        match error {
            Error::Download(DownloadError::FetchFailed { .. }) | Error::InsufficientSpace { .. } => {
                error
            }
            other => DownloadError::FetchFailed {
                song_id: self.song.song_id.clone(),
                reason: other.to_string(),
            }
            .into(),
        }
    }

    async fn absorb(
        &self,
        asset: &'static str,
        dest: &Path,
        result: Result<Option<PathBuf>>,
    ) -> Option<PathBuf> {
        match result {
            Ok(path) => path,
            Err(e) => {
                remove_partial(dest).await;
                let err = DownloadError::AssetFailed {
                    asset,
                    path: dest.to_path_buf(),
                    reason: e.to_string(),
                };
                tracing::warn!(task_id = %self.task_id, error = %err, "Optional asset skipped");
                None
            }
        }
    }
}

async fn existing(path: PathBuf) -> Option<PathBuf> {
    match tokio::fs::try_exists(&path).await {
        Ok(true) => Some(path),
        _ => None,
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial file")
        }
    }
}
