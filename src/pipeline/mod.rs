//! Staged retrieval of one song
//!
//! A [`DownloadPipeline`] turns one task's [`SongRef`] into an [`Artifact`] or fails.
//! Progress is reported through the [`StateCache`](crate::cache::StateCache) and the
//! terminal outcome is returned to the caller (the scheduler); the pipeline never
//! touches scheduler state.
//!
//! | Stage | Work                         | Progress after | On failure          |
//! |-------|------------------------------|----------------|---------------------|
//! | 1     | existence short-circuit      | 1.00 (skip)    | treated as absent   |
//! | 2     | disk pre-flight, fetch audio | 0.00 to 0.80   | task fails          |
//! | 3     | fetch cover                  | 0.85           | cover left out      |
//! | 4     | write lyric                  | 0.95           | lyric left out      |
//! | 5     | library upsert               | 1.00           | logged only         |

use crate::error::Result;
use crate::types::{Artifact, SongRef, TaskId};

mod context;
mod stages;

pub use context::PipelineContext;

/// Upper bound of the audio stage's progress range
pub const AUDIO_PROGRESS_END: f32 = 0.80;
/// Progress once the cover stage finished or was skipped
pub const COVER_PROGRESS: f32 = 0.85;
/// Progress once the lyric stage finished or was skipped
pub const LYRIC_PROGRESS: f32 = 0.95;

/// One run of the retrieval stages for a single task
pub struct DownloadPipeline {
    task_id: TaskId,
    song: SongRef,
    ctx: PipelineContext,
}

impl DownloadPipeline {
    /// Prepare a run for `song` reporting progress under `task_id`
    pub fn new(task_id: TaskId, song: SongRef, ctx: PipelineContext) -> Self {
        Self { task_id, song, ctx }
    }

    /// Task this run reports progress for
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Execute every stage
    ///
    /// Returns the produced (or already present) artifact. An error means the audio
    /// stage failed and nothing was written to the library; the last progress fraction
    /// is flushed to subscribers before returning.
    pub async fn run(&self) -> Result<Artifact> {
        self.ctx.cache.begin_progress(&self.task_id);

        match self.execute().await {
            Ok(artifact) => Ok(artifact),
            Err(e) => {
                self.ctx.cache.fail_progress(&self.task_id);
                Err(e)
            }
        }
    }

    async fn execute(&self) -> Result<Artifact> {
        if self.already_present().await {
            tracing::info!(
                task_id = %self.task_id,
                song_id = %self.song.song_id,
                "Song already present, skipping fetch"
            );
            let artifact = self.existing_artifact().await;
            self.ctx.cache.report_progress(&self.task_id, 1.0);
            return Ok(artifact);
        }

        let audio_path = self.fetch_audio().await?;
        let cover_path = self.fetch_cover().await;
        let lyric_path = self.write_lyric().await;

        let artifact = Artifact {
            audio_path,
            cover_path,
            lyric_path,
            reused: false,
        };

        self.write_library(&artifact).await;
        self.ctx.cache.mark_downloaded(&self.song.song_id);
        self.ctx.cache.report_progress(&self.task_id, 1.0);

        Ok(artifact)
    }
}
