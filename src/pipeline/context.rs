//! Collaborators shared by every pipeline run.

use crate::cache::StateCache;
use crate::config::Config;
use crate::library::LibraryWriter;
use crate::resolver::SongResolver;
use crate::types::SongRef;
use crate::utils;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a [`DownloadPipeline`](super::DownloadPipeline) needs besides its song
///
/// Cheap to clone; the scheduler hands a clone to each run.
#[derive(Clone)]
pub struct PipelineContext {
    pub(crate) config: Arc<Config>,
    pub(crate) cache: StateCache,
    pub(crate) resolver: Arc<dyn SongResolver>,
    pub(crate) library: Arc<dyn LibraryWriter>,
}

impl PipelineContext {
    /// Bundle the configuration, cache and capabilities used by pipeline runs
    pub fn new(
        config: Arc<Config>,
        cache: StateCache,
        resolver: Arc<dyn SongResolver>,
        library: Arc<dyn LibraryWriter>,
    ) -> Self {
        Self {
            config,
            cache,
            resolver,
            library,
        }
    }

    pub(crate) fn audio_path(&self, song: &SongRef) -> PathBuf {
        utils::audio_path(
            self.config.download_dir(),
            song,
            &self.config.download.audio_extension,
        )
    }

    pub(crate) fn cover_path(&self, song: &SongRef) -> PathBuf {
        utils::cover_path(self.config.download_dir(), song)
    }

    pub(crate) fn lyric_path(&self, song: &SongRef) -> PathBuf {
        utils::lyric_path(self.config.download_dir(), song)
    }
}
