//! Song resolution and retrieval
//!
//! A [`SongResolver`] turns a [`SongRef`] into bytes on disk. The pipeline calls it
//! once per stage: audio first (fatal on failure), then cover and lyric (both
//! optional). Implementations decide how the locator fields of the descriptor are
//! interpreted.

use crate::error::Result;
use crate::types::SongRef;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

mod http;

pub use http::HttpResolver;

/// Callback receiving `(bytes_received, bytes_total)` while audio streams in
///
/// `bytes_total` is 0 when the size is not known up front.
pub type ProgressFn<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Trait for fetching the artifacts of a song
///
/// Implementations can stream from HTTP, copy from a local share, or return canned
/// data in tests.
#[async_trait]
pub trait SongResolver: Send + Sync {
    /// Write the song's audio to `dest`, returning the number of bytes written
    ///
    /// Any error fails the task. The caller removes a partially written `dest`.
    async fn fetch_audio(
        &self,
        song: &SongRef,
        dest: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<u64>;

    /// Write the song's cover image to `dest`
    ///
    /// Returns `Ok(None)` when the song has no cover.
    async fn fetch_cover(&self, song: &SongRef, dest: &Path) -> Result<Option<PathBuf>>;

    /// Write the song's lyric to `dest`
    ///
    /// Returns `Ok(None)` when the song has no lyric.
    async fn fetch_lyric(&self, song: &SongRef, dest: &Path) -> Result<Option<PathBuf>>;
}
