//! Library-write capability
//!
//! The local music library is owned by the embedding application. The pipeline only
//! tells it about finished downloads, and a failed write never fails a task: the
//! audio file stays on disk and a later library rescan picks it up.

use crate::error::Result;
use crate::types::{Artifact, SongRef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Library entry for a downloaded song
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryRecord {
    /// Song identity within its source
    pub song_id: String,
    /// Track title
    pub title: String,
    /// Performing artist
    pub artist: String,
    /// Album name, if known
    pub album: Option<String>,
    /// Song source the descriptor came from
    pub source: String,
    /// Local audio file
    pub audio_path: PathBuf,
    /// Local cover image, if one was fetched
    pub cover_path: Option<PathBuf>,
    /// Local lyric file, if one was written
    pub lyric_path: Option<PathBuf>,
    /// Unix ms when the download finished
    pub downloaded_at: i64,
}

impl LibraryRecord {
    /// Build the record for a song and the files produced for it
    pub fn new(song: &SongRef, artifact: &Artifact, downloaded_at: i64) -> Self {
        Self {
            song_id: song.song_id.clone(),
            title: song.title.clone(),
            artist: song.artist.clone(),
            album: song.album.clone(),
            source: song.source.clone(),
            audio_path: artifact.audio_path.clone(),
            cover_path: artifact.cover_path.clone(),
            lyric_path: artifact.lyric_path.clone(),
            downloaded_at,
        }
    }
}

/// Trait for writing finished downloads into the music library
#[async_trait]
pub trait LibraryWriter: Send + Sync {
    /// Insert or replace the entry for `record.song_id`
    async fn upsert(&self, record: LibraryRecord) -> Result<()>;
}

/// [`LibraryWriter`] that discards every record
///
/// For embedders that discover downloads by rescanning the download directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLibrary;

#[async_trait]
impl LibraryWriter for NoOpLibrary {
    async fn upsert(&self, record: LibraryRecord) -> Result<()> {
        tracing::trace!(song_id = %record.song_id, "Library write skipped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn record_copies_song_and_artifact_fields() {
        let mut song = SongRef::new("S1", "Title", "Artist", "netease");
        song.album = Some("Album".into());
        let artifact = Artifact {
            audio_path: PathBuf::from("/music/a.mp3"),
            cover_path: None,
            lyric_path: Some(PathBuf::from("/music/a.lrc")),
            reused: false,
        };

        let record = LibraryRecord::new(&song, &artifact, 42);
        assert_eq!(record.song_id, "S1");
        assert_eq!(record.album.as_deref(), Some("Album"));
        assert_eq!(record.audio_path, artifact.audio_path);
        assert_eq!(record.cover_path, None);
        assert_eq!(record.lyric_path, artifact.lyric_path);
        assert_eq!(record.downloaded_at, 42);
    }

    #[tokio::test]
    async fn noop_library_accepts_records() {
        let song = SongRef::new("S1", "Title", "Artist", "netease");
        let artifact = Artifact {
            audio_path: PathBuf::from("/music/a.mp3"),
            cover_path: None,
            lyric_path: None,
            reused: false,
        };
        assert!(
            NoOpLibrary
                .upsert(LibraryRecord::new(&song, &artifact, 0))
                .await
                .is_ok()
        );
    }
}
