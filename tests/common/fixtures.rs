//! Test fixtures: configuration, songs and a mock song source

use song_dl::{Collaborators, Config, DownloadScheduler, SongRef};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Audio payload served for every song
pub const AUDIO_BYTES: &[u8] = b"ID3\x04\x00\x00\x00\x00\x00\x00song-dl integration audio";

/// Cover payload served for every song
pub const COVER_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0cover";

/// Configuration rooted in `dir` with fast retries and no disk space check
pub fn test_config(dir: &Path, max_concurrent: usize) -> Config {
    let mut config = Config::default();
    config.download.download_dir = dir.join("music");
    config.download.max_concurrent_downloads = max_concurrent;
    config.persistence.database_path = dir.join("tasks.db");
    config.retry.initial_delay = Duration::from_millis(10);
    config.retry.max_delay = Duration::from_millis(50);
    config.retry.jitter = false;
    config.disk_space.enabled = false;
    config
}

/// Song whose audio and cover live on `server`
pub fn server_song(server: &MockServer, song_id: &str) -> SongRef {
    let mut song = SongRef::new(song_id, format!("Track {song_id}"), "Integration", "mock");
    song.audio_url = Some(format!("{}/audio/{song_id}", server.uri()));
    song.cover_url = Some(format!("{}/cover/{song_id}", server.uri()));
    song.lyric = Some("[00:01.00]first line\n[00:02.00]second line".to_string());
    song
}

/// Serve audio and cover for `song_id`, answering audio requests at most `audio_hits` times
pub async fn serve_song(server: &MockServer, song_id: &str, audio_hits: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/audio/{song_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(AUDIO_BYTES))
        .expect(audio_hits)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/cover/{song_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(COVER_BYTES))
        .mount(server)
        .await;
}

/// Scheduler wired to the production HTTP resolver and on-disk existence check
pub async fn http_scheduler(dir: &TempDir, max_concurrent: usize) -> DownloadScheduler {
    let config = test_config(dir.path(), max_concurrent);
    let collaborators = Collaborators::http(&config).unwrap();
    DownloadScheduler::new(config, collaborators).await.unwrap()
}
