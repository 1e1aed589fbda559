//! Shared test doubles and a scheduler factory for unit tests.

use crate::cache::ExistenceCheck;
use crate::config::Config;
use crate::downloader::{Collaborators, DownloadScheduler};
use crate::error::{Error, Result};
use crate::library::{LibraryRecord, LibraryWriter};
use crate::resolver::{ProgressFn, SongResolver};
use crate::types::{SongRef, Status, TaskId};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Song with every locator set, so all five stages do real work
pub(crate) fn test_song(song_id: &str) -> SongRef {
    let mut song = SongRef::new(song_id, format!("Title {song_id}"), "Artist", "netease");
    song.audio_url = Some(format!("https://music.example/{song_id}.mp3"));
    song.cover_url = Some(format!("https://music.example/{song_id}.jpg"));
    song.lyric = Some("[00:00.00]la la la".to_string());
    song
}

/// Config rooted in `dir`, with the disk space check off
pub(crate) fn test_config(dir: &Path, max_concurrent: usize) -> Config {
    let mut config = Config::default();
    config.download.download_dir = dir.join("music");
    config.download.max_concurrent_downloads = max_concurrent;
    config.persistence.database_path = dir.join("tasks.db");
    config.disk_space.enabled = false;
    config
}

/// [`ExistenceCheck`] with scripted answers and a call counter
pub(crate) struct StubExistence {
    default: bool,
    answers: Mutex<HashMap<String, bool>>,
    calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl StubExistence {
    /// Answer `default` for every song not set explicitly
    pub(crate) fn new(default: bool) -> Self {
        Self {
            default,
            answers: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    pub(crate) fn set(&self, song_id: &str, exists: bool) {
        self.answers
            .lock()
            .unwrap()
            .insert(song_id.to_string(), exists);
    }

    /// Make the next check return an error
    pub(crate) fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ExistenceCheck for StubExistence {
    async fn exists(&self, song_id: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::Other("existence source unavailable".into()));
        }
        Ok(self
            .answers
            .lock()
            .unwrap()
            .get(song_id)
            .copied()
            .unwrap_or(self.default))
    }
}

/// [`SongResolver`] writing canned bytes, with failure switches and per-song holds
///
/// Audio fetches for a held song wait until the test releases it, which keeps that
/// pipeline Running for as long as the test needs.
pub(crate) struct MockResolver {
    audio: Vec<u8>,
    holds: Mutex<HashMap<String, Arc<tokio::sync::Semaphore>>>,
    fail_audio: Mutex<HashSet<String>>,
    panic_audio: Mutex<HashSet<String>>,
    fail_cover: AtomicBool,
    fail_lyric: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    audio_calls: AtomicUsize,
    started: Mutex<Vec<String>>,
}

impl MockResolver {
    pub(crate) fn new() -> Self {
        Self {
            audio: b"ID3 mock audio payload".to_vec(),
            holds: Mutex::new(HashMap::new()),
            fail_audio: Mutex::new(HashSet::new()),
            panic_audio: Mutex::new(HashSet::new()),
            fail_cover: AtomicBool::new(false),
            fail_lyric: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            audio_calls: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
        }
    }

    /// Block audio fetches for these songs until released
    pub(crate) fn hold(&self, song_ids: &[&str]) {
        let mut holds = self.holds.lock().unwrap();
        for song_id in song_ids {
            holds.insert(
                song_id.to_string(),
                Arc::new(tokio::sync::Semaphore::new(0)),
            );
        }
    }

    /// Let one held fetch of this song finish
    pub(crate) fn release(&self, song_id: &str) {
        if let Some(gate) = self.holds.lock().unwrap().get(song_id) {
            gate.add_permits(1);
        }
    }

    /// Audio fetches for this song write a partial file then fail
    pub(crate) fn fail_audio_for(&self, song_id: &str) {
        self.fail_audio.lock().unwrap().insert(song_id.to_string());
    }

    /// Audio fetches for this song panic
    pub(crate) fn panic_audio_for(&self, song_id: &str) {
        self.panic_audio.lock().unwrap().insert(song_id.to_string());
    }

    pub(crate) fn heal_audio_for(&self, song_id: &str) {
        self.fail_audio.lock().unwrap().remove(song_id);
    }

    pub(crate) fn fail_covers(&self) {
        self.fail_cover.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_lyrics(&self) {
        self.fail_lyric.store(true, Ordering::SeqCst);
    }

    pub(crate) fn audio_calls(&self) -> usize {
        self.audio_calls.load(Ordering::SeqCst)
    }

    /// Highest number of audio fetches observed running at once
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Song ids in the order their audio fetch began
    pub(crate) fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SongResolver for MockResolver {
    async fn fetch_audio(
        &self,
        song: &SongRef,
        dest: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<u64> {
        self.audio_calls.fetch_add(1, Ordering::SeqCst);
        self.started.lock().unwrap().push(song.song_id.clone());
        let should_panic = self.panic_audio.lock().unwrap().contains(&song.song_id);
        if should_panic {
            panic!("resolver blew up on {}", song.song_id);
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let gate = self.holds.lock().unwrap().get(&song.song_id).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let total = self.audio.len() as u64;
        let should_fail = self.fail_audio.lock().unwrap().contains(&song.song_id);
        let result = if should_fail {
            tokio::fs::write(dest, &self.audio[..4]).await.unwrap();
            on_progress(4, total);
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "simulated network error",
            )))
        } else {
            on_progress(0, total);
            tokio::fs::write(dest, &self.audio).await.unwrap();
            on_progress(total, total);
            Ok(total)
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn fetch_cover(&self, song: &SongRef, dest: &Path) -> Result<Option<PathBuf>> {
        if song.cover_url.is_none() {
            return Ok(None);
        }
        if self.fail_cover.load(Ordering::SeqCst) {
            tokio::fs::write(dest, b"partial").await.unwrap();
            return Err(Error::Other("cover host unreachable".into()));
        }
        tokio::fs::write(dest, b"jpeg").await?;
        Ok(Some(dest.to_path_buf()))
    }

    async fn fetch_lyric(&self, song: &SongRef, dest: &Path) -> Result<Option<PathBuf>> {
        let Some(lyric) = &song.lyric else {
            return Ok(None);
        };
        if self.fail_lyric.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only storage",
            )));
        }
        tokio::fs::write(dest, lyric).await?;
        Ok(Some(dest.to_path_buf()))
    }
}

/// [`LibraryWriter`] that keeps every record, or fails on demand
#[derive(Default)]
pub(crate) struct RecordingLibrary {
    records: Mutex<Vec<LibraryRecord>>,
    fail: AtomicBool,
}

impl RecordingLibrary {
    pub(crate) fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: AtomicBool::new(true),
        }
    }

    pub(crate) fn records(&self) -> Vec<LibraryRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LibraryWriter for RecordingLibrary {
    async fn upsert(&self, record: LibraryRecord) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Other("library database locked".into()));
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

/// A scheduler over mocks, plus handles to inspect them
pub(crate) struct TestScheduler {
    pub(crate) scheduler: DownloadScheduler,
    pub(crate) resolver: Arc<MockResolver>,
    pub(crate) library: Arc<RecordingLibrary>,
    pub(crate) existence: Arc<StubExistence>,
    pub(crate) config: Config,
    /// Keeps the database and download directory alive
    pub(crate) temp_dir: TempDir,
}

/// Scheduler over mocks; songs start out absent
pub(crate) async fn create_test_scheduler(max_concurrent: usize) -> TestScheduler {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path(), max_concurrent);
    let resolver = Arc::new(MockResolver::new());
    let library = Arc::new(RecordingLibrary::default());
    let existence = Arc::new(StubExistence::new(false));

    let scheduler = DownloadScheduler::new(
        config.clone(),
        Collaborators {
            resolver: resolver.clone(),
            library: library.clone(),
            existence: existence.clone(),
        },
    )
    .await
    .unwrap();

    TestScheduler {
        scheduler,
        resolver,
        library,
        existence,
        config,
        temp_dir,
    }
}

/// Reopen the same database and download directory with a fresh resolver
pub(crate) async fn reopen(previous: &TestScheduler) -> (DownloadScheduler, Arc<MockResolver>) {
    let resolver = Arc::new(MockResolver::new());
    let scheduler = DownloadScheduler::new(
        previous.config.clone(),
        Collaborators {
            resolver: resolver.clone(),
            library: Arc::new(RecordingLibrary::default()),
            existence: Arc::new(StubExistence::new(false)),
        },
    )
    .await
    .unwrap();
    (scheduler, resolver)
}

/// Poll until `condition` holds, panicking after five seconds
pub(crate) async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait until a task reaches `status`
pub(crate) async fn wait_for_status(scheduler: &DownloadScheduler, id: &TaskId, status: Status) {
    wait_until(&format!("{id} to become {status}"), || {
        scheduler.task(id).map(|task| task.status) == Some(status)
    })
    .await;
}

/// Receive events until one matches `stop`, returning all of them
pub(crate) async fn collect_until(
    rx: &mut tokio::sync::broadcast::Receiver<crate::types::Event>,
    stop: impl Fn(&crate::types::Event) -> bool,
) -> Vec<crate::types::Event> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .unwrap();
        let done = stop(&event);
        events.push(event);
        if done {
            return events;
        }
    }
}
