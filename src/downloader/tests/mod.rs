use super::test_helpers::*;
use super::*;
use crate::types::{Event, SongRef, Status, TaskId};

mod completion;

fn song(song_id: &str) -> SongRef {
    test_song(song_id)
}

/// Persisted status of a task after flushing queued writes
async fn stored_status(scheduler: &DownloadScheduler, id: &TaskId) -> Option<String> {
    scheduler.flush_persistence().await.unwrap();
    scheduler
        .db
        .get_task(id)
        .await
        .unwrap()
        .map(|record| record.status)
}
