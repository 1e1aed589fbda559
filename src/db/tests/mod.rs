
use crate::db::TaskRecord;
use crate::types::{DownloadTask, SongRef, Status};

/// Build a record for `song_id` created at `created_at` with the given status
pub(super) fn record(song_id: &str, created_at: i64, status: Status) -> TaskRecord {
    let mut task = DownloadTask::new(
        SongRef::new(song_id, format!("Title {song_id}"), "Artist", "netease"),
        created_at,
    );
    task.status = status;
    TaskRecord::from_task(&task).unwrap()
}
