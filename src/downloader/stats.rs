//! Read-only views of queue state.

use crate::types::{DownloadTask, QueueStats, Status, TaskId};

use super::DownloadScheduler;

impl DownloadScheduler {
    /// Snapshot of queue sizes and lifetime counters
    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            pending_count: state.pending.len(),
            active_count: state.active.len(),
            completed_count: state.completed.len(),
            failed_count: state.failed.len(),
            total_created: state.total_created,
            total_successful: state.total_successful,
            max_concurrent: self.config.download.max_concurrent_downloads,
        }
    }

    /// A task by id
    pub fn task(&self, id: &TaskId) -> Option<DownloadTask> {
        self.lock().tasks.get(id).cloned()
    }

    /// Every known task: pending in FIFO order, then running, completed, failed and
    /// finally cancelled tasks
    pub fn tasks(&self) -> Vec<DownloadTask> {
        let state = self.lock();

        let mut active: Vec<&DownloadTask> = state
            .active
            .iter()
            .filter_map(|id| state.tasks.get(id))
            .collect();
        active.sort_by_key(|task| (task.started_at, task.created_at));

        let mut cancelled: Vec<&DownloadTask> = state
            .tasks
            .values()
            .filter(|task| task.status == Status::Cancelled)
            .collect();
        cancelled.sort_by_key(|task| task.created_at);

        state
            .pending
            .iter()
            .filter_map(|id| state.tasks.get(id))
            .chain(active)
            .chain(state.completed.iter().filter_map(|id| state.tasks.get(id)))
            .chain(state.failed.iter().filter_map(|id| state.tasks.get(id)))
            .chain(cancelled)
            .cloned()
            .collect()
    }

    /// Ids in the pending FIFO, head first
    pub fn pending_ids(&self) -> Vec<TaskId> {
        self.lock().pending.iter().cloned().collect()
    }

    /// Last progress fraction reported for a task
    pub fn progress(&self, id: &TaskId) -> Option<f32> {
        self.pipeline.cache.progress(id)
    }
}
