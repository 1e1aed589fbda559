//! Task control - retry, removal and log clearing.

use crate::error::{DownloadError, Result};
use crate::types::{Event, Status, TaskId};

use super::persistence::PersistOp;
use super::{DownloadScheduler, QueueState};

impl DownloadScheduler {
    /// Move every failed task back to the pending FIFO
    ///
    /// Tasks are appended at the tail in failure order, behind anything already
    /// pending, and the failed log is emptied. Returns the number of tasks re-queued.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use song_dl::*;
    /// # fn example(scheduler: DownloadScheduler) {
    /// let requeued = scheduler.retry_failed();
    /// println!("retrying {requeued} downloads");
    /// # }
    /// ```
    pub fn retry_failed(&self) -> usize {
        let requeued = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let failed = std::mem::take(&mut state.failed);
            let count = failed.len();
            for id in failed {
                self.requeue(state, id);
            }
            count
        };

        if requeued > 0 {
            tracing::info!(requeued, "Retrying failed tasks");
        }
        self.drain();
        requeued
    }

    /// Move one failed task back to the pending FIFO
    ///
    /// # Errors
    ///
    /// [`DownloadError::NotFound`] for an unknown id, [`DownloadError::InvalidState`]
    /// unless the task is Failed.
    pub fn retry(&self, id: &TaskId) -> Result<()> {
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            ensure_status(state, id, "retry", |status| status == Status::Failed)?;

            state.failed.retain(|failed| failed != id);
            self.requeue(state, id.clone());
        }

        tracing::info!(task_id = %id, "Retrying task");
        self.drain();
        Ok(())
    }

    /// Forget a finished or cancelled task
    ///
    /// Removes it from its log, the task map and the store.
    ///
    /// # Errors
    ///
    /// [`DownloadError::NotFound`] for an unknown id, [`DownloadError::InvalidState`]
    /// while the task is Pending or Running.
    pub fn remove(&self, id: &TaskId) -> Result<()> {
        let mut guard = self.lock();
        let state = &mut *guard;
        ensure_status(state, id, "remove", |status| status.is_terminal())?;

        state.completed.retain(|done| done != id);
        state.failed.retain(|failed| failed != id);
        state.tasks.remove(id);

        self.store.send(PersistOp::Delete { id: id.clone() });
        self.pipeline.cache.clear_progress(id);
        self.emit_event(Event::Removed { id: id.clone() });
        tracing::debug!(task_id = %id, "Task removed");
        Ok(())
    }

    /// Drop every completed task, returning how many were removed
    pub fn clear_completed(&self) -> usize {
        let mut guard = self.lock();
        let state = &mut *guard;
        let cleared = std::mem::take(&mut state.completed);
        self.forget(state, &cleared, Status::Completed);
        cleared.len()
    }

    /// Drop every failed task, returning how many were removed
    pub fn clear_failed(&self) -> usize {
        let mut guard = self.lock();
        let state = &mut *guard;
        let cleared = std::mem::take(&mut state.failed);
        self.forget(state, &cleared, Status::Failed);
        cleared.len()
    }

    fn requeue(&self, state: &mut QueueState, id: TaskId) {
        let Some(task) = state.tasks.get_mut(&id) else {
            return;
        };
        task.status = Status::Pending;
        task.started_at = None;
        task.completed_at = None;
        task.last_error = None;

        self.store.send(PersistOp::Requeue { id: id.clone() });
        self.emit_event(Event::Queued {
            id: id.clone(),
            song_id: task.song.song_id.clone(),
        });
        state.pending.push_back(id);
    }

    fn forget(&self, state: &mut QueueState, ids: &[TaskId], status: Status) {
        for id in ids {
            state.tasks.remove(id);
            self.pipeline.cache.clear_progress(id);
        }
        self.store.send(PersistOp::DeleteByStatus(status));
        tracing::info!(%status, cleared = ids.len(), "Cleared finished tasks");
    }
}

fn ensure_status(
    state: &QueueState,
    id: &TaskId,
    operation: &str,
    allowed: impl Fn(Status) -> bool,
) -> Result<()> {
    let Some(task) = state.tasks.get(id) else {
        return Err(DownloadError::NotFound { id: id.to_string() }.into());
    };
    if !allowed(task.status) {
        return Err(DownloadError::InvalidState {
            id: id.to_string(),
            operation: operation.to_string(),
            current_state: task.status.to_string(),
        }
        .into());
    }
    Ok(())
}
