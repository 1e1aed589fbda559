//! Submission, FIFO drain and cancellation.

use crate::error::{DownloadError, Error, Result};
use crate::pipeline::DownloadPipeline;
use crate::types::{DownloadTask, Event, SongRef, Status, TaskId};

use super::persistence::PersistOp;
use super::{DownloadScheduler, now_ms};

impl DownloadScheduler {
    /// Submit a song for download
    ///
    /// Always accepted: the task is appended to the pending FIFO, persisted as
    /// Pending and the queue is drained. Rejecting a song that is already pending or
    /// running is the caller's job (see [`DownloadService`](crate::DownloadService)).
    ///
    /// After [`shutdown`](Self::shutdown) the task is still queued and persisted, but
    /// not started.
    pub fn submit(&self, song: SongRef) -> TaskId {
        let id = {
            let mut state = self.lock();
            let created_at = state.next_created_at(now_ms());
            let task = DownloadTask::new(song, created_at);
            let id = task.id.clone();

            self.store.upsert(&task);
            self.emit_event(Event::Queued {
                id: id.clone(),
                song_id: task.song.song_id.clone(),
            });
            tracing::info!(task_id = %id, song_id = %task.song.song_id, "Task queued");

            state.pending.push_back(id.clone());
            state.tasks.insert(id.clone(), task);
            state.total_created += 1;
            id
        };

        self.drain();
        id
    }

    /// Start pending tasks while slots are free
    ///
    /// Pops the FIFO head while fewer than `max_concurrent_downloads` pipelines run,
    /// marks each Running and spawns its pipeline. Never waits for I/O.
    pub fn drain(&self) {
        let max_concurrent = self.config.download.max_concurrent_downloads;

        let started: Vec<(TaskId, SongRef)> = {
            let mut guard = self.lock();
            let state = &mut *guard;
            if !state.dispatching {
                return;
            }

            let mut started = Vec::new();
            while state.active.len() < max_concurrent {
                let Some(id) = state.pending.pop_front() else {
                    break;
                };
                let Some(task) = state.tasks.get_mut(&id) else {
                    tracing::warn!(task_id = %id, "Queued id without a task, dropping");
                    continue;
                };

                let started_at = now_ms();
                task.status = Status::Running;
                task.started_at = Some(started_at);
                task.completed_at = None;
                state.active.insert(id.clone());

                self.store.send(PersistOp::MarkRunning {
                    id: id.clone(),
                    started_at,
                });
                self.emit_event(Event::Started { id: id.clone() });
                tracing::info!(
                    task_id = %id,
                    active = state.active.len(),
                    pending = state.pending.len(),
                    "Task started"
                );

                started.push((id, task.song.clone()));
            }
            started
        };

        for (id, song) in started {
            self.spawn_pipeline(id, song);
        }
    }

    /// Cancel a pending task
    ///
    /// Running tasks cannot be preempted; cancelling one (or a finished task) returns
    /// [`DownloadError::InvalidState`].
    pub fn cancel(&self, id: &TaskId) -> Result<()> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let Some(task) = state.tasks.get_mut(id) else {
            return Err(DownloadError::NotFound { id: id.to_string() }.into());
        };
        if task.status != Status::Pending {
            return Err(DownloadError::InvalidState {
                id: id.to_string(),
                operation: "cancel".to_string(),
                current_state: task.status.to_string(),
            }
            .into());
        }

        let completed_at = now_ms();
        task.status = Status::Cancelled;
        task.completed_at = Some(completed_at);
        state.pending.retain(|pending| pending != id);

        self.store.send(PersistOp::MarkFinished {
            id: id.clone(),
            status: Status::Cancelled,
            completed_at,
            error: None,
        });
        self.emit_event(Event::Cancelled { id: id.clone() });
        tracing::info!(task_id = %id, "Task cancelled");

        Ok(())
    }

    /// Pending or running task for a song, if any
    pub fn find_active(&self, song_id: &str) -> Option<TaskId> {
        let state = self.lock();
        state
            .active
            .iter()
            .chain(state.pending.iter())
            .filter(|id| {
                state
                    .tasks
                    .get(*id)
                    .is_some_and(|task| task.song.song_id == song_id)
            })
            .min_by_key(|id| state.tasks.get(*id).map(|task| task.created_at))
            .cloned()
    }

    /// Run the pipeline in its own task so a panic inside it still frees the slot
    fn spawn_pipeline(&self, id: TaskId, song: SongRef) {
        let pipeline = DownloadPipeline::new(id.clone(), song, self.pipeline.clone());
        let scheduler = self.clone();

        tokio::spawn(async move {
            let run = tokio::spawn(async move { pipeline.run().await });
            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(task_id = %id, error = %e, "Pipeline task aborted");
                    scheduler.cache().fail_progress(&id);
                    Err(Error::Other(format!("pipeline panicked: {e}")))
                }
            };
            scheduler.on_task_finished(&id, outcome);
        });
    }
}
