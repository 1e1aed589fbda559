//! Terminal outcomes of pipeline runs.

use crate::error::Result;
use crate::types::{Artifact, Event, Status, TaskId};

use super::persistence::PersistOp;
use super::{DownloadScheduler, now_ms};

impl DownloadScheduler {
    /// Record the outcome of a pipeline run and start the next pending task
    ///
    /// Called by the scheduler's own pipeline tasks. The task leaves the active set,
    /// is persisted as Completed or Failed and appended to the matching log. A
    /// failure emits [`Event::Failed`] followed by `Completed { success: false }`.
    ///
    /// An outcome for a task that is not running is logged and ignored.
    pub(crate) fn on_task_finished(&self, id: &TaskId, outcome: Result<Artifact>) {
        {
            let mut guard = self.lock();
            let state = &mut *guard;

            if !state.active.remove(id) {
                tracing::warn!(task_id = %id, "Outcome for a task that is not running, ignoring");
                return;
            }
            let Some(task) = state.tasks.get_mut(id) else {
                tracing::warn!(task_id = %id, "Running id without a task");
                return;
            };

            let completed_at = now_ms();
            task.completed_at = Some(completed_at);

            match outcome {
                Ok(artifact) => {
                    task.status = Status::Completed;
                    task.last_error = None;
                    state.completed.push(id.clone());
                    state.total_successful += 1;

                    self.store.send(PersistOp::MarkFinished {
                        id: id.clone(),
                        status: Status::Completed,
                        completed_at,
                        error: None,
                    });
                    tracing::info!(
                        task_id = %id,
                        reused = artifact.reused,
                        path = %artifact.audio_path.display(),
                        "Task completed"
                    );
                    self.emit_event(Event::Completed {
                        id: id.clone(),
                        success: true,
                        artifact: Some(artifact),
                    });
                }
                Err(e) => {
                    let message = e.to_string();
                    task.status = Status::Failed;
                    task.last_error = Some(message.clone());
                    state.failed.push(id.clone());

                    self.store.send(PersistOp::MarkFinished {
                        id: id.clone(),
                        status: Status::Failed,
                        completed_at,
                        error: Some(message.clone()),
                    });
                    tracing::error!(task_id = %id, error = %e, "Task failed");
                    self.emit_event(Event::Failed {
                        id: id.clone(),
                        error: message,
                    });
                    self.emit_event(Event::Completed {
                        id: id.clone(),
                        success: false,
                        artifact: None,
                    });
                }
            }
        }

        self.drain();
    }
}
