//! Startup recovery and shutdown coordination.

use crate::error::Result;
use crate::types::{Event, Status};
use std::time::Duration;

use super::DownloadScheduler;
use super::persistence::PersistOp;

/// How long shutdown waits for running pipelines
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl DownloadScheduler {
    /// Load persisted tasks from a previous session
    ///
    /// Run once at startup, before submitting. Pending and Running records are
    /// re-queued as Pending in creation order; Completed and Failed records refill
    /// the terminal logs and the lifetime statistics. Corrupt records are logged and
    /// skipped. Nothing is started: call [`drain`](Self::drain) to begin.
    ///
    /// Tasks already known to this scheduler are left alone, so calling this twice
    /// does not duplicate anything. Returns the number of tasks re-queued.
    ///
    /// # Errors
    ///
    /// Fails only if the task store cannot be read at all.
    pub async fn recover(&self) -> Result<usize> {
        // Writes queued by this instance must be visible to the read below
        self.flush_persistence().await?;
        let loaded = self.db.load_tasks().await?;

        let mut requeued = 0;
        let mut skipped = 0;
        {
            let mut guard = self.lock();
            let state = &mut *guard;

            for mut task in loaded.tasks {
                if state.tasks.contains_key(&task.id) {
                    skipped += 1;
                    continue;
                }
                state.last_created_at = state.last_created_at.max(task.created_at);
                state.total_created += 1;

                match task.status {
                    Status::Pending | Status::Running => {
                        if task.status == Status::Running {
                            self.store.send(PersistOp::Requeue {
                                id: task.id.clone(),
                            });
                        }
                        task.status = Status::Pending;
                        task.started_at = None;
                        task.completed_at = None;
                        state.pending.push_back(task.id.clone());
                        requeued += 1;
                    }
                    Status::Completed => {
                        state.completed.push(task.id.clone());
                        state.total_successful += 1;
                    }
                    Status::Failed => state.failed.push(task.id.clone()),
                    Status::Cancelled => {}
                }
                state.tasks.insert(task.id.clone(), task);
            }
        }

        tracing::info!(
            requeued,
            skipped,
            corrupt = loaded.corrupt,
            "Recovered persisted tasks"
        );
        Ok(requeued)
    }

    /// Gracefully shut down the scheduler
    ///
    /// 1. Stops starting pending tasks (submissions are still queued and persisted)
    /// 2. Waits up to 30 seconds for running pipelines
    /// 3. Flushes queued store writes
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Pipelines still running after the timeout keep their Running record and are
    /// re-queued by the next [`recover`](Self::recover).
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");
        self.lock().dispatching = false;

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_pipelines()).await {
            Ok(()) => tracing::info!("All running pipelines finished"),
            Err(_) => tracing::warn!(
                active = self.lock().active.len(),
                "Timeout waiting for pipelines, proceeding with shutdown"
            ),
        }

        self.flush_persistence().await?;
        self.emit_event(Event::Shutdown);
        tracing::info!("Shutdown complete");
        Ok(())
    }

    /// Whether shutdown has stopped dispatching
    pub fn is_shutting_down(&self) -> bool {
        !self.lock().dispatching
    }

    async fn wait_for_active_pipelines(&self) {
        loop {
            let active_count = self.lock().active.len();
            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for running pipelines to finish");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}
