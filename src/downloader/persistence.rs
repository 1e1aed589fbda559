//! Single-writer task store actor.
//!
//! Scheduler operations never await the database. They enqueue [`PersistOp`]s, which
//! one background task applies in order. A failed write is logged and the in-memory
//! task carries on; only durability is lost.

use crate::db::{Database, TaskRecord};
use crate::error::{Error, Result};
use crate::types::{DownloadTask, Status, TaskId};
use std::sync::Arc;

use super::DownloadScheduler;

/// One ordered write against the task store
#[derive(Debug)]
pub(crate) enum PersistOp {
    /// Insert or replace a whole record (new submissions)
    Upsert(Box<TaskRecord>),
    /// Pending → Running
    MarkRunning { id: TaskId, started_at: i64 },
    /// Running → Completed/Failed, or Pending → Cancelled
    MarkFinished {
        id: TaskId,
        status: Status,
        completed_at: i64,
        error: Option<String>,
    },
    /// Back to Pending with timestamps and error cleared
    Requeue { id: TaskId },
    /// Forget the record
    Delete { id: TaskId },
    /// Forget every record with this status
    DeleteByStatus(Status),
    /// Barrier answered once every earlier op has been applied
    Flush(tokio::sync::oneshot::Sender<()>),
}

/// Sending half of the writer actor
#[derive(Clone)]
pub(crate) struct PersistenceHandle {
    tx: tokio::sync::mpsc::UnboundedSender<PersistOp>,
}

impl PersistenceHandle {
    /// Spawn the writer task; it stops once every handle is dropped
    pub(crate) fn spawn(db: Arc<Database>) -> Self {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(run_writer(db, rx));
        Self { tx }
    }

    /// Queue a write without waiting for it
    pub(crate) fn send(&self, op: PersistOp) {
        if let Err(e) = self.tx.send(op) {
            tracing::warn!(op = ?e.0, "Persistence writer stopped, write dropped");
        }
    }

    /// Queue the full record of a task
    pub(crate) fn upsert(&self, task: &DownloadTask) {
        match TaskRecord::from_task(task) {
            Ok(record) => self.send(PersistOp::Upsert(Box::new(record))),
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "Failed to serialize task record")
            }
        }
    }

    /// Wait until every write queued so far has been applied
    pub(crate) async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(PersistOp::Flush(done_tx))
            .map_err(|_| Error::Other("persistence writer stopped".to_string()))?;
        done_rx
            .await
            .map_err(|_| Error::Other("persistence writer stopped".to_string()))
    }
}

async fn run_writer(
    db: Arc<Database>,
    mut rx: tokio::sync::mpsc::UnboundedReceiver<PersistOp>,
) {
    while let Some(op) = rx.recv().await {
        let result = match op {
            PersistOp::Upsert(record) => db.upsert_task(&record).await,
            PersistOp::MarkRunning { id, started_at } => db.mark_running(&id, started_at).await,
            PersistOp::MarkFinished {
                id,
                status,
                completed_at,
                error,
            } => {
                db.mark_finished(&id, status, completed_at, error.as_deref())
                    .await
            }
            PersistOp::Requeue { id } => db.requeue_task(&id).await,
            PersistOp::Delete { id } => db.delete_task(&id).await,
            PersistOp::DeleteByStatus(status) => db
                .delete_tasks_by_status(status)
                .await
                .map(|removed| tracing::debug!(%status, removed, "Cleared task records")),
            PersistOp::Flush(done) => {
                done.send(()).ok();
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "Task store write failed; state kept in memory only");
        }
    }
    tracing::debug!("Persistence writer stopped");
}

impl DownloadScheduler {
    /// Wait until every state change made so far is written to the task store
    pub async fn flush_persistence(&self) -> Result<()> {
        self.store.flush().await
    }
}
