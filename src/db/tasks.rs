//! Task record CRUD operations.

use crate::error::DatabaseError;
use crate::types::{DownloadTask, Status, TaskId};
use crate::{Error, Result};

use super::{Database, TaskRecord};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

const TASK_COLUMNS: &str = "id, song_id, title, artist, source, status, song_json, \
                            created_at, started_at, completed_at, error_message";

/// Result of decoding every persisted record
#[derive(Debug, Default)]
pub struct LoadedTasks {
    /// Decoded tasks in creation order
    pub tasks: Vec<DownloadTask>,
    /// Number of records skipped because they could not be decoded
    pub corrupt: usize,
}

impl Database {
    /// Insert a task record, replacing any record stored under the same key
    pub async fn upsert_task(&self, record: &TaskRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO download_tasks (
                id, song_id, title, artist, source, status, song_json,
                created_at, started_at, completed_at, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                song_id = excluded.song_id,
                title = excluded.title,
                artist = excluded.artist,
                source = excluded.source,
                status = excluded.status,
                song_json = excluded.song_json,
                created_at = excluded.created_at,
                started_at = excluded.started_at,
                completed_at = excluded.completed_at,
                error_message = excluded.error_message
            "#,
        )
        .bind(&record.id)
        .bind(&record.song_id)
        .bind(&record.title)
        .bind(&record.artist)
        .bind(&record.source)
        .bind(&record.status)
        .bind(&record.song_json)
        .bind(record.created_at)
        .bind(record.started_at)
        .bind(record.completed_at)
        .bind(&record.error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert task: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Get a task record by key
    pub async fn get_task(&self, id: &TaskId) -> Result<Option<TaskRecord>> {
        let row = sqlx::query_as::<_, TaskRecord>(&format!(
            "SELECT {TASK_COLUMNS} FROM download_tasks WHERE id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get task: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List all task records in creation order
    pub async fn list_tasks(&self) -> Result<Vec<TaskRecord>> {
        let rows = sqlx::query_as::<_, TaskRecord>(&format!(
            "SELECT {TASK_COLUMNS} FROM download_tasks ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list tasks: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Mark a task Running
    pub async fn mark_running(&self, id: &TaskId, started_at: i64) -> Result<()> {
        sqlx::query(
            "UPDATE download_tasks SET status = ?, started_at = ?, completed_at = NULL WHERE id = ?",
        )
        .bind(Status::Running.as_str())
        .bind(started_at)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark task running: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Record a terminal status (Completed, Failed or Cancelled)
    pub async fn mark_finished(
        &self,
        id: &TaskId,
        status: Status,
        completed_at: i64,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE download_tasks SET status = ?, completed_at = ?, error_message = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(completed_at)
        .bind(error)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark task finished: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Reset a task to Pending, clearing its run timestamps and error
    pub async fn requeue_task(&self, id: &TaskId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE download_tasks
            SET status = ?, started_at = NULL, completed_at = NULL, error_message = NULL
            WHERE id = ?
            "#,
        )
        .bind(Status::Pending.as_str())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to requeue task: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Delete a task record
    pub async fn delete_task(&self, id: &TaskId) -> Result<()> {
        sqlx::query("DELETE FROM download_tasks WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete task: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Delete every task record with the given status, returning how many were removed
    pub async fn delete_tasks_by_status(&self, status: Status) -> Result<u64> {
        let result = sqlx::query("DELETE FROM download_tasks WHERE status = ?")
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete tasks by status: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }

    /// Load and decode every task record for recovery
    ///
    /// Rows are decoded one at a time. A row with a mistyped column, an unknown status
    /// or an unparsable song payload is logged and skipped; loading continues with the
    /// remaining rows.
    pub async fn load_tasks(&self) -> Result<LoadedTasks> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM download_tasks ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to load tasks: {}",
                e
            )))
        })?;

        let mut loaded = LoadedTasks::default();
        for row in rows {
            match decode_row(&row) {
                Ok(task) => loaded.tasks.push(task),
                Err(e) => {
                    tracing::error!(error = %e, "Skipping corrupt task record");
                    loaded.corrupt += 1;
                }
            }
        }

        Ok(loaded)
    }
}

fn decode_row(row: &SqliteRow) -> std::result::Result<DownloadTask, DatabaseError> {
    let record = TaskRecord::from_row(row).map_err(|e| DatabaseError::CorruptRecord {
        id: row
            .try_get::<String, _>("id")
            .unwrap_or_else(|_| "<unreadable id>".to_string()),
        reason: e.to_string(),
    })?;
    record.into_task()
}
