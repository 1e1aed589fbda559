//! Custom test assertions for integration tests

use song_dl::{Artifact, Event, TaskId};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

/// Result of waiting for a task to finish
#[derive(Debug)]
pub enum WaitResult {
    /// Task completed with an artifact
    Completed(Artifact),
    /// Task failed with error
    Failed(String),
    /// Timeout waiting for completion
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Wait for a task to reach a terminal state
///
/// The receiver must be subscribed before the task is submitted so no event is missed.
pub async fn wait_for_completion(
    events: &mut Receiver<Event>,
    id: &TaskId,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::Completed {
                    id: event_id,
                    success: true,
                    artifact: Some(artifact),
                }) if &event_id == id => {
                    return WaitResult::Completed(artifact);
                }
                Ok(Event::Failed {
                    id: event_id,
                    error,
                }) if &event_id == id => {
                    return WaitResult::Failed(error);
                }
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    match result {
        Ok(wait_result) => wait_result,
        Err(_) => WaitResult::Timeout,
    }
}

/// Assert that a task completed and return its artifact
pub async fn assert_task_completed(
    events: &mut Receiver<Event>,
    id: &TaskId,
    timeout: Duration,
) -> Artifact {
    match wait_for_completion(events, id, timeout).await {
        WaitResult::Completed(artifact) => artifact,
        WaitResult::Failed(error) => panic!("Task {} failed with error: {}", id, error),
        WaitResult::Timeout => panic!("Timeout waiting for task {} to complete", id),
        WaitResult::ChannelClosed => {
            panic!("Event channel closed while waiting for task {}", id)
        }
    }
}

/// Assert that a task failed and return its error message
pub async fn assert_task_failed(
    events: &mut Receiver<Event>,
    id: &TaskId,
    timeout: Duration,
) -> String {
    match wait_for_completion(events, id, timeout).await {
        WaitResult::Failed(error) => error,
        other => panic!("Expected task {} to fail, got {:?}", id, other),
    }
}
