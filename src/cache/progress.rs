//! Per-task progress with notification throttling.

use tokio::time::Instant;

use super::{ProgressEntry, StateCache};
use crate::types::{Event, TaskId};

impl StateCache {
    /// Start a pipeline run at 0%, always notified
    ///
    /// Resets any fraction left over from a previous run of the same task.
    pub fn begin_progress(&self, id: &TaskId) {
        let now = Instant::now();
        self.lock().progress.insert(
            id.clone(),
            ProgressEntry {
                fraction: 0.0,
                last_notified_at: Some(now),
            },
        );
        self.emit_progress(id, 0.0);
    }

    /// Report progress for a running task
    ///
    /// Fractions are clamped to [0, 1] and never move backwards within a run. Reaching
    /// 1.0 is notified immediately; intermediate values are notified at most once per
    /// throttle window. Returns whether a notification was sent.
    pub fn report_progress(&self, id: &TaskId, fraction: f32) -> bool {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let now = Instant::now();

        let deliver = {
            let mut state = self.lock();
            let entry = state.progress.entry(id.clone()).or_insert(ProgressEntry {
                fraction: 0.0,
                last_notified_at: None,
            });

            let stale = fraction < entry.fraction
                || (fraction == entry.fraction && entry.last_notified_at.is_some());
            if stale {
                return false;
            }
            entry.fraction = fraction;

            let due = match entry.last_notified_at {
                Some(last) => now.duration_since(last) >= self.throttle,
                None => true,
            };
            let deliver = fraction >= 1.0 || due;
            if deliver {
                entry.last_notified_at = Some(now);
            }
            deliver
        };

        if deliver {
            self.emit_progress(id, fraction);
        } else {
            tracing::trace!(task_id = %id, fraction, "Progress update throttled");
        }
        deliver
    }

    /// End a failed run, always notified with the last fraction reached
    pub fn fail_progress(&self, id: &TaskId) {
        let fraction = {
            let mut state = self.lock();
            let entry = state.progress.entry(id.clone()).or_insert(ProgressEntry {
                fraction: 0.0,
                last_notified_at: None,
            });
            entry.last_notified_at = Some(Instant::now());
            entry.fraction
        };
        self.emit_progress(id, fraction);
    }

    /// Last reported fraction for a task
    pub fn progress(&self, id: &TaskId) -> Option<f32> {
        self.lock().progress.get(id).map(|entry| entry.fraction)
    }

    /// Forget a task's progress
    pub fn clear_progress(&self, id: &TaskId) {
        self.lock().progress.remove(id);
    }

    fn emit_progress(&self, id: &TaskId, fraction: f32) {
        self.emit_event(Event::Progress {
            id: id.clone(),
            fraction,
        });
    }
}
