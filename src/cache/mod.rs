//! Existence and progress cache
//!
//! [`StateCache`] answers "is this song already downloaded?" without touching the disk
//! or library on every call, and fans pipeline progress out to subscribers without
//! flooding them.
//!
//! - [`existence`] - TTL-bounded existence entries with the synchronous-fresh and
//!   optimistic-async read policies, plus invalidation
//! - [`progress`] - per-task progress fractions with notification throttling
//!
//! The cache is shared by the scheduler, every running pipeline and the caller layer.
//! All state sits behind short, non-async critical sections so it can be touched from
//! any task without confining it to one executor.

use crate::config::CacheConfig;
use crate::types::{Event, TaskId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

mod existence;
mod progress;

pub use existence::{DiskExistence, ExistenceCheck};

/// Cached answer for one song
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ExistenceEntry {
    pub(crate) exists: bool,
    pub(crate) checked_at: Instant,
}

/// Last reported progress for one task
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ProgressEntry {
    pub(crate) fraction: f32,
    pub(crate) last_notified_at: Option<Instant>,
}

struct CacheState {
    existence: HashMap<String, ExistenceEntry>,
    progress: HashMap<TaskId, ProgressEntry>,
}

/// Shared existence/progress cache (cheap to clone)
#[derive(Clone)]
pub struct StateCache {
    state: Arc<Mutex<CacheState>>,
    checker: Arc<dyn ExistenceCheck>,
    event_tx: tokio::sync::broadcast::Sender<Event>,
    ttl: Duration,
    throttle: Duration,
}

impl StateCache {
    /// Create a cache answering misses with `checker` and publishing on `event_tx`
    pub fn new(
        config: &CacheConfig,
        checker: Arc<dyn ExistenceCheck>,
        event_tx: tokio::sync::broadcast::Sender<Event>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                existence: HashMap::new(),
                progress: HashMap::new(),
            })),
            checker,
            event_tx,
            ttl: config.existence_ttl,
            throttle: config.progress_throttle,
        }
    }

    /// Entries older than this are stale
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Critical sections never panic midway, so a poisoned lock still holds consistent data
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
