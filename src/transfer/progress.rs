//! Thread-safe progress aggregation keyed by worker index

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Index of a transfer worker, assigned by the engine (0 for single-request transfers).
pub type WorkerId = usize;

/// Consistent view of a transfer's progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub total_bytes_transferred: u64,
    pub per_worker_bytes: BTreeMap<WorkerId, u64>,
    pub target_bytes: u64,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        if self.target_bytes == 0 {
            return 100.0;
        }
        (self.total_bytes_transferred as f64 / self.target_bytes as f64) * 100.0
    }
}

/// Receives a snapshot after every recorded chunk. Replaces printing
/// progress from inside the tracker.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, snapshot: &ProgressSnapshot);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressSnapshot) + Send + Sync,
{
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self(snapshot)
    }
}

/// Accumulates bytes per worker and in total under one lock, so a snapshot
/// never sees one updated without the other.
#[derive(Debug)]
pub struct ProgressTracker {
    inner: Mutex<ProgressSnapshot>,
}

impl ProgressTracker {
    pub fn new(target_bytes: u64) -> Self {
        Self {
            inner: Mutex::new(ProgressSnapshot {
                target_bytes,
                ..ProgressSnapshot::default()
            }),
        }
    }

    /// Add `bytes` for `worker` and return the resulting snapshot.
    /// Zero-byte records leave the state untouched.
    pub fn record(&self, worker: WorkerId, bytes: u64) -> ProgressSnapshot {
        let mut inner = self.lock();
        if bytes > 0 {
            inner.total_bytes_transferred += bytes;
            *inner.per_worker_bytes.entry(worker).or_insert(0) += bytes;
        }
        inner.clone()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, ProgressSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
