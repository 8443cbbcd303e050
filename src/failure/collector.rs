use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{FailureSink, HandlerFailure};

/// Bounded in-memory history of handler failures.
///
/// Keeps at most `capacity` failures; once full, the oldest entry is
/// discarded to make room and counted in [`FailureCollector::dropped`].
#[derive(Debug)]
pub struct FailureCollector {
    failures: Mutex<VecDeque<HandlerFailure>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl FailureCollector {
    /// Creates a collector. The capacity is clamped to a minimum of 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            failures: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the retained failures, oldest first.
    pub fn failures(&self) -> Vec<HandlerFailure> {
        self.lock().iter().cloned().collect()
    }

    /// Removes and returns the retained failures, oldest first.
    pub fn take(&self) -> Vec<HandlerFailure> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of failures evicted because the history was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<HandlerFailure>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FailureCollector {
    fn default() -> Self {
        Self::new(256)
    }
}

impl FailureSink for FailureCollector {
    fn on_failure(&self, failure: &HandlerFailure) {
        let mut failures = self.lock();
        if failures.len() >= self.capacity {
            failures.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        failures.push_back(failure.clone());
    }
}
