//! Consistency monitor
//!
//! Counts every place where a derived store may have drifted from the
//! authoritative one. Counters are process-local and exposed on `/health`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
struct Counters {
    cache_invalidation_failures: AtomicU64,
    cache_read_failures: AtomicU64,
    cache_fills_skipped: AtomicU64,
    index_retries: AtomicU64,
    index_permanent_misses: AtomicU64,
    index_tasks_dropped: AtomicU64,
}

/// Cheap-to-clone handle over shared drift counters.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyMonitor {
    inner: Arc<Counters>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonitorSnapshot {
    pub cache_invalidation_failures: u64,
    pub cache_read_failures: u64,
    pub cache_fills_skipped: u64,
    pub index_retries: u64,
    pub index_permanent_misses: u64,
    pub index_tasks_dropped: u64,
}

impl ConsistencyMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache key could not be deleted after a committed write.
    pub fn record_invalidation_failure(&self) {
        self.inner
            .cache_invalidation_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_read_failure(&self) {
        self.inner.cache_read_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A read-through fill was discarded because the key was invalidated meanwhile.
    pub fn record_fill_skipped(&self) {
        self.inner.cache_fills_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_index_retry(&self) {
        self.inner.index_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// An index task exhausted its attempts.
    pub fn record_index_miss(&self) {
        self.inner
            .index_permanent_misses
            .fetch_add(1, Ordering::Relaxed);
    }

    /// An index task could not be enqueued because the worker is gone.
    pub fn record_index_dropped(&self) {
        self.inner.index_tasks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let c = &self.inner;
        MonitorSnapshot {
            cache_invalidation_failures: c.cache_invalidation_failures.load(Ordering::Relaxed),
            cache_read_failures: c.cache_read_failures.load(Ordering::Relaxed),
            cache_fills_skipped: c.cache_fills_skipped.load(Ordering::Relaxed),
            index_retries: c.index_retries.load(Ordering::Relaxed),
            index_permanent_misses: c.index_permanent_misses.load(Ordering::Relaxed),
            index_tasks_dropped: c.index_tasks_dropped.load(Ordering::Relaxed),
        }
    }
}

impl MonitorSnapshot {
    /// True when no derived store is known to have drifted.
    pub fn is_clean(&self) -> bool {
        self.cache_invalidation_failures == 0
            && self.index_permanent_misses == 0
            && self.index_tasks_dropped == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters() {
        let monitor = ConsistencyMonitor::new();
        let other = monitor.clone();
        other.record_invalidation_failure();
        other.record_index_retry();
        monitor.record_index_retry();

        let snap = monitor.snapshot();
        assert_eq!(snap.cache_invalidation_failures, 1);
        assert_eq!(snap.index_retries, 2);
        assert!(!snap.is_clean());
    }

    #[test]
    fn retries_alone_are_clean() {
        let monitor = ConsistencyMonitor::new();
        monitor.record_index_retry();
        monitor.record_cache_read_failure();
        assert!(monitor.snapshot().is_clean());
    }
}
