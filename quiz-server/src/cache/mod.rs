//! Read-model cache
//!
//! Serialized read models keyed by `user:{id}` and `quiz:{id}`. The cache is
//! never a source of truth: a failed read is a miss, a failed write is
//! ignored, and a failed invalidation is logged as drift and counted.

pub mod memory;
pub mod redis;

pub use memory::MemoryCache;
pub use self::redis::RedisCache;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::monitor::ConsistencyMonitor;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache timed out")]
    Timeout,
}

/// Key/value backend. `get` distinguishes a miss (`Ok(None)`) from a failure.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Cached read models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// User profile with owned quizzes and result history
    UserProfile(i64),
    /// Quiz with ordered questions and answers
    QuizDetail(i64),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::UserProfile(id) => write!(f, "user:{id}"),
            CacheKey::QuizDetail(id) => write!(f, "quiz:{id}"),
        }
    }
}

impl CacheKey {
    fn stripe(&self) -> usize {
        let (tag, id) = match *self {
            CacheKey::UserProfile(id) => (0u64, id),
            CacheKey::QuizDetail(id) => (1u64, id),
        };
        ((id as u64).wrapping_mul(2).wrapping_add(tag) % EPOCH_STRIPES as u64) as usize
    }
}

const EPOCH_STRIPES: usize = 4096;

/// Invalidation counters, one per stripe of keys. Memory stays fixed no
/// matter how many keys are invalidated; keys sharing a stripe only cause
/// some extra fills to be skipped.
struct Epochs(Box<[AtomicU64]>);

impl Epochs {
    fn new() -> Self {
        Self((0..EPOCH_STRIPES).map(|_| AtomicU64::new(0)).collect())
    }

    fn current(&self, key: CacheKey) -> u64 {
        self.0[key.stripe()].load(Ordering::SeqCst)
    }

    fn bump(&self, key: CacheKey) {
        self.0[key.stripe()].fetch_add(1, Ordering::SeqCst);
    }
}

/// Snapshot of a key's invalidation epoch taken before reading the store.
#[derive(Debug)]
pub struct FillTicket {
    key: CacheKey,
    epoch: u64,
}

/// Typed read-through layer over a [`Cache`] backend.
///
/// Each key maps to a process-local invalidation epoch. A reader takes a
/// [`FillTicket`] before loading from the store and the fill is dropped if
/// the key was invalidated in between, so a slow reader cannot repopulate the
/// cache with a value older than a committed write.
#[derive(Clone)]
pub struct ReadModelCache {
    backend: Arc<dyn Cache>,
    ttl: Duration,
    epochs: Arc<Epochs>,
    monitor: ConsistencyMonitor,
}

impl ReadModelCache {
    pub fn new(backend: Arc<dyn Cache>, ttl: Duration, monitor: ConsistencyMonitor) -> Self {
        Self {
            backend,
            ttl,
            epochs: Arc::new(Epochs::new()),
            monitor,
        }
    }

    /// Look up a cached value. Any backend or decode failure is a miss.
    pub async fn load<T: DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        let key_str = key.to_string();
        match self.backend.get(&key_str).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    tracing::debug!(key = %key_str, "cache hit");
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!(key = %key_str, error = %e, "discarding undecodable cache entry");
                    let _ = self.backend.delete(&key_str).await;
                    None
                }
            },
            Ok(None) => {
                tracing::debug!(key = %key_str, "cache miss");
                None
            }
            Err(e) => {
                self.monitor.record_cache_read_failure();
                tracing::info!(key = %key_str, error = %e, "cache read failed, falling back to store");
                None
            }
        }
    }

    /// Start a read-through fill for `key`.
    pub fn begin_fill(&self, key: CacheKey) -> FillTicket {
        FillTicket {
            key,
            epoch: self.epochs.current(key),
        }
    }

    /// Populate the cache unless the key was invalidated since `ticket` was taken.
    pub async fn fill<T: Serialize>(&self, ticket: FillTicket, value: &T) {
        if self.epochs.current(ticket.key) != ticket.epoch {
            self.monitor.record_fill_skipped();
            tracing::debug!(key = %ticket.key, "skipping fill, key invalidated during load");
            return;
        }

        let key_str = ticket.key.to_string();
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %key_str, error = %e, "failed to encode read model");
                return;
            }
        };
        if let Err(e) = self.backend.set(&key_str, bytes, self.ttl).await {
            tracing::info!(key = %key_str, error = %e, "cache fill failed");
            return;
        }

        // An invalidation that landed between the check above and the write
        // may have deleted before our set; undo the fill in that case.
        if self.epochs.current(ticket.key) != ticket.epoch {
            self.monitor.record_fill_skipped();
            if let Err(e) = self.backend.delete(&key_str).await {
                self.report_drift(&key_str, &e);
            }
        }
    }

    fn report_drift(&self, key: &str, error: &CacheError) {
        self.monitor.record_invalidation_failure();
        tracing::warn!(
            target: "cache_drift",
            key,
            ttl_secs = self.ttl.as_secs(),
            error = %error,
            "cache invalidation failed, stale entry may be served until expiry"
        );
    }

    /// Delete `key` after a committed write. Returns whether the delete reached
    /// the backend; a failure leaves the entry to expire by TTL.
    pub async fn invalidate(&self, key: CacheKey) -> bool {
        self.epochs.bump(key);

        let key_str = key.to_string();
        match self.backend.delete(&key_str).await {
            Ok(()) => {
                tracing::debug!(key = %key_str, "cache invalidated");
                true
            }
            Err(e) => {
                self.report_drift(&key_str, &e);
                false
            }
        }
    }

    /// Invalidate several keys; each is attempted regardless of the others.
    pub async fn invalidate_all(&self, keys: impl IntoIterator<Item = CacheKey>) -> bool {
        let mut all_ok = true;
        for key in keys {
            all_ok &= self.invalidate(key).await;
        }
        all_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer() -> (ReadModelCache, Arc<MemoryCache>, ConsistencyMonitor) {
        let backend = Arc::new(MemoryCache::new());
        let monitor = ConsistencyMonitor::new();
        let cache = ReadModelCache::new(backend.clone(), Duration::from_secs(60), monitor.clone());
        (cache, backend, monitor)
    }

    #[test]
    fn key_format() {
        assert_eq!(CacheKey::UserProfile(3).to_string(), "user:3");
        assert_eq!(CacheKey::QuizDetail(9).to_string(), "quiz:9");
    }

    #[tokio::test]
    async fn fill_then_load() {
        let (cache, _, _) = layer();
        let ticket = cache.begin_fill(CacheKey::QuizDetail(1));
        cache.fill(ticket, &vec![1, 2, 3]).await;
        let hit: Option<Vec<i32>> = cache.load(CacheKey::QuizDetail(1)).await;
        assert_eq!(hit, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn fill_after_invalidation_is_dropped() {
        let (cache, _, monitor) = layer();
        let ticket = cache.begin_fill(CacheKey::QuizDetail(1));
        cache.invalidate(CacheKey::QuizDetail(1)).await;
        cache.fill(ticket, &"stale").await;

        let hit: Option<String> = cache.load(CacheKey::QuizDetail(1)).await;
        assert_eq!(hit, None);
        assert_eq!(monitor.snapshot().cache_fills_skipped, 1);
    }

    #[tokio::test]
    async fn failed_read_is_a_miss() {
        let (cache, backend, monitor) = layer();
        let ticket = cache.begin_fill(CacheKey::UserProfile(1));
        cache.fill(ticket, &5).await;
        backend.set_failing(true);

        let hit: Option<i32> = cache.load(CacheKey::UserProfile(1)).await;
        assert_eq!(hit, None);
        assert_eq!(monitor.snapshot().cache_read_failures, 1);
    }

    #[tokio::test]
    async fn failed_invalidation_is_counted() {
        let (cache, backend, monitor) = layer();
        backend.set_failing(true);
        assert!(!cache.invalidate(CacheKey::UserProfile(1)).await);
        assert_eq!(monitor.snapshot().cache_invalidation_failures, 1);
    }

    /// Backend where an invalidation of `key` lands while `set` is in
    /// flight and every delete fails.
    struct InvalidatedDuringSet {
        inner: MemoryCache,
        epochs: Arc<Epochs>,
        key: CacheKey,
    }

    #[async_trait]
    impl Cache for InvalidatedDuringSet {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
            self.inner.set(key, value, ttl).await?;
            self.epochs.bump(self.key);
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn failed_undo_of_a_raced_fill_is_drift() {
        let key = CacheKey::QuizDetail(7);
        let epochs = Arc::new(Epochs::new());
        let backend = Arc::new(InvalidatedDuringSet {
            inner: MemoryCache::new(),
            epochs: epochs.clone(),
            key,
        });
        let monitor = ConsistencyMonitor::new();
        let mut cache = ReadModelCache::new(backend, Duration::from_secs(60), monitor.clone());
        cache.epochs = epochs;

        let ticket = cache.begin_fill(key);
        cache.fill(ticket, &"pre-commit").await;

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.cache_fills_skipped, 1);
        assert_eq!(snapshot.cache_invalidation_failures, 1);
        assert!(!snapshot.is_clean());
    }

    #[test]
    fn epochs_are_striped_by_key() {
        let epochs = Epochs::new();
        assert_eq!(epochs.0.len(), EPOCH_STRIPES);
        assert_ne!(CacheKey::UserProfile(1).stripe(), CacheKey::QuizDetail(1).stripe());
        for id in [0, 1, i64::MAX, -5] {
            assert!(CacheKey::QuizDetail(id).stripe() < EPOCH_STRIPES);
        }

        epochs.bump(CacheKey::QuizDetail(3));
        assert_eq!(epochs.current(CacheKey::QuizDetail(3)), 1);
        assert_eq!(epochs.current(CacheKey::QuizDetail(4)), 0);
    }

    #[tokio::test]
    async fn undecodable_entry_is_evicted() {
        let (cache, backend, _) = layer();
        backend
            .set("quiz:4", b"not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        let hit: Option<i32> = cache.load(CacheKey::QuizDetail(4)).await;
        assert_eq!(hit, None);
        assert_eq!(backend.get("quiz:4").await.unwrap(), None);
    }
}
