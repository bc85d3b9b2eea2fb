//! In-process search index

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use shared::models::IndexDocument;

use super::{IndexError, SearchIndex};

#[derive(Debug, Default)]
pub struct MemoryIndex {
    docs: DashMap<i64, IndexDocument>,
    failing: AtomicBool,
    fail_next: AtomicUsize,
    calls: AtomicUsize,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, quiz_id: i64) -> Option<IndexDocument> {
        self.docs.get(&quiz_id).map(|d| d.clone())
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Number of upsert/remove attempts, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make the next `n` calls fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), IndexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("memory index offline".into()));
        }
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(IndexError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn upsert(&self, doc: &IndexDocument) -> Result<(), IndexError> {
        self.check_available()?;
        self.docs.insert(doc.id, doc.clone());
        Ok(())
    }

    async fn remove(&self, quiz_id: i64) -> Result<(), IndexError> {
        self.check_available()?;
        self.docs.remove(&quiz_id);
        Ok(())
    }
}
