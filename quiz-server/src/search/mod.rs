//! Search index
//!
//! Quiz documents are eventually consistent with the store. Writers never
//! touch the index directly; they enqueue work on [`IndexSync`], which loads
//! the committed quiz and pushes it with retries.

pub mod meili;
pub mod memory;
pub mod sync;

pub use meili::MeiliIndex;
pub use memory::MemoryIndex;
pub use sync::{IndexSync, IndexSyncOptions, RebuildError};

use async_trait::async_trait;
use shared::models::IndexDocument;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("search index unavailable: {0}")]
    Unavailable(String),

    #[error("index task failed: {0}")]
    TaskFailed(String),

    #[error("search worker stopped")]
    WorkerStopped,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Insert or replace the document with the same id.
    async fn upsert(&self, doc: &IndexDocument) -> Result<(), IndexError>;

    /// Remove a document. Removing an absent document succeeds.
    async fn remove(&self, quiz_id: i64) -> Result<(), IndexError>;
}
