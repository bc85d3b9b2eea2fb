//! Index synchronization worker
//!
//! A single task drains a bounded queue in FIFO order. Upserts re-read the
//! quiz from the store when they run, so a document always reflects the
//! latest committed state and an upsert for a deleted quiz turns into a
//! removal. Failed tasks are retried with linear backoff; a task that
//! exhausts its attempts is logged and counted, never surfaced to the writer.

use std::sync::Arc;
use std::time::Duration;

use shared::models::IndexDocument;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{IndexError, SearchIndex};
use crate::db::{QuizStore, StoreError};
use crate::monitor::ConsistencyMonitor;

#[derive(Debug, Error)]
pub enum RebuildError {
    #[error("listing quizzes failed: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Clone, Copy)]
pub struct IndexSyncOptions {
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub queue_capacity: usize,
}

impl Default for IndexSyncOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(200),
            queue_capacity: 1024,
        }
    }
}

#[derive(Debug)]
enum IndexTask {
    Upsert(i64),
    Remove(i64),
    Flush(oneshot::Sender<()>),
}

/// Handle for enqueueing index work. Cheap to clone.
#[derive(Clone)]
pub struct IndexSync {
    tx: mpsc::Sender<IndexTask>,
    monitor: ConsistencyMonitor,
}

impl IndexSync {
    /// Start the worker. It stops once every handle has been dropped.
    pub fn spawn(
        store: Arc<dyn QuizStore>,
        index: Arc<dyn SearchIndex>,
        options: IndexSyncOptions,
        monitor: ConsistencyMonitor,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(options.queue_capacity.max(1));
        let worker = Worker {
            store,
            index,
            options,
            monitor: monitor.clone(),
        };
        let handle = tokio::spawn(worker.run(rx));
        (Self { tx, monitor }, handle)
    }

    /// Schedule the quiz's document to be brought up to date.
    pub fn upsert(&self, quiz_id: i64) {
        self.enqueue(IndexTask::Upsert(quiz_id));
    }

    /// Schedule the quiz's document for removal.
    pub fn remove(&self, quiz_id: i64) {
        self.enqueue(IndexTask::Remove(quiz_id));
    }

    fn enqueue(&self, task: IndexTask) {
        match self.tx.try_send(task) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(task)) => {
                // Writers never wait on the index; park the send on its own task.
                tracing::debug!(?task, "index queue full, deferring enqueue");
                let tx = self.tx.clone();
                let monitor = self.monitor.clone();
                tokio::spawn(async move {
                    if let Err(e) = tx.send(task).await {
                        monitor.record_index_dropped();
                        tracing::error!(task = ?e.0, "search worker stopped, index task dropped");
                    }
                });
            }
            Err(mpsc::error::TrySendError::Closed(task)) => {
                self.monitor.record_index_dropped();
                tracing::error!(?task, "search worker stopped, index task dropped");
            }
        }
    }

    /// Wait until every task enqueued before this call has been processed.
    pub async fn flush(&self) -> Result<(), IndexError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(IndexTask::Flush(done_tx))
            .await
            .map_err(|_| IndexError::WorkerStopped)?;
        done_rx.await.map_err(|_| IndexError::WorkerStopped)
    }

    /// Enqueue an upsert for every quiz in the store. Returns how many were queued.
    pub async fn rebuild_all(&self, store: &dyn QuizStore) -> Result<usize, RebuildError> {
        let ids = store.list_quiz_ids().await?;
        tracing::info!(count = ids.len(), "rebuilding search index");
        for id in &ids {
            self.tx
                .send(IndexTask::Upsert(*id))
                .await
                .map_err(|_| IndexError::WorkerStopped)?;
        }
        Ok(ids.len())
    }
}

struct Worker {
    store: Arc<dyn QuizStore>,
    index: Arc<dyn SearchIndex>,
    options: IndexSyncOptions,
    monitor: ConsistencyMonitor,
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Upsert(i64),
    Remove(i64),
}

impl Op {
    fn quiz_id(&self) -> i64 {
        match self {
            Op::Upsert(id) | Op::Remove(id) => *id,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Op::Upsert(_) => "upsert",
            Op::Remove(_) => "remove",
        }
    }
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<IndexTask>) {
        tracing::info!("search index worker started");
        while let Some(task) = rx.recv().await {
            match task {
                IndexTask::Upsert(id) => self.process(Op::Upsert(id)).await,
                IndexTask::Remove(id) => self.process(Op::Remove(id)).await,
                IndexTask::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        tracing::info!("search index worker stopped");
    }

    async fn process(&self, op: Op) {
        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = match op {
                Op::Upsert(id) => self.push_quiz(id).await,
                Op::Remove(id) => self.index.remove(id).await,
            };
            match result {
                Ok(()) => {
                    tracing::debug!(quiz_id = op.quiz_id(), op = op.name(), attempt, "index synced");
                    return;
                }
                Err(e) if attempt < max_attempts => {
                    self.monitor.record_index_retry();
                    tracing::warn!(
                        quiz_id = op.quiz_id(),
                        op = op.name(),
                        attempt,
                        error = %e,
                        "index task failed, retrying"
                    );
                    tokio::time::sleep(self.options.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.monitor.record_index_miss();
                    tracing::error!(
                        quiz_id = op.quiz_id(),
                        op = op.name(),
                        attempts = attempt,
                        error = %e,
                        "index task abandoned, document may be stale"
                    );
                    return;
                }
            }
        }
    }

    /// Index the committed quiz, or drop its document if the quiz is gone.
    async fn push_quiz(&self, quiz_id: i64) -> Result<(), IndexError> {
        let quiz = self
            .store
            .get_quiz(quiz_id)
            .await
            .map_err(|e| IndexError::Unavailable(format!("store read failed: {e}")))?;
        match quiz {
            Some(quiz) => {
                let count = self
                    .store
                    .count_questions(quiz_id)
                    .await
                    .map_err(|e| IndexError::Unavailable(format!("store read failed: {e}")))?;
                self.index
                    .upsert(&IndexDocument::from_quiz(&quiz, count))
                    .await
            }
            None => self.index.remove(quiz_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::search::MemoryIndex;
    use shared::models::QuizCreate;

    fn options(max_attempts: u32) -> IndexSyncOptions {
        IndexSyncOptions {
            max_attempts,
            retry_backoff: Duration::from_millis(1),
            queue_capacity: 16,
        }
    }

    async fn setup(
        max_attempts: u32,
    ) -> (Arc<MemoryStore>, Arc<MemoryIndex>, IndexSync, ConsistencyMonitor, i64) {
        let store = Arc::new(MemoryStore::new());
        let owner = store.insert_user("owner", "owner@example.com");
        let quiz = store
            .create_quiz(
                owner.id,
                &QuizCreate {
                    title: "Rivers".into(),
                    description: Some("Long ones".into()),
                    tags: vec!["geo".into()],
                },
            )
            .await
            .unwrap();
        let index = Arc::new(MemoryIndex::new());
        let monitor = ConsistencyMonitor::new();
        let (sync, _) = IndexSync::spawn(
            store.clone(),
            index.clone(),
            options(max_attempts),
            monitor.clone(),
        );
        (store, index, sync, monitor, quiz.id)
    }

    #[tokio::test]
    async fn upsert_indexes_committed_quiz() {
        let (_, index, sync, _, quiz_id) = setup(3).await;
        sync.upsert(quiz_id);
        sync.flush().await.unwrap();

        let doc = index.get(quiz_id).unwrap();
        assert_eq!(doc.title, "Rivers");
        assert_eq!(doc.description, "Long ones");
        assert_eq!(doc.question_count, 0);
    }

    #[tokio::test]
    async fn upsert_of_deleted_quiz_removes_document() {
        let (store, index, sync, _, quiz_id) = setup(3).await;
        sync.upsert(quiz_id);
        sync.flush().await.unwrap();
        assert!(index.get(quiz_id).is_some());

        store.delete_quiz(quiz_id).await.unwrap();
        sync.upsert(quiz_id);
        sync.flush().await.unwrap();
        assert!(index.get(quiz_id).is_none());
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let (_, index, sync, monitor, quiz_id) = setup(3).await;
        index.fail_next(2);
        sync.upsert(quiz_id);
        sync.flush().await.unwrap();

        assert!(index.get(quiz_id).is_some());
        assert_eq!(index.calls(), 3);
        let snap = monitor.snapshot();
        assert_eq!(snap.index_retries, 2);
        assert_eq!(snap.index_permanent_misses, 0);
    }

    #[tokio::test]
    async fn exhausted_task_is_counted_as_miss() {
        let (_, index, sync, monitor, quiz_id) = setup(2).await;
        index.set_failing(true);
        sync.upsert(quiz_id);
        sync.flush().await.unwrap();

        assert_eq!(index.calls(), 2);
        assert_eq!(monitor.snapshot().index_permanent_misses, 1);

        // Later tasks still run.
        index.set_failing(false);
        sync.upsert(quiz_id);
        sync.flush().await.unwrap();
        assert!(index.get(quiz_id).is_some());
    }

    #[tokio::test]
    async fn rebuild_all_queues_every_quiz() {
        let (store, index, sync, _, _) = setup(3).await;
        let queued = sync.rebuild_all(store.as_ref()).await.unwrap();
        sync.flush().await.unwrap();
        assert_eq!(queued, 1);
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn rebuild_reports_which_side_failed() {
        let (store, index, _, monitor, _) = setup(3).await;

        store.fail_next(1);
        let (sync, worker) = IndexSync::spawn(store.clone(), index, options(3), monitor);
        let err = sync.rebuild_all(store.as_ref()).await.unwrap_err();
        assert!(matches!(err, RebuildError::Store(StoreError::Database(_))));

        worker.abort();
        let _ = worker.await;
        let err = sync.rebuild_all(store.as_ref()).await.unwrap_err();
        assert!(matches!(err, RebuildError::Index(IndexError::WorkerStopped)));
    }
}
