//! Consistency orchestration
//!
//! Every mutation follows the same sequence: authorize, commit to the store,
//! delete the affected cache keys, then enqueue index work. The sequence runs
//! on its own task so a caller that gives up mid-request cannot leave a
//! committed write with its cache keys still in place.

mod access;
mod answer;
mod error;
mod question;
mod quiz;
mod reorder;
mod user;

pub use answer::AnswerService;
pub use error::{ServiceError, ServiceResult};
pub use question::QuestionService;
pub use quiz::QuizService;
pub use reorder::ReorderCoordinator;
pub use user::UserService;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use shared::error::ErrorCode;
use tokio::task::JoinHandle;

use crate::cache::{Cache, ReadModelCache};
use crate::db::QuizStore;
use crate::monitor::ConsistencyMonitor;
use crate::search::{IndexSync, IndexSyncOptions, SearchIndex};

/// Handles shared by every service.
#[derive(Clone)]
pub(crate) struct ServiceContext {
    pub store: Arc<dyn QuizStore>,
    pub cache: ReadModelCache,
    pub index: IndexSync,
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    pub cache_ttl: Duration,
    pub index: IndexSyncOptions,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(600),
            index: IndexSyncOptions::default(),
        }
    }
}

/// All services over one set of backends.
#[derive(Clone)]
pub struct Services {
    pub quizzes: QuizService,
    pub questions: QuestionService,
    pub answers: AnswerService,
    pub reorder: ReorderCoordinator,
    pub users: UserService,
    pub index: IndexSync,
    pub monitor: ConsistencyMonitor,
}

impl Services {
    /// Wire services over the given backends and start the index worker.
    pub fn new(
        store: Arc<dyn QuizStore>,
        cache: Arc<dyn Cache>,
        index: Arc<dyn SearchIndex>,
        settings: ServiceSettings,
        monitor: ConsistencyMonitor,
    ) -> (Self, JoinHandle<()>) {
        let (index_sync, worker) =
            IndexSync::spawn(store.clone(), index, settings.index, monitor.clone());
        let ctx = ServiceContext {
            store,
            cache: ReadModelCache::new(cache, settings.cache_ttl, monitor.clone()),
            index: index_sync.clone(),
        };

        let services = Self {
            quizzes: QuizService::new(ctx.clone()),
            questions: QuestionService::new(ctx.clone()),
            answers: AnswerService::new(ctx.clone()),
            reorder: ReorderCoordinator::new(ctx.clone()),
            users: UserService::new(ctx),
            index: index_sync,
            monitor,
        };
        (services, worker)
    }
}

/// Run a mutation to completion on its own task.
async fn run_detached<T, F>(op: &'static str, fut: F) -> ServiceResult<T>
where
    F: Future<Output = ServiceResult<T>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(fut).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(op, error = %e, "mutation task aborted");
            Err(ServiceError::dependency(
                ErrorCode::InternalError,
                format!("{op} did not complete"),
            ))
        }
    }
}
