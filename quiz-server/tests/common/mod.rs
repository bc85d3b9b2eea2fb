#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use quiz_server::Principal;
use quiz_server::cache::MemoryCache;
use quiz_server::db::MemoryStore;
use quiz_server::monitor::ConsistencyMonitor;
use quiz_server::search::{IndexSyncOptions, MemoryIndex};
use quiz_server::services::{ServiceSettings, Services};
use shared::models::{AnswerCreate, QuestionCreate, QuizCreate};

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub index: Arc<MemoryIndex>,
    pub monitor: ConsistencyMonitor,
    pub services: Services,
    pub owner: Principal,
    pub other: Principal,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let index = Arc::new(MemoryIndex::new());
        let monitor = ConsistencyMonitor::new();
        let settings = ServiceSettings {
            cache_ttl: Duration::from_secs(600),
            index: IndexSyncOptions {
                max_attempts: 3,
                retry_backoff: Duration::from_millis(1),
                queue_capacity: 256,
            },
        };
        let (services, _) = Services::new(
            store.clone(),
            cache.clone(),
            index.clone(),
            settings,
            monitor.clone(),
        );
        let owner = store.insert_user("author", "author@example.com");
        let other = store.insert_user("player", "player@example.com");
        Self {
            store,
            cache,
            index,
            monitor,
            services,
            owner: Principal::new(owner.id),
            other: Principal::new(other.id),
        }
    }

    /// A quiz owned by `owner` with `n` questions at positions 1..=n.
    pub async fn quiz_with_questions(&self, n: usize) -> (i64, Vec<i64>) {
        let quiz = self
            .services
            .quizzes
            .create(
                self.owner,
                QuizCreate {
                    title: "World capitals".into(),
                    description: Some("Geography basics".into()),
                    tags: vec!["geography".into()],
                },
            )
            .await
            .unwrap();
        let mut ids = Vec::with_capacity(n);
        for i in 0..n {
            let q = self
                .services
                .questions
                .create(
                    self.owner,
                    quiz.id,
                    QuestionCreate {
                        title: format!("Question {}", i + 1),
                        order_id: None,
                    },
                )
                .await
                .unwrap();
            ids.push(q.id);
        }
        (quiz.id, ids)
    }

    /// `n` answers under a question at positions 1..=n.
    pub async fn answers(&self, quiz_id: i64, question_id: i64, n: usize) -> Vec<i64> {
        let mut ids = Vec::with_capacity(n);
        for i in 0..n {
            let a = self
                .services
                .answers
                .create(
                    self.owner,
                    quiz_id,
                    question_id,
                    AnswerCreate {
                        text: format!("Answer {}", i + 1),
                        is_correct: i == 0,
                        order_id: None,
                    },
                )
                .await
                .unwrap();
            ids.push(a.id);
        }
        ids
    }

    /// Question ids of a quiz in read-back order, bypassing the cache.
    pub async fn question_order(&self, quiz_id: i64) -> Vec<(i64, i32)> {
        use quiz_server::db::{Parent, QuizStore};
        self.store
            .child_positions(Parent::Quiz(quiz_id))
            .await
            .unwrap()
    }

    pub async fn answer_order(&self, question_id: i64) -> Vec<(i64, i32)> {
        use quiz_server::db::{Parent, QuizStore};
        self.store
            .child_positions(Parent::Question(question_id))
            .await
            .unwrap()
    }
}
