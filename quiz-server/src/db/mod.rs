//! Authoritative store
//!
//! Quizzes own ordered questions, questions own ordered answers. Every
//! operation here is the source of truth that the cache and the search index
//! are derived from. A reorder is applied as one transaction: either every
//! position in the change set is written or none is.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use shared::models::{
    Answer, AnswerCreate, AnswerUpdate, OrderChangeSet, Question, QuestionCreate,
    QuestionUpdate, Quiz, QuizCreate, QuizResult, QuizUpdate, SessionScore, User, UserUpdate,
};
use thiserror::Error;

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(&'static str),

    #[error("Conflict: {1}")]
    Conflict(ConflictKind, String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Uniqueness rule a write would break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Two siblings at the same `order_id`
    Position,
    Username,
    Email,
    Other,
}

impl ConflictKind {
    fn from_constraint(constraint: Option<&str>) -> Self {
        match constraint {
            Some(c) if c.ends_with("_order_key") => ConflictKind::Position,
            Some("users_username_key") => ConflictKind::Username,
            Some("users_email_key") => ConflictKind::Email,
            _ => ConflictKind::Other,
        }
    }
}

/// Entity a violated foreign key points at.
fn referenced_entity(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(c) if c.ends_with("_user_id_fkey") || c.ends_with("_owner_id_fkey") => "user",
        Some(c) if c.ends_with("_quiz_id_fkey") => "quiz",
        Some(c) if c.ends_with("_question_id_fkey") => "question",
        _ => "row",
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row"),
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(
                ConflictKind::from_constraint(db.constraint()),
                db.constraint()
                    .map(|c| format!("unique constraint {c} violated"))
                    .unwrap_or_else(|| db.message().to_string()),
            ),
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                StoreError::NotFound(referenced_entity(db.constraint()))
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Owner of an ordered collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parent {
    /// Questions of a quiz
    Quiz(i64),
    /// Answers of a question
    Question(i64),
}

impl Parent {
    pub fn id(&self) -> i64 {
        match self {
            Parent::Quiz(id) | Parent::Question(id) => *id,
        }
    }

    /// Table holding the children.
    pub(crate) fn child_table(&self) -> &'static str {
        match self {
            Parent::Quiz(_) => "questions",
            Parent::Question(_) => "answers",
        }
    }

    /// Foreign-key column on the child table.
    pub(crate) fn parent_column(&self) -> &'static str {
        match self {
            Parent::Quiz(_) => "quiz_id",
            Parent::Question(_) => "question_id",
        }
    }

    pub fn child_name(&self) -> &'static str {
        match self {
            Parent::Quiz(_) => "question",
            Parent::Question(_) => "answer",
        }
    }
}

/// Rows removed by a cascading delete that derived stores must forget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    /// Quizzes that no longer exist
    pub quiz_ids: Vec<i64>,
    /// Users whose result history lost rows
    pub result_user_ids: Vec<i64>,
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    // ── Users ──

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>>;

    async fn update_user(&self, id: i64, data: &UserUpdate) -> StoreResult<User>;

    /// Delete a user with everything they own.
    async fn delete_user(&self, id: i64) -> StoreResult<CascadeReport>;

    async fn set_user_avatar(&self, id: i64, avatar: Option<&str>) -> StoreResult<User>;

    /// Ids from `ids` with no user row, in ascending order without repeats.
    async fn missing_users(&self, ids: &[i64]) -> StoreResult<Vec<i64>>;

    // ── Quizzes ──

    async fn create_quiz(&self, owner_id: i64, data: &QuizCreate) -> StoreResult<Quiz>;

    async fn get_quiz(&self, id: i64) -> StoreResult<Option<Quiz>>;

    async fn list_quizzes_by_owner(&self, owner_id: i64) -> StoreResult<Vec<Quiz>>;

    async fn list_quiz_ids(&self) -> StoreResult<Vec<i64>>;

    async fn update_quiz(&self, id: i64, data: &QuizUpdate) -> StoreResult<Quiz>;

    /// Delete a quiz together with its questions, answers and results.
    async fn delete_quiz(&self, id: i64) -> StoreResult<CascadeReport>;

    // ── Questions ──

    /// Insert a question. Without an explicit position it lands at
    /// `max(order_id) + 1` within the quiz.
    async fn create_question(&self, quiz_id: i64, data: &QuestionCreate) -> StoreResult<Question>;

    async fn get_question(&self, id: i64) -> StoreResult<Option<Question>>;

    async fn list_questions(&self, quiz_id: i64) -> StoreResult<Vec<Question>>;

    async fn count_questions(&self, quiz_id: i64) -> StoreResult<i64>;

    async fn update_question(&self, id: i64, data: &QuestionUpdate) -> StoreResult<Question>;

    async fn set_question_image(&self, id: i64, image: Option<&str>) -> StoreResult<Question>;

    async fn delete_question(&self, id: i64) -> StoreResult<()>;

    // ── Answers ──

    async fn create_answer(&self, question_id: i64, data: &AnswerCreate) -> StoreResult<Answer>;

    async fn get_answer(&self, id: i64) -> StoreResult<Option<Answer>>;

    /// All answers of every question in a quiz, ordered by question then position.
    async fn list_answers_for_quiz(&self, quiz_id: i64) -> StoreResult<Vec<Answer>>;

    async fn update_answer(&self, id: i64, data: &AnswerUpdate) -> StoreResult<Answer>;

    async fn delete_answer(&self, id: i64) -> StoreResult<()>;

    // ── Ordering ──

    /// Current `(id, order_id)` pairs of a parent's children, ordered by position.
    async fn child_positions(&self, parent: Parent) -> StoreResult<Vec<(i64, i32)>>;

    /// Write every position of `set` in one transaction. Items whose id does
    /// not belong to `parent` are not touched. Fails with `Conflict` if the
    /// result would give two children the same position.
    async fn apply_order_change_set(&self, parent: Parent, set: &OrderChangeSet)
    -> StoreResult<()>;

    // ── Results ──

    /// Insert one result per score in one transaction.
    async fn save_results(&self, quiz_id: i64, scores: &[SessionScore])
    -> StoreResult<Vec<QuizResult>>;

    async fn list_results_by_user(&self, user_id: i64) -> StoreResult<Vec<QuizResult>>;
}
