//! User Model

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::quiz::Quiz;
use super::result::QuizResult;

/// User entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub created_at: i64,
}

/// Update user payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(length(min = 3, max = 64))]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

/// User profile read model, cached under `user:{id}`
///
/// Embeds the user's quizzes and results, so quiz create/delete and result
/// writes must invalidate it as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub quizzes: Vec<Quiz>,
    pub results: Vec<QuizResult>,
}
