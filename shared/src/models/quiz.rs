//! Quiz Model

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::question::QuestionWithAnswers;

/// Quiz entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Quiz {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create quiz payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuizCreate {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 2048))]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Update quiz payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct QuizUpdate {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(max = 2048))]
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Quiz read model: the quiz with its questions and answers in position order
///
/// Cached under `quiz:{id}`; any child mutation or reorder invalidates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuestionWithAnswers>,
}
