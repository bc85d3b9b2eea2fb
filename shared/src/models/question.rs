//! Question Model

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::answer::Answer;

/// Question entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    /// Position within the quiz (unique per quiz, not necessarily contiguous)
    pub order_id: i32,
    pub title: String,
    /// Image object key; the blob itself lives in external storage
    pub image: Option<String>,
}

/// Create question payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct QuestionCreate {
    #[serde(default)]
    #[validate(length(max = 1024))]
    pub title: String,
    /// Explicit position; `None` appends after the last sibling
    #[validate(range(min = 1))]
    pub order_id: Option<i32>,
}

/// Update question payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct QuestionUpdate {
    #[validate(length(max = 1024))]
    pub title: Option<String>,
}

/// Question with its answers in position order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionWithAnswers {
    #[serde(flatten)]
    pub question: Question,
    pub answers: Vec<Answer>,
}
