//! Answer Model

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Answer entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Answer {
    pub id: i64,
    pub question_id: i64,
    /// Position within the question (unique per question)
    pub order_id: i32,
    pub text: String,
    pub is_correct: bool,
}

/// Create answer payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AnswerCreate {
    #[serde(default)]
    #[validate(length(max = 1024))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
    /// Explicit position; `None` appends after the last sibling
    #[validate(range(min = 1))]
    pub order_id: Option<i32>,
}

/// Update answer payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AnswerUpdate {
    #[validate(length(max = 1024))]
    pub text: Option<String>,
    pub is_correct: Option<bool>,
}
