//! Quiz Result Model

use serde::{Deserialize, Serialize};

/// Recorded result of one user taking one quiz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct QuizResult {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    pub score: i32,
    pub created_at: i64,
}

/// Per-participant score reported when a live session finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionScore {
    pub user_id: i64,
    pub score: i32,
}
