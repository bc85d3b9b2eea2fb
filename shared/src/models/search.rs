//! Search index projection

use serde::{Deserialize, Serialize};

use super::quiz::Quiz;

/// Searchable projection of a quiz
///
/// Derived from the authoritative quiz row; may lag behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub question_count: i64,
    pub updated_at: i64,
}

impl IndexDocument {
    pub fn from_quiz(quiz: &Quiz, question_count: i64) -> Self {
        Self {
            id: quiz.id,
            owner_id: quiz.owner_id,
            title: quiz.title.clone(),
            description: quiz.description.clone().unwrap_or_default(),
            tags: quiz.tags.clone(),
            question_count,
            updated_at: quiz.updated_at,
        }
    }
}
