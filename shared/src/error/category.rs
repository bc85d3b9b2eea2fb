//! Coarse grouping of [`ErrorCode`]s, used for logging and client-side handling.

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Authentication errors (1xxx)
    Auth,
    /// Permission errors (2xxx)
    Permission,
    /// Quiz errors (3xxx)
    Quiz,
    /// Question errors (4xxx)
    Question,
    /// Answer errors (5xxx)
    Answer,
    /// Ordering errors (6xxx)
    Ordering,
    /// User errors (7xxx)
    User,
    /// System errors (8xxx and above)
    System,
}

impl ErrorCategory {
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            1000..2000 => Self::Auth,
            2000..3000 => Self::Permission,
            3000..4000 => Self::Quiz,
            4000..5000 => Self::Question,
            5000..6000 => Self::Answer,
            6000..7000 => Self::Ordering,
            7000..8000 => Self::User,
            _ => Self::System,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Auth => "auth",
            Self::Permission => "permission",
            Self::Quiz => "quiz",
            Self::Question => "question",
            Self::Answer => "answer",
            Self::Ordering => "ordering",
            Self::User => "user",
            Self::System => "system",
        }
    }
}

impl ErrorCode {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_map_to_categories() {
        let cases = [
            (6, ErrorCategory::General),
            (1001, ErrorCategory::Auth),
            (2002, ErrorCategory::Permission),
            (3001, ErrorCategory::Quiz),
            (4002, ErrorCategory::Question),
            (5002, ErrorCategory::Answer),
            (6005, ErrorCategory::Ordering),
            (7001, ErrorCategory::User),
            (8500, ErrorCategory::System),
            (9201, ErrorCategory::System),
        ];
        for (code, expected) in cases {
            assert_eq!(ErrorCategory::from_code(code), expected, "code {code}");
        }
    }

    #[test]
    fn codes_know_their_category() {
        assert_eq!(ErrorCode::NotQuizOwner.category(), ErrorCategory::Permission);
        assert_eq!(ErrorCode::ChildrenNotFound.category(), ErrorCategory::Ordering);
        assert_eq!(ErrorCode::CacheUnavailable.category(), ErrorCategory::System);
    }

    #[test]
    fn serialized_form_matches_name() {
        for category in [ErrorCategory::Ordering, ErrorCategory::Question] {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.name()));
        }
    }
}
