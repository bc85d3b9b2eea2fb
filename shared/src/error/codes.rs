//! Numeric error codes shared by every quiz-server response.
//!
//! The thousands digit selects the category (see [`super::ErrorCategory`]):
//! 0 general, 1 auth, 2 permission, 3 quiz, 4 question, 5 answer,
//! 6 ordering, 7 user, 9 system.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code carried in `ApiResponse::code`. Serialized as a bare `u16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// A unique value is already in use
    AlreadyExists = 4,
    /// Required field missing
    RequiredField = 6,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Requester does not own the quiz chain
    NotQuizOwner = 2002,

    // ==================== 3xxx: Quiz ====================
    /// Quiz not found
    QuizNotFound = 3001,

    // ==================== 4xxx: Question ====================
    /// Question not found
    QuestionNotFound = 4001,
    /// Question does not belong to the quiz
    QuestionNotInQuiz = 4002,

    // ==================== 5xxx: Answer ====================
    /// Answer not found
    AnswerNotFound = 5001,
    /// Answer does not belong to the question
    AnswerNotInQuestion = 5002,

    // ==================== 6xxx: Ordering ====================
    /// Change set has no entries
    ChangeSetEmpty = 6001,
    /// Position must be positive
    PositionInvalid = 6002,
    /// Two siblings would share a position
    PositionConflict = 6003,
    /// The same child appears twice in one change set
    DuplicateChild = 6004,
    /// One or more children do not exist under the parent
    ChildrenNotFound = 6005,

    // ==================== 7xxx: User ====================
    /// User not found
    UserNotFound = 7001,
    /// Another account already uses the username
    UsernameTaken = 7002,
    /// Another account already uses the email address
    EmailTaken = 7003,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Timeout error
    TimeoutError = 9004,
    /// Cache backend unavailable
    CacheUnavailable = 9101,
    /// Search index unavailable
    SearchIndexUnavailable = 9201,
}

impl ErrorCode {
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Default message, used when a caller gives no more specific one.
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Value is already in use",
            ErrorCode::RequiredField => "Required field is missing",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::NotQuizOwner => "Only the quiz owner can modify it",

            // Quiz
            ErrorCode::QuizNotFound => "Quiz not found",

            // Question
            ErrorCode::QuestionNotFound => "Question not found",
            ErrorCode::QuestionNotInQuiz => "Question does not belong to this quiz",

            // Answer
            ErrorCode::AnswerNotFound => "Answer not found",
            ErrorCode::AnswerNotInQuestion => "Answer does not belong to this question",

            // Ordering
            ErrorCode::ChangeSetEmpty => "Order change set is empty",
            ErrorCode::PositionInvalid => "Position must be a positive integer",
            ErrorCode::PositionConflict => "Two siblings would share the same position",
            ErrorCode::DuplicateChild => "The same item appears more than once in the change set",
            ErrorCode::ChildrenNotFound => "Some items do not exist under this parent",

            // User
            ErrorCode::UserNotFound => "User not found",
            ErrorCode::UsernameTaken => "Username is already taken",
            ErrorCode::EmailTaken => "Email is already registered",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::CacheUnavailable => "Cache is unavailable",
            ErrorCode::SearchIndexUnavailable => "Search index is unavailable",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid error code: {0}")]
pub struct InvalidErrorCode(pub u16);

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        let code = match raw {
            // General
            0 => ErrorCode::Success,
            1 => ErrorCode::Unknown,
            2 => ErrorCode::ValidationFailed,
            3 => ErrorCode::NotFound,
            4 => ErrorCode::AlreadyExists,
            6 => ErrorCode::RequiredField,

            // Auth
            1001 => ErrorCode::NotAuthenticated,

            // Permission
            2001 => ErrorCode::PermissionDenied,
            2002 => ErrorCode::NotQuizOwner,

            // Quiz
            3001 => ErrorCode::QuizNotFound,

            // Question
            4001 => ErrorCode::QuestionNotFound,
            4002 => ErrorCode::QuestionNotInQuiz,

            // Answer
            5001 => ErrorCode::AnswerNotFound,
            5002 => ErrorCode::AnswerNotInQuestion,

            // Ordering
            6001 => ErrorCode::ChangeSetEmpty,
            6002 => ErrorCode::PositionInvalid,
            6003 => ErrorCode::PositionConflict,
            6004 => ErrorCode::DuplicateChild,
            6005 => ErrorCode::ChildrenNotFound,

            // User
            7001 => ErrorCode::UserNotFound,
            7002 => ErrorCode::UsernameTaken,
            7003 => ErrorCode::EmailTaken,

            // System
            9001 => ErrorCode::InternalError,
            9002 => ErrorCode::DatabaseError,
            9004 => ErrorCode::TimeoutError,
            9101 => ErrorCode::CacheUnavailable,
            9201 => ErrorCode::SearchIndexUnavailable,

            _ => return Err(InvalidErrorCode(raw)),
        };
        Ok(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values_follow_category_ranges() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::NotFound.code(), 3);
        assert_eq!(ErrorCode::NotQuizOwner.code(), 2002);
        assert_eq!(ErrorCode::QuizNotFound.code(), 3001);
        assert_eq!(ErrorCode::QuestionNotFound.code(), 4001);
        assert_eq!(ErrorCode::AnswerNotInQuestion.code(), 5002);
        assert_eq!(ErrorCode::PositionConflict.code(), 6003);
        assert_eq!(ErrorCode::ChildrenNotFound.code(), 6005);
        assert_eq!(ErrorCode::DatabaseError.code(), 9002);
        assert_eq!(ErrorCode::CacheUnavailable.code(), 9101);
    }

    #[test]
    fn only_success_is_success() {
        assert!(ErrorCode::Success.is_success());
        assert!(!ErrorCode::Unknown.is_success());
        assert!(!ErrorCode::QuizNotFound.is_success());
    }

    #[test]
    fn known_codes_convert_back() {
        assert_eq!(ErrorCode::try_from(0), Ok(ErrorCode::Success));
        assert_eq!(ErrorCode::try_from(2002), Ok(ErrorCode::NotQuizOwner));
        assert_eq!(ErrorCode::try_from(6004), Ok(ErrorCode::DuplicateChild));
        assert_eq!(ErrorCode::try_from(9201), Ok(ErrorCode::SearchIndexUnavailable));
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert_eq!(ErrorCode::try_from(9003), Err(InvalidErrorCode(9003)));
        assert_eq!(ErrorCode::try_from(8001), Err(InvalidErrorCode(8001)));
    }

    #[test]
    fn serializes_as_number() {
        let json = serde_json::to_string(&ErrorCode::PositionConflict).unwrap();
        assert_eq!(json, "6003");
    }

    #[test]
    fn deserializes_from_number() {
        let parsed: ErrorCode = serde_json::from_str("4001").unwrap();
        assert_eq!(parsed, ErrorCode::QuestionNotFound);
    }

    #[test]
    fn out_of_table_number_fails_to_deserialize() {
        assert!(serde_json::from_str::<ErrorCode>("12345").is_err());
    }

    #[test]
    fn display_is_the_number() {
        assert_eq!(ErrorCode::QuizNotFound.to_string(), "3001");
        assert_eq!(InvalidErrorCode(42).to_string(), "invalid error code: 42");
    }
}
