//! HTTP status for each error code

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            Self::NotFound
            | Self::QuizNotFound
            | Self::QuestionNotFound
            | Self::QuestionNotInQuiz
            | Self::AnswerNotFound
            | Self::AnswerNotInQuestion
            | Self::ChildrenNotFound
            | Self::UserNotFound => StatusCode::NOT_FOUND,

            Self::PositionConflict
            | Self::AlreadyExists
            | Self::UsernameTaken
            | Self::EmailTaken => StatusCode::CONFLICT,

            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied | Self::NotQuizOwner => StatusCode::FORBIDDEN,

            // Retryable: the backing service may recover.
            Self::TimeoutError | Self::CacheUnavailable | Self::SearchIndexUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            Self::Unknown | Self::InternalError | Self::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            Self::ValidationFailed
            | Self::RequiredField
            | Self::ChangeSetEmpty
            | Self::PositionInvalid
            | Self::DuplicateChild => StatusCode::BAD_REQUEST,
        }
    }
}
