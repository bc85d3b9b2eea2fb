//! Service error taxonomy

use shared::error::{AppError, ErrorCode};
use shared::models::ChangeSetError;
use thiserror::Error;

use crate::db::{ConflictKind, StoreError};

/// Outcome classes callers can act on. The store, cache and index errors
/// underneath are folded into these.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Some referenced entity does not exist (or is not under the given parent).
    #[error("{message}")]
    NotFound {
        code: ErrorCode,
        message: String,
        ids: Vec<i64>,
    },

    #[error("{message}")]
    Forbidden { code: ErrorCode, message: String },

    /// A uniqueness rule would break: two children at one position, or a
    /// taken username or email.
    #[error("{message}")]
    Conflict {
        code: ErrorCode,
        message: String,
        positions: Vec<i32>,
    },

    #[error("{message}")]
    Validation {
        code: ErrorCode,
        message: String,
        ids: Vec<i64>,
    },

    /// The authoritative store (or the runtime) failed.
    #[error("{message}")]
    Dependency { code: ErrorCode, message: String },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(code: ErrorCode, ids: Vec<i64>) -> Self {
        let message = if ids.len() > 1 {
            format!("{}: {ids:?}", code.message())
        } else {
            code.message().to_string()
        };
        Self::NotFound { code, message, ids }
    }

    pub fn forbidden(code: ErrorCode) -> Self {
        Self::Forbidden {
            code,
            message: code.message().to_string(),
        }
    }

    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
            ids: Vec::new(),
        }
    }

    pub fn dependency(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Dependency {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::NotFound { code, .. }
            | ServiceError::Forbidden { code, .. }
            | ServiceError::Conflict { code, .. }
            | ServiceError::Validation { code, .. }
            | ServiceError::Dependency { code, .. } => *code,
        }
    }

    /// Offending ids for `NotFound` and `Validation`.
    pub fn ids(&self) -> &[i64] {
        match self {
            ServiceError::NotFound { ids, .. } | ServiceError::Validation { ids, .. } => ids,
            _ => &[],
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => {
                let code = match what {
                    "quiz" => ErrorCode::QuizNotFound,
                    "question" => ErrorCode::QuestionNotFound,
                    "answer" => ErrorCode::AnswerNotFound,
                    "user" => ErrorCode::UserNotFound,
                    _ => ErrorCode::NotFound,
                };
                ServiceError::not_found(code, Vec::new())
            }
            StoreError::Conflict(kind, message) => ServiceError::Conflict {
                code: match kind {
                    ConflictKind::Position => ErrorCode::PositionConflict,
                    ConflictKind::Username => ErrorCode::UsernameTaken,
                    ConflictKind::Email => ErrorCode::EmailTaken,
                    ConflictKind::Other => ErrorCode::AlreadyExists,
                },
                message,
                positions: Vec::new(),
            },
            StoreError::Database(message) => {
                tracing::error!(error = %message, "store operation failed");
                ServiceError::dependency(ErrorCode::DatabaseError, message)
            }
        }
    }
}

impl From<ChangeSetError> for ServiceError {
    fn from(err: ChangeSetError) -> Self {
        let message = err.to_string();
        match err {
            ChangeSetError::Empty => ServiceError::validation(ErrorCode::ChangeSetEmpty, message),
            ChangeSetError::NonPositive(ids) => ServiceError::Validation {
                code: ErrorCode::PositionInvalid,
                message,
                ids,
            },
            ChangeSetError::DuplicateChild(ids) => ServiceError::Validation {
                code: ErrorCode::DuplicateChild,
                message,
                ids,
            },
            ChangeSetError::DuplicatePosition(positions) => ServiceError::Conflict {
                code: ErrorCode::PositionConflict,
                message,
                positions,
            },
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::validation(ErrorCode::ValidationFailed, err.to_string())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound { code, message, ids }
            | ServiceError::Validation { code, message, ids } => {
                let app = AppError::with_message(code, message);
                if ids.is_empty() { app } else { app.with_ids(&ids) }
            }
            ServiceError::Forbidden { code, message } => AppError::with_message(code, message),
            ServiceError::Conflict {
                code,
                message,
                positions,
            } => {
                let app = AppError::with_message(code, message);
                if positions.is_empty() {
                    app
                } else {
                    app.with_detail("positions", positions)
                }
            }
            ServiceError::Dependency { code, message } => AppError::with_message(code, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_lists_every_id() {
        let err = ServiceError::not_found(ErrorCode::ChildrenNotFound, vec![4, 9]);
        assert_eq!(err.ids(), &[4, 9]);
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::ChildrenNotFound);
        assert_eq!(app.ids(), vec![4, 9]);
    }

    #[test]
    fn duplicate_position_is_conflict() {
        let err: ServiceError = ChangeSetError::DuplicatePosition(vec![2]).into();
        assert!(matches!(err, ServiceError::Conflict { .. }));
        assert_eq!(err.code(), ErrorCode::PositionConflict);
    }

    #[test]
    fn account_clashes_keep_their_own_code() {
        let err: ServiceError =
            StoreError::Conflict(ConflictKind::Username, "username ada taken".into()).into();
        assert_eq!(err.code(), ErrorCode::UsernameTaken);
        let app = AppError::from(err);
        assert_eq!(app.code, ErrorCode::UsernameTaken);
        assert_eq!(app.http_status(), http::StatusCode::CONFLICT);

        let err: ServiceError =
            StoreError::Conflict(ConflictKind::Email, "email taken".into()).into();
        assert_eq!(err.code(), ErrorCode::EmailTaken);
    }

    #[test]
    fn empty_change_set_is_validation() {
        let err: ServiceError = ChangeSetError::Empty.into();
        assert_eq!(err.code(), ErrorCode::ChangeSetEmpty);
    }

    #[test]
    fn store_errors_map_to_kinds() {
        let err: ServiceError = StoreError::NotFound("question").into();
        assert_eq!(err.code(), ErrorCode::QuestionNotFound);

        let err: ServiceError =
            StoreError::Conflict(ConflictKind::Position, "order key".into()).into();
        assert_eq!(err.code(), ErrorCode::PositionConflict);

        let err: ServiceError = StoreError::NotFound("user").into();
        assert_eq!(err.code(), ErrorCode::UserNotFound);

        let err: ServiceError = StoreError::Database("down".into()).into();
        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert_eq!(AppError::from(err).http_status(), http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
