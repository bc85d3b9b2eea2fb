//! Error value and response envelope seen by HTTP callers

use std::collections::HashMap;

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::category::ErrorCategory;
use super::codes::ErrorCode;

/// Coded error with a message and optional structured context.
///
/// Batch failures put the offending entity ids under `details.ids`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<HashMap<String, Value>>,
}

impl AppError {
    /// Error carrying the code's default message.
    pub fn new(code: ErrorCode) -> Self {
        Self::with_message(code, code.message())
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Attach the ids a batch operation failed on.
    pub fn with_ids(self, ids: &[i64]) -> Self {
        self.with_detail("ids", ids.to_vec())
    }

    /// Ids recorded by [`AppError::with_ids`], empty if none.
    pub fn ids(&self) -> Vec<i64> {
        self.details
            .as_ref()
            .and_then(|d| d.get("ids"))
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default()
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }
}

/// Response envelope: `code` 0 with `data` on success, error code with
/// `message` and `details` otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Value>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: Some(ErrorCode::Success.code()),
            message: "OK".to_string(),
            data: Some(data),
            details: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(err: &AppError) -> Self {
        Self {
            code: Some(err.code.code()),
            message: err.message.clone(),
            data: None,
            details: err.details.clone(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.code.category() == ErrorCategory::System {
            tracing::error!(code = %self.code, message = %self.message, "dependency failure");
        }
        (self.http_status(), Json(ApiResponse::<()>::error(&self))).into_response()
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = match self.code {
            None | Some(0) => StatusCode::OK,
            Some(code) => ErrorCode::try_from(code)
                .map(|c| c.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        };
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_message_comes_from_code() {
        let err = AppError::new(ErrorCode::QuizNotFound);
        assert_eq!(err.message, ErrorCode::QuizNotFound.message());
        assert!(err.details.is_none());
        assert!(err.ids().is_empty());
    }

    #[test]
    fn ids_round_trip_through_details() {
        let err = AppError::with_message(ErrorCode::ChildrenNotFound, "missing").with_ids(&[3, 8]);
        assert_eq!(err.ids(), vec![3, 8]);
        assert_eq!(err.details.unwrap()["ids"], serde_json::json!([3, 8]));
    }

    #[test]
    fn status_follows_code() {
        assert_eq!(
            AppError::new(ErrorCode::NotQuizOwner).http_status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::new(ErrorCode::PositionConflict).http_status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn error_envelope_omits_data() {
        let response = ApiResponse::<()>::error(&AppError::new(ErrorCode::ChangeSetEmpty));
        assert_eq!(response.code, Some(6001));
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("data").is_none());
    }

    #[test]
    fn success_envelope() {
        let json = serde_json::to_string(&ApiResponse::success("hello")).unwrap();
        assert!(json.contains("\"code\":0"));
        assert!(json.contains("\"data\":\"hello\""));
        assert!(!json.contains("details"));
    }

    #[tokio::test]
    async fn system_errors_respond_with_their_status() {
        let response = AppError::new(ErrorCode::CacheUnavailable).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
