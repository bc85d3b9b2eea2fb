//! Error codes, categories and the JSON envelope returned by quiz-server.
//!
//! Batch failures (unknown children, colliding positions) carry the offending
//! ids under `details.ids` so a client can highlight every one of them.
//!
//! ```
//! use shared::error::{ApiResponse, AppError, ErrorCode};
//!
//! let err = AppError::with_message(ErrorCode::ChildrenNotFound, "2 answers not found")
//!     .with_ids(&[7, 9]);
//! assert_eq!(err.ids(), vec![7, 9]);
//!
//! let body = ApiResponse::<()>::error(&err);
//! assert_eq!(body.code, Some(6005));
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
