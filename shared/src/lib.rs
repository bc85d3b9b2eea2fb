//! Shared types for quizmaster
//!
//! Domain models, ordering primitives and the unified error system used by
//! the server and by any HTTP caller sitting in front of it.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
