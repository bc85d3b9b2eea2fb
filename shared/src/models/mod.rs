//! Data models
//!
//! Shared between quiz-server and its HTTP callers.
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (Postgres BIGSERIAL).

pub mod answer;
pub mod ordering;
pub mod question;
pub mod quiz;
pub mod result;
pub mod search;
pub mod user;

// Re-exports
pub use answer::*;
pub use ordering::*;
pub use question::*;
pub use quiz::*;
pub use result::*;
pub use search::*;
pub use user::*;
