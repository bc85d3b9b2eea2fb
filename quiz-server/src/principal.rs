//! Authenticated requester
//!
//! Authentication itself happens upstream; whatever verifies the caller
//! inserts a [`Principal`] into the request extensions. Services take it as
//! an explicit argument.

use axum::extract::FromRequestParts;
use http::request::Parts;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    user_id: i64,
}

impl Principal {
    pub fn new(user_id: i64) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Whether this principal owns a resource owned by `owner_id`.
    pub fn owns(&self, owner_id: i64) -> bool {
        self.user_id == owner_id
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .copied()
            .ok_or_else(|| AppError::new(ErrorCode::NotAuthenticated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_from_extensions() {
        let req = http::Request::builder()
            .extension(Principal::new(7))
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let principal = Principal::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(principal.user_id(), 7);
        assert!(principal.owns(7));
        assert!(!principal.owns(8));
    }

    #[tokio::test]
    async fn missing_principal_is_unauthenticated() {
        let req = http::Request::builder().body(()).unwrap();
        let (mut parts, _) = req.into_parts();
        let err = Principal::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAuthenticated);
    }
}
