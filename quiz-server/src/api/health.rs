//! Health check endpoint

use axum::Json;
use axum::extract::State;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let consistency = state.monitor.snapshot();
    Json(serde_json::json!({
        "status": if consistency.is_clean() { "ok" } else { "degraded" },
        "service": "quiz-server",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.environment,
        "consistency": consistency,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::api::router;
    use crate::cache::MemoryCache;
    use crate::db::MemoryStore;
    use crate::search::MemoryIndex;
    use crate::services::{ServiceSettings, Services};
    use crate::state::AppState;

    async fn get_health(state: AppState) -> serde_json::Value {
        let response = router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn state() -> AppState {
        let (services, _) = Services::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryIndex::new()),
            ServiceSettings::default(),
            Default::default(),
        );
        AppState::from_services(services, "test")
    }

    #[tokio::test]
    async fn reports_ok_when_clean() {
        let body = get_health(state()).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "quiz-server");
        assert_eq!(body["consistency"]["cache_invalidation_failures"], 0);
    }

    #[tokio::test]
    async fn reports_degraded_after_drift() {
        let state = state();
        state.monitor.record_invalidation_failure();
        let body = get_health(state).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["consistency"]["cache_invalidation_failures"], 1);
    }
}
