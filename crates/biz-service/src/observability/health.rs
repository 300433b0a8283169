//! Liveness and readiness probes for the biz node.
//!
//! - `GET /health`: 200 whenever the HTTP listener answers
//! - `GET /ready`: 200 once the Biz gRPC listener is serving, 503 before that
//!   and from the start of shutdown onwards
//!
//! Prometheus scrapes `/metrics`, which `main` mounts next to these routes.

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Readiness of the node to accept new signaling streams.
///
/// Readiness starts false, turns true once gRPC is serving and falls back to
/// false for good once draining begins.
#[derive(Debug, Default)]
pub struct HealthState {
    /// The Biz gRPC server is accepting streams.
    serving: AtomicBool,
    /// Shutdown has started; sticky.
    draining: AtomicBool,
}

impl HealthState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the gRPC listener is serving.
    pub fn set_ready(&self) {
        self.serving.store(true, Ordering::SeqCst);
    }

    /// Record that shutdown has started. Later `set_ready` calls do not
    /// make the node ready again.
    pub fn set_not_ready(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.serving.load(Ordering::SeqCst) && !self.draining.load(Ordering::SeqCst)
    }
}

/// Router serving `/health` and `/ready` from `health_state`.
pub fn health_router(health_state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .with_state(health_state)
}

async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

async fn readiness_handler(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    async fn get_status(state: Arc<HealthState>, uri: &str) -> StatusCode {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");
        health_router(state)
            .oneshot(request)
            .await
            .expect("Failed to execute request")
            .status()
    }

    #[test]
    fn test_health_state_transitions() {
        let state = HealthState::new();
        assert!(!state.is_ready(), "Not ready until gRPC is serving");

        state.set_ready();
        assert!(state.is_ready());

        state.set_not_ready();
        assert!(!state.is_ready(), "Not ready once shutdown starts");

        state.set_ready();
        assert!(!state.is_ready(), "Draining is not undone");
    }

    #[tokio::test]
    async fn test_liveness_holds_while_draining() {
        let state = Arc::new(HealthState::new());
        state.set_ready();
        state.set_not_ready();
        assert_eq!(get_status(Arc::clone(&state), "/health").await, StatusCode::OK);
        assert_eq!(
            get_status(state, "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_liveness_endpoint() {
        let state = Arc::new(HealthState::new());
        assert_eq!(get_status(state, "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_endpoint_follows_state() {
        let state = Arc::new(HealthState::new());
        assert_eq!(
            get_status(Arc::clone(&state), "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.set_ready();
        assert_eq!(get_status(Arc::clone(&state), "/ready").await, StatusCode::OK);

        state.set_not_ready();
        assert_eq!(
            get_status(state, "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_unknown_path_returns_404() {
        let state = Arc::new(HealthState::new());
        assert_eq!(get_status(state, "/unknown").await, StatusCode::NOT_FOUND);
    }
}
