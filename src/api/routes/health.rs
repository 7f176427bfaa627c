//! Health Routes
//!
//! - GET / - Index, `{status, timestamp}`
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (queue and store reachable)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::api::dto::{HealthResponse, IndexResponse};
use crate::api::state::AppState;

/// GET /
pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        status: StatusCode::OK.as_u16(),
        timestamp: Utc::now().timestamp(),
    })
}

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 when both the queue and the store answer a ping.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    let (queue_ok, store_ok) = check_dependencies(&state).await;
    if queue_ok && store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health
///
/// Full health status with component details and queue depth.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (queue_ok, store_ok) = check_dependencies(&state).await;

    let overall_status = match (queue_ok, store_ok) {
        (true, true) => "healthy",
        (false, false) => "unhealthy",
        _ => "degraded",
    };

    let messages = if queue_ok {
        state.queue().stats().await.ok()
    } else {
        None
    };

    Json(HealthResponse {
        status: overall_status.to_string(),
        queue: component_status(queue_ok),
        store: component_status(store_ok),
        messages,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn check_dependencies(state: &AppState) -> (bool, bool) {
    let queue = state.queue().ping().await;
    if let Err(e) = &queue {
        tracing::warn!(error = %e, "Queue health check failed");
    }

    let store = state.store.ping().await;
    if let Err(e) = &store {
        tracing::warn!(error = %e, "Store health check failed");
    }

    (queue.is_ok(), store.is_ok())
}

fn component_status(ok: bool) -> String {
    let status = if ok { "ok" } else { "error" };
    status.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_index_reports_current_time() {
        let before = Utc::now().timestamp();
        let Json(body) = index().await;
        assert_eq!(body.status, 200);
        assert!(body.timestamp >= before);
    }
}
