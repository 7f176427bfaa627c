//! Eventflow REST API
//!
//! HTTP API layer for Eventflow, built with Axum.
//!
//! # Endpoints
//!
//! ## Events
//! - `POST /api/v1/events` - Validate an event and publish it to the queue
//! - `GET /api/v1/events` - Query stored events
//!   (`type`, `from`, `to`, `interval`, `limit`, `offset`)
//!
//! ## Health
//! - `GET /` - Index with server time
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! Anything else answers `404 {code, message}`.
//!
//! # Example
//!
//! ```rust,ignore
//! use eventflow::api::{serve, ApiConfig, AppState};
//! use eventflow::queue::{Queue, QueueOptions, SqliteBroker};
//! use eventflow::storage::SqliteStore;
//! use std::sync::Arc;
//!
//! let broker = Arc::new(SqliteBroker::open("queue.db")?);
//! let queue = Queue::open("events", broker, QueueOptions::default());
//! let store = Arc::new(SqliteStore::open("events.db")?);
//!
//! let config = ApiConfig::default();
//! serve(AppState::new(queue, store, config.clone()), &config).await?;
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/events",
            get(routes::events::list_events).post(routes::events::create_event),
        )
        .layer(DefaultBodyLimit::max(state.config.max_body_size));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let cors = cors_layer(&state.config.cors_origins);

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .route("/", get(routes::health::index))
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .fallback(routes::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Eventflow API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Eventflow API shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, Params};
    use crate::queue::{MemoryBroker, Queue, QueueOptions};
    use crate::storage::{EventStore, MemoryStore};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    struct TestApp {
        router: Router,
        broker: Arc<MemoryBroker>,
        store: Arc<MemoryStore>,
        queue: Queue,
    }

    fn create_test_app() -> TestApp {
        let broker = Arc::new(MemoryBroker::new());
        let store = Arc::new(MemoryStore::new());
        let queue = Queue::open("events", broker.clone(), QueueOptions::default());

        let state = AppState::new(queue.clone(), store.clone(), ApiConfig::default());
        TestApp {
            router: build_router(state),
            broker,
            store,
            queue,
        }
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response: Response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_events(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/events")
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_event() {
        let app = create_test_app();

        let (status, body) = send(
            app.router,
            post_events(r#"{"event_type": "login", "ts": 1000, "params": {"user": "alice"}}"#),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body,
            json!({
                "status": 201,
                "data": {"event_type": "login", "ts": 1000, "params": {"user": "alice"}}
            })
        );
        assert_eq!(app.queue.stats().await.unwrap().ready, 1);
    }

    #[tokio::test]
    async fn test_create_event_missing_type() {
        let app = create_test_app();

        let (status, body) = send(app.router, post_events(r#"{"ts": 1000}"#)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body, json!({"code": 422, "message": "event has to have a type"}));
        assert_eq!(app.queue.stats().await.unwrap().ready, 0);
    }

    #[tokio::test]
    async fn test_create_event_missing_timestamp() {
        let app = create_test_app();

        let (status, body) = send(app.router, post_events(r#"{"event_type": "login"}"#)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "event has to have a timestamp");
    }

    #[tokio::test]
    async fn test_create_event_invalid_json() {
        let app = create_test_app();

        let (status, body) = send(app.router, post_events("not json")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], 422);
        assert!(!body["message"].as_str().unwrap().is_empty());
        assert_eq!(app.queue.stats().await.unwrap().ready, 0);
    }

    #[tokio::test]
    async fn test_create_event_queue_down() {
        let app = create_test_app();
        app.broker.set_available(false);

        let (status, body) = send(
            app.router,
            post_events(r#"{"event_type": "login", "ts": 1000}"#),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body, json!({"code": 422, "message": "event has not been processed"}));
    }

    #[tokio::test]
    async fn test_list_events() {
        let app = create_test_app();
        for (event_type, ts) in [("login", 300), ("login", 100), ("logout", 150), ("login", 200)] {
            app.store
                .insert(&Event::new(event_type, ts, Params::new()).unwrap())
                .await
                .unwrap();
        }

        let (status, body) = send(app.router, get("/api/v1/events?type=login&from=100&to=250")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], 200);
        let data = body["data"].as_array().unwrap();
        let timestamps: Vec<i64> = data.iter().map(|e| e["ts"].as_i64().unwrap()).collect();
        assert_eq!(timestamps, vec![100, 200]);
        assert_eq!(data[0]["eventType"], "login");
        assert!(data[0]["id"].is_string());
    }

    #[tokio::test]
    async fn test_create_event_null_params() {
        let app = create_test_app();

        let (status, body) = send(
            app.router,
            post_events(r#"{"event_type": "a", "ts": 1, "params": null}"#),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["params"], json!({}));
        assert_eq!(app.queue.stats().await.unwrap().ready, 1);
    }

    #[tokio::test]
    async fn test_list_events_huge_interval() {
        let app = create_test_app();
        app.store
            .insert(&Event::new("login", 1000, Params::new()).unwrap())
            .await
            .unwrap();

        let (status, body) = send(
            app.router,
            get("/api/v1/events?interval=9223372036854775807"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_events_store_down() {
        let app = create_test_app();
        app.store.set_available(false);

        let (status, body) = send(app.router, get("/api/v1/events?limit=abc")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], 422);
    }

    #[tokio::test]
    async fn test_index() {
        let app = create_test_app();

        let (status, body) = send(app.router, get("/")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], 200);
        assert!(body["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_not_found() {
        let app = create_test_app();

        let (status, body) = send(app.router, get("/api/v2/nothing")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"code": 404, "message": "requested resource not found"}));
    }

    #[tokio::test]
    async fn test_health_ready() {
        let app = create_test_app();
        let (status, _) = send(app.router.clone(), get("/health/ready")).await;
        assert_eq!(status, StatusCode::OK);

        app.broker.set_available(false);
        let (status, _) = send(app.router.clone(), get("/health/ready")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = send(app.router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["queue"], "error");
        assert_eq!(body["store"], "ok");
    }

    #[tokio::test]
    async fn test_health_live() {
        let app = create_test_app();
        let (status, _) = send(app.router, get("/health/live")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
