//! End-to-end pipeline tests: HTTP ingestion → queue → consumer pool → store → HTTP retrieval

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use eventflow::{
    build_router, ApiConfig, AppState, ConsumerPool, EventStore, EventWriter, EventsQuery,
    MemoryBroker, MemoryStore, PoolConfig, Queue, QueueOptions, QueueStats, SqliteBroker,
    SqliteStore,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tower::util::ServiceExt;

struct Pipeline {
    router: Router,
    queue: Queue,
    store: Arc<MemoryStore>,
    pool: ConsumerPool,
}

fn fast_pool() -> PoolConfig {
    PoolConfig {
        consumers: 2,
        unacked_limit: 10,
        poll_interval: Duration::from_millis(5),
    }
}

fn memory_pipeline(options: QueueOptions) -> Pipeline {
    let queue = Queue::open("events", Arc::new(MemoryBroker::new()), options);
    let store = Arc::new(MemoryStore::new());

    let pool = ConsumerPool::new(queue.clone(), EventWriter::new(store.clone()), fast_pool());
    let router = build_router(AppState::new(queue.clone(), store.clone(), ApiConfig::default()));

    Pipeline {
        router,
        queue,
        store,
        pool,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_event(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/events")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn published_event_is_stored_and_queryable() {
    let p = memory_pipeline(QueueOptions::default());
    p.pool.start().unwrap();

    let (status, body) = send(
        &p.router,
        post_event(json!({"event_type": "login", "ts": 1000, "params": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["event_type"], "login");

    wait_for(|| p.store.len() == 1).await;

    let (status, body) = send(&p.router, get("/api/v1/events?type=login&from=900&to=1100")).await;
    assert_eq!(status, StatusCode::OK);

    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["eventType"], "login");
    assert_eq!(data[0]["ts"], 1000);
    assert_eq!(data[0]["params"], json!({}));

    wait_for(|| p.pool.stats().acked == 1).await;
    p.pool.stop().unwrap();
    assert_eq!(p.queue.stats().await.unwrap(), QueueStats::default());
}

#[tokio::test]
async fn empty_event_type_is_rejected_without_publishing() {
    let p = memory_pipeline(QueueOptions::default());
    let before = p.queue.stats().await.unwrap();

    let (status, body) = send(
        &p.router,
        post_event(json!({"event_type": "", "ts": 1000, "params": {}})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, json!({"code": 422, "message": "event has to have a type"}));
    assert_eq!(p.queue.stats().await.unwrap(), before);
}

#[tokio::test]
async fn malformed_queue_payload_is_never_stored() {
    let p = memory_pipeline(QueueOptions::default());

    p.queue.publish_payload("{\"event_type\": ").await.unwrap();
    p.queue
        .publish_payload(r#"{"event_type": "click", "ts": 5, "params": {"x": 1}}"#)
        .await
        .unwrap();
    p.pool.start().unwrap();

    wait_for(|| {
        let stats = p.pool.stats();
        stats.acked == 1 && stats.dead_lettered == 1
    })
    .await;
    p.pool.stop().unwrap();

    let stored = p.store.find(&EventsQuery::new().compose(0)).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].event_type, "click");
    assert_eq!(p.queue.stats().await.unwrap().rejected, 1);
}

#[tokio::test]
async fn storage_outage_is_recovered_by_redelivery() {
    let p = memory_pipeline(QueueOptions {
        max_deliveries: 0,
        ..QueueOptions::default()
    });
    p.store.set_available(false);
    p.pool.start().unwrap();

    let (status, _) = send(
        &p.router,
        post_event(json!({"event_type": "purchase", "ts": 1700000000, "params": {"amount": 9.99}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    wait_for(|| p.pool.stats().requeued >= 1).await;
    assert!(p.store.is_empty());

    p.store.set_available(true);
    wait_for(|| p.pool.stats().acked == 1).await;
    p.pool.stop().unwrap();

    assert_eq!(p.store.len(), 1);
    let (_, body) = send(&p.router, get("/api/v1/events?type=purchase")).await;
    assert_eq!(body["data"][0]["params"]["amount"], 9.99);
}

#[tokio::test]
async fn results_are_ascending_and_capped() {
    let p = memory_pipeline(QueueOptions::default());
    p.pool.start().unwrap();

    for ts in [50, 10, 40, 20, 30, 60, 70] {
        let (status, _) = send(&p.router, post_event(json!({"event_type": "tick", "ts": ts}))).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    wait_for(|| p.store.len() == 7).await;
    p.pool.stop().unwrap();

    let (_, body) = send(&p.router, get("/api/v1/events?limit=5")).await;
    let timestamps: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["ts"].as_i64().unwrap())
        .collect();
    assert_eq!(timestamps, vec![10, 20, 30, 40, 50]);

    let (_, body) = send(&p.router, get("/api/v1/events?limit=0&offset=5")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn web_and_worker_share_a_sqlite_queue() {
    let dir = tempdir().unwrap();
    let queue_path = dir.path().join("queue.db");
    let store_path = dir.path().join("events.db");

    // Web side: its own broker and store handles
    let web_queue = Queue::open(
        "events",
        Arc::new(SqliteBroker::open(&queue_path).unwrap()),
        QueueOptions::default(),
    );
    let web_store = Arc::new(SqliteStore::open(&store_path).unwrap());
    let router = build_router(AppState::new(web_queue.clone(), web_store, ApiConfig::default()));

    for ts in [3, 1, 2] {
        let (status, _) = send(&router, post_event(json!({"event_type": "login", "ts": ts}))).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    assert_eq!(web_queue.stats().await.unwrap().ready, 3);

    // Worker side: separate handles on the same files
    let worker_queue = Queue::open(
        "events",
        Arc::new(SqliteBroker::open(&queue_path).unwrap()),
        QueueOptions::default(),
    );
    let worker_store = Arc::new(SqliteStore::open(&store_path).unwrap());
    let pool = ConsumerPool::new(worker_queue, EventWriter::new(worker_store), fast_pool());
    pool.start().unwrap();

    wait_for(|| pool.stats().acked == 3).await;
    pool.stop().unwrap();

    assert_eq!(web_queue.stats().await.unwrap(), QueueStats::default());
    let (_, body) = send(&router, get("/api/v1/events?type=login")).await;
    let timestamps: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["ts"].as_i64().unwrap())
        .collect();
    assert_eq!(timestamps, vec![1, 2, 3]);
}
