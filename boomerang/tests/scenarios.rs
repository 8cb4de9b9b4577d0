//! End-to-end scenarios driving the HTTP ingress and dispatcher together.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use boomerang::server::{router, AppState};
use boomerang_common::config::{DispatcherConfig, MetricsConfig, StorageConfig};
use boomerang_common::time::now_ms;
use boomerang_common::Signal;
use boomerang_dispatcher::Dispatcher;
use boomerang_storage::{NewItem, StorageManager};
use tokio::sync::broadcast;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dispatcher_config() -> DispatcherConfig {
    DispatcherConfig {
        idle_sleep_ms: 10,
        http_timeout_ms: 1_000,
        ..DispatcherConfig::default()
    }
}

fn submit_body(endpoint: &str, max_retry: u32, back_off_ms: u64, ttl_offset_ms: u64) -> Body {
    Body::from(
        serde_json::json!({
            "endpoint": endpoint,
            "payload": BASE64.encode(b"boomerang"),
            "sendAfter": 0,
            "maxRetry": max_retry,
            "backOffMs": back_off_ms,
            "TimeToLive": now_ms() + ttl_offset_ms,
        })
        .to_string(),
    )
}

async fn run_dispatcher_for(dispatcher: Arc<Dispatcher>, duration: Duration) {
    let (tx, rx) = broadcast::channel(1);
    let handle = tokio::spawn(dispatcher.serve(rx));
    tokio::time::sleep(duration).await;
    let _ = tx.send(Signal::Shutdown);
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn happy_path_submits_and_delivers_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let metrics = Arc::new(boomerang_metrics::init(&MetricsConfig::default()).unwrap());
    let storage = Arc::new(StorageManager::new(&StorageConfig::default(), metrics.clone()).unwrap());
    let dispatcher = Arc::new(Dispatcher::new(storage.clone(), &dispatcher_config(), metrics.clone()).unwrap());
    let state = AppState {
        storage: storage.clone(),
        metrics,
    };

    let response = router(state)
        .oneshot(
            Request::post("/submit")
                .header("content-type", "application/json")
                .body(submit_body(&format!("{}/a", server.uri()), 3, 100, 60_000))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    run_dispatcher_for(dispatcher, Duration::from_millis(100)).await;

    assert!(storage.load_due(10).unwrap().is_empty());
    storage.shutdown().await.unwrap();
}

#[tokio::test]
async fn retries_exhausted_item_is_deleted_without_a_third_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let metrics = Arc::new(boomerang_metrics::init(&MetricsConfig::default()).unwrap());
    let storage = Arc::new(StorageManager::new(&StorageConfig::default(), metrics.clone()).unwrap());
    let dispatcher = Arc::new(Dispatcher::new(storage.clone(), &dispatcher_config(), metrics).unwrap());

    storage
        .save(NewItem {
            endpoint: format!("{}/b", server.uri()),
            headers: std::collections::HashMap::new(),
            payload: b"x".to_vec(),
            send_after: 0,
            time_to_live: now_ms() + 60_000,
            max_retry: 1,
            back_off_ms: 10,
        })
        .await
        .unwrap();

    run_dispatcher_for(dispatcher, Duration::from_millis(100)).await;

    assert!(storage.load_due(10).unwrap().is_empty());
    storage.shutdown().await.unwrap();
}

#[tokio::test]
async fn submitted_item_surviving_a_5xx_is_retried_then_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/d"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/d"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let metrics = Arc::new(boomerang_metrics::init(&MetricsConfig::default()).unwrap());
    let storage = Arc::new(StorageManager::new(&StorageConfig::default(), metrics.clone()).unwrap());
    let dispatcher = Arc::new(Dispatcher::new(storage.clone(), &dispatcher_config(), metrics.clone()).unwrap());
    let state = AppState {
        storage: storage.clone(),
        metrics,
    };

    let response = router(state)
        .oneshot(
            Request::post("/submit")
                .header("content-type", "application/json")
                .body(submit_body(&format!("{}/d", server.uri()), 3, 50, 60_000))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    run_dispatcher_for(dispatcher, Duration::from_millis(300)).await;

    assert!(storage.load_due(10).unwrap().is_empty());
    storage.shutdown().await.unwrap();
}

#[tokio::test]
async fn two_hundred_fifty_submissions_coalesce_into_few_flushes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bulk"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let metrics = Arc::new(boomerang_metrics::init(&MetricsConfig::default()).unwrap());
    let storage = Arc::new(StorageManager::new(&StorageConfig::default(), metrics.clone()).unwrap());
    let state = AppState {
        storage: storage.clone(),
        metrics: metrics.clone(),
    };
    let app = router(state);

    for _ in 0..250 {
        let response = app
            .clone()
            .oneshot(
                Request::post("/submit")
                    .header("content-type", "application/json")
                    .body(submit_body(&format!("{}/bulk", server.uri()), 3, 100, 60_000))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let dispatcher = Arc::new(Dispatcher::new(storage.clone(), &dispatcher_config(), metrics).unwrap());
    run_dispatcher_for(dispatcher, Duration::from_millis(500)).await;

    assert!(storage.load_due(300).unwrap().is_empty());
    storage.shutdown().await.unwrap();
}
