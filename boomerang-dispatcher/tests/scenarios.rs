//! End-to-end scenarios driving `Dispatcher::serve` through its full loop,
//! rather than the single-batch unit tests in `src/lib.rs`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use boomerang_common::config::{DispatcherConfig, MetricsConfig, StorageConfig};
use boomerang_common::time::now_ms;
use boomerang_common::Signal;
use boomerang_dispatcher::Dispatcher;
use boomerang_storage::{NewItem, StorageManager};
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> DispatcherConfig {
    DispatcherConfig {
        idle_sleep_ms: 10,
        http_timeout_ms: 1_000,
        ..DispatcherConfig::default()
    }
}

fn test_metrics() -> Arc<boomerang_metrics::Metrics> {
    Arc::new(boomerang_metrics::init(&MetricsConfig::default()).unwrap())
}

#[tokio::test]
async fn happy_path_delivers_and_shuts_down_cleanly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let metrics = test_metrics();
    let storage = Arc::new(StorageManager::new(&StorageConfig::default(), metrics.clone()).unwrap());
    let dispatcher = Arc::new(Dispatcher::new(storage.clone(), &test_config(), metrics).unwrap());

    storage
        .save(NewItem {
            endpoint: format!("{}/a", server.uri()),
            headers: HashMap::new(),
            payload: b"x".to_vec(),
            send_after: 0,
            time_to_live: now_ms() + 60_000,
            max_retry: 3,
            back_off_ms: 100,
        })
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(dispatcher.serve(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(100)).await;
    let _ = shutdown_tx.send(Signal::Shutdown);
    handle.await.unwrap().unwrap();

    storage.shutdown().await.unwrap();
}

#[tokio::test]
async fn ttl_expired_items_are_never_dispatched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/never"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let metrics = test_metrics();
    let storage = Arc::new(StorageManager::new(&StorageConfig::default(), metrics.clone()).unwrap());
    let dispatcher = Arc::new(Dispatcher::new(storage.clone(), &test_config(), metrics).unwrap());

    let now = now_ms();
    storage
        .save(NewItem {
            endpoint: format!("{}/never", server.uri()),
            headers: HashMap::new(),
            payload: b"x".to_vec(),
            send_after: now - 1_000,
            time_to_live: now - 500,
            max_retry: 3,
            back_off_ms: 50,
        })
        .await
        .unwrap();

    // Both send_after and TimeToLive are already in the past, so the item
    // is due for a claim, but must be deleted on sight rather than POSTed.
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(dispatcher.serve(shutdown_rx));
    tokio::time::sleep(Duration::from_millis(100)).await;
    let _ = shutdown_tx.send(Signal::Shutdown);
    handle.await.unwrap().unwrap();

    assert!(storage.load_due(10).unwrap().is_empty());
    storage.shutdown().await.unwrap();
}
