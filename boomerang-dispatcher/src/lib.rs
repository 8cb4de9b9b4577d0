#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod retry;

pub use error::{DispatchError, Result};
pub use retry::RetryPolicy;

use std::sync::Arc;
use std::time::{Duration, Instant};

use boomerang_common::{config::DispatcherConfig, internal, time::now_ms, Signal};
use boomerang_metrics::Metrics;
use boomerang_storage::{ScheduledItem, StorageManager};
use tokio::sync::{broadcast, Semaphore};

/// Drives the firing loop: claim due batches from `StorageManager`, issue
/// HTTP POSTs under a bounded concurrency pool, and reconcile each outcome
/// by deleting finished items or rescheduling retryable ones.
pub struct Dispatcher {
    storage: Arc<StorageManager>,
    http: reqwest::Client,
    metrics: Arc<Metrics>,
    retry_policy: RetryPolicy,
    load_batch_size: usize,
    max_concurrency: usize,
    idle_sleep: Duration,
}

impl Dispatcher {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed (e.g. an
    /// invalid TLS backend configuration).
    pub fn new(storage: Arc<StorageManager>, config: &DispatcherConfig, metrics: Arc<Metrics>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .build()
            .map_err(|e| DispatchError::Storage(boomerang_storage::Error::Internal(e.to_string())))?;

        Ok(Self {
            storage,
            http,
            metrics,
            retry_policy: RetryPolicy::new(),
            load_batch_size: config.load_batch_size,
            max_concurrency: config.max_concurrency,
            idle_sleep: Duration::from_millis(config.idle_sleep_ms),
        })
    }

    /// Runs the main loop until `shutdown` fires. Finishes the
    /// in-progress batch (including finalizing every outcome) before
    /// returning; never cancels an in-flight HTTP call.
    pub async fn serve(self: Arc<Self>, mut shutdown: broadcast::Receiver<Signal>) -> Result<()> {
        internal!("Dispatcher starting");

        loop {
            if shutdown.try_recv().is_ok() {
                internal!("Dispatcher received shutdown signal");
                return Ok(());
            }

            let batch = self.storage.load_due(self.load_batch_size)?;
            if batch.is_empty() {
                tokio::select! {
                    () = tokio::time::sleep(self.idle_sleep) => {}
                    _ = shutdown.recv() => {
                        internal!("Dispatcher received shutdown signal while idle");
                        return Ok(());
                    }
                }
                continue;
            }

            self.dispatch_batch(batch).await;
        }
    }

    async fn dispatch_batch(&self, batch: Vec<ScheduledItem>) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let (tx, mut rx) = tokio::sync::mpsc::channel(batch.len());

        for item in batch {
            // An item whose TTL has already passed by the time it's claimed
            // must never be POSTed; it is terminal regardless of retries left.
            if now_ms() >= item.time_to_live {
                let _ = tx.send((item, None)).await;
                continue;
            }

            let semaphore = semaphore.clone();
            let http = self.http.clone();
            let metrics = self.metrics.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let success = Self::do_call(&http, &metrics, &item).await;
                let _ = tx.send((item, Some(success))).await;
            });
        }
        drop(tx);

        let mut outcomes = Vec::new();
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }

        for (item, success) in outcomes {
            match success {
                Some(success) => self.finalize(item, success).await,
                None => self.expire(item).await,
            }
        }
    }

    /// Deletes an item past its TTL without ever issuing its HTTP call.
    async fn expire(&self, item: ScheduledItem) {
        if let Err(e) = self.storage.delete(item.id).await {
            boomerang_common::tracing::error!(id = %item.id, error = %e, "failed to delete TTL-expired item");
        }
    }

    /// `true` if the endpoint responded with a status below 500. Network
    /// errors, timeouts, and 5xx all count as failure.
    async fn do_call(http: &reqwest::Client, metrics: &Metrics, item: &ScheduledItem) -> bool {
        let mut headers = reqwest::header::HeaderMap::new();
        for (name, value) in &item.headers {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(name.as_bytes()),
                reqwest::header::HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }

        metrics.inflight_started();
        let start = Instant::now();
        let outcome = http.post(&item.endpoint).headers(headers).body(item.payload.clone()).send().await;
        metrics.inflight_finished();
        let duration_secs = start.elapsed().as_secs_f64();

        match outcome {
            Ok(response) => {
                let status = response.status().as_u16();
                let success = status < 500;
                metrics.record_dispatch_call(success, Some(status), duration_secs);
                success
            }
            Err(_) => {
                metrics.record_dispatch_call(false, None, duration_secs);
                false
            }
        }
    }

    async fn finalize(&self, mut item: ScheduledItem, success: bool) {
        let now = now_ms();
        if success || !self.retry_policy.is_retryable(&item, now) {
            if let Err(e) = self.storage.delete(item.id).await {
                boomerang_common::tracing::error!(id = %item.id, error = %e, "failed to delete finalized item");
            }
            return;
        }

        self.retry_policy.apply(&mut item);
        item.status = boomerang_common::Status::Retry;
        if let Err(e) = self.storage.update(item).await {
            boomerang_common::tracing::error!(error = %e, "failed to persist retry reschedule");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use boomerang_common::config::StorageConfig;
    use boomerang_storage::NewItem;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_metrics() -> Arc<Metrics> {
        Arc::new(boomerang_metrics::init(&boomerang_common::config::MetricsConfig::default()).unwrap())
    }

    async fn new_dispatcher() -> (Arc<Dispatcher>, Arc<StorageManager>) {
        let metrics = test_metrics();
        let storage = Arc::new(StorageManager::new(&StorageConfig::default(), metrics.clone()).unwrap());
        let config = DispatcherConfig {
            idle_sleep_ms: 5,
            ..DispatcherConfig::default()
        };
        let dispatcher = Arc::new(Dispatcher::new(storage.clone(), &config, metrics).unwrap());
        (dispatcher, storage)
    }

    #[tokio::test]
    async fn happy_path_fires_once_and_deletes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cb"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (dispatcher, storage) = new_dispatcher().await;
        storage
            .save(NewItem {
                endpoint: format!("{}/cb", server.uri()),
                headers: HashMap::new(),
                payload: b"x".to_vec(),
                send_after: 0,
                time_to_live: now_ms() + 60_000,
                max_retry: 3,
                back_off_ms: 100,
            })
            .await
            .unwrap();

        let batch = storage.load_due(10).unwrap();
        assert_eq!(batch.len(), 1);
        dispatcher.dispatch_batch(batch).await;

        assert!(storage.load_due(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn terminal_failure_deletes_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cb"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (dispatcher, storage) = new_dispatcher().await;
        storage
            .save(NewItem {
                endpoint: format!("{}/cb", server.uri()),
                headers: HashMap::new(),
                payload: b"x".to_vec(),
                send_after: 0,
                time_to_live: now_ms() + 60_000,
                max_retry: 1,
                back_off_ms: 100,
            })
            .await
            .unwrap();

        let batch = storage.load_due(10).unwrap();
        dispatcher.dispatch_batch(batch).await;

        assert!(storage.load_due(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn retryable_failure_reschedules_forward() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cb"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (dispatcher, storage) = new_dispatcher().await;
        storage
            .save(NewItem {
                endpoint: format!("{}/cb", server.uri()),
                headers: HashMap::new(),
                payload: b"x".to_vec(),
                send_after: 0,
                time_to_live: now_ms() + 60_000,
                max_retry: 3,
                back_off_ms: 60_000,
            })
            .await
            .unwrap();

        let batch = storage.load_due(10).unwrap();
        dispatcher.dispatch_batch(batch).await;

        let rescheduled = storage.load_due(10).unwrap();
        assert!(rescheduled.is_empty(), "not yet due after a forward reschedule");
    }
}
