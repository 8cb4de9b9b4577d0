//! `StorageManager`: the facade over `QueueStore` + `BlobStore` that hides
//! the hot/cold split behind `Save` / `LoadDue` / `Update` / `Delete` /
//! `Shutdown`, each write routed through its own `BulkProcessor`.
//!
//! Blob-save precedes queue-save on write, and queue-delete precedes
//! blob-delete on removal: a blob orphaned by a half-finished delete is
//! garbage, not a hazard, while a queue row with no blob is the hazard
//! `LoadDue` must guard against.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use boomerang_common::{config::StorageConfig, status::Status, tracing};
use boomerang_metrics::Metrics;

use crate::blob_store::BlobStore;
use crate::bulk::BulkProcessor;
use crate::error::Result;
use crate::model::ScheduledItem;
use crate::queue_store::QueueStore;
use crate::types::ItemId;

/// A caller-supplied scheduling request, prior to id assignment.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub endpoint: String,
    pub headers: HashMap<String, String>,
    pub payload: Vec<u8>,
    pub send_after: u64,
    pub time_to_live: u64,
    pub max_retry: u32,
    pub back_off_ms: u64,
}

impl NewItem {
    fn into_scheduled(self, id: ItemId) -> ScheduledItem {
        ScheduledItem {
            id,
            endpoint: self.endpoint,
            headers: self.headers,
            payload: self.payload,
            send_after: self.send_after,
            time_to_live: self.time_to_live,
            max_retry: self.max_retry,
            back_off_ms: self.back_off_ms,
            status: Status::Initial,
        }
    }
}

pub struct StorageManager {
    queue: Arc<QueueStore>,
    blobs: Arc<BlobStore>,
    save: BulkProcessor<ScheduledItem>,
    update: BulkProcessor<ScheduledItem>,
    delete: BulkProcessor<ItemId>,
}

impl StorageManager {
    /// Builds the manager and runs crash recovery (I3) before returning, so
    /// the caller can start accepting traffic immediately after.
    pub fn new(config: &StorageConfig, metrics: Arc<Metrics>) -> Result<Self> {
        let queue = Arc::new(QueueStore::new());
        let blobs = Arc::new(BlobStore::new());
        queue.recover_on_start()?;

        let save = {
            let queue = queue.clone();
            let blobs = blobs.clone();
            let metrics = metrics.clone();
            let cfg = &config.save;
            BulkProcessor::new(
                cfg.queue_capacity,
                cfg.batch_size,
                Duration::from_millis(cfg.max_wait_ms),
                move |items: Vec<ScheduledItem>| {
                    let queue = queue.clone();
                    let blobs = blobs.clone();
                    let metrics = metrics.clone();
                    async move {
                        let start = Instant::now();
                        let result = Self::flush_save(&queue, &blobs, items);
                        metrics.record_bulk_op("save", result.is_ok(), start.elapsed().as_secs_f64());
                        result
                    }
                },
            )
        };

        let update = {
            let queue = queue.clone();
            let metrics = metrics.clone();
            let cfg = &config.update;
            BulkProcessor::new(
                cfg.queue_capacity,
                cfg.batch_size,
                Duration::from_millis(cfg.max_wait_ms),
                move |items: Vec<ScheduledItem>| {
                    let queue = queue.clone();
                    let metrics = metrics.clone();
                    async move {
                        let start = Instant::now();
                        let result = queue.update(items.into_iter().map(|item| item.split().0).collect());
                        metrics.record_bulk_op("update", result.is_ok(), start.elapsed().as_secs_f64());
                        result
                    }
                },
            )
        };

        let delete = {
            let queue = queue.clone();
            let blobs = blobs.clone();
            let metrics = metrics.clone();
            let cfg = &config.delete;
            BulkProcessor::new(
                cfg.queue_capacity,
                cfg.batch_size,
                Duration::from_millis(cfg.max_wait_ms),
                move |ids: Vec<ItemId>| {
                    let queue = queue.clone();
                    let blobs = blobs.clone();
                    let metrics = metrics.clone();
                    async move {
                        let start = Instant::now();
                        let result = Self::flush_delete(&queue, &blobs, ids);
                        metrics.record_bulk_op("delete", result.is_ok(), start.elapsed().as_secs_f64());
                        result
                    }
                },
            )
        };

        Ok(Self {
            queue,
            blobs,
            save,
            update,
            delete,
        })
    }

    fn flush_save(queue: &QueueStore, blobs: &BlobStore, items: Vec<ScheduledItem>) -> Result<()> {
        let mut blob_records = Vec::with_capacity(items.len());
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let (row, blob) = item.split();
            blob_records.push((row.id, blob));
            rows.push(row);
        }
        blobs.save(blob_records)?;
        queue.save(rows)?;
        Ok(())
    }

    fn flush_delete(queue: &QueueStore, blobs: &BlobStore, ids: Vec<ItemId>) -> Result<()> {
        queue.delete(&ids)?;
        blobs.delete(&ids)?;
        Ok(())
    }

    /// Assigns a fresh id and persists `item` via the Save bulk writer.
    pub async fn save(&self, item: NewItem) -> Result<ItemId> {
        let id = ItemId::generate();
        self.save.add(item.into_scheduled(id)).await?;
        Ok(id)
    }

    /// Synchronous claim of at most `max` due items, joined against their
    /// blobs. An item whose blob is missing (`StorageConsistency`) is
    /// logged and dropped rather than returned.
    pub fn load_due(&self, max: usize) -> Result<Vec<ScheduledItem>> {
        let rows = self.queue.load_due(max)?;
        let ids: Vec<ItemId> = rows.iter().map(|row| row.id).collect();
        let mut blobs = self.blobs.load(&ids)?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            match blobs.remove(&row.id) {
                Some(blob) => items.push(ScheduledItem::join(row, blob)),
                None => tracing::warn!(id = %row.id, "blob orphan detected on load_due; dropping item"),
            }
        }
        Ok(items)
    }

    /// Persists a retry reschedule (or any other queue-row mutation) via
    /// the Update bulk writer. Blob data never changes post-Save.
    pub async fn update(&self, item: ScheduledItem) -> Result<()> {
        self.update.add(item).await
    }

    /// Deletes an item's queue row and blob via the Delete bulk writer.
    pub async fn delete(&self, id: ItemId) -> Result<()> {
        self.delete.add(id).await
    }

    /// Drains the Save, Update, then Delete bulk writers in that order,
    /// then shuts down the underlying stores.
    pub async fn shutdown(&self) -> Result<()> {
        self.save.shutdown().await;
        self.update.shutdown().await;
        self.delete.shutdown().await;
        self.queue.shutdown()?;
        self.blobs.shutdown()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boomerang_common::config::MetricsConfig;

    fn test_metrics() -> Arc<Metrics> {
        Arc::new(boomerang_metrics::init(&MetricsConfig::default()).unwrap())
    }

    fn new_item(send_after: u64) -> NewItem {
        NewItem {
            endpoint: "http://example.test/cb".into(),
            headers: HashMap::new(),
            payload: b"x".to_vec(),
            send_after,
            time_to_live: send_after + 60_000,
            max_retry: 3,
            back_off_ms: 100,
        }
    }

    #[tokio::test]
    async fn save_then_load_due_returns_the_joined_item() {
        let manager = StorageManager::new(&StorageConfig::default(), test_metrics()).unwrap();
        let id = manager.save(new_item(0)).await.unwrap();

        let due = manager.load_due(10).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, id);
        assert_eq!(due[0].payload, b"x");
        assert_eq!(due[0].status, Status::Running);
    }

    #[tokio::test]
    async fn update_changes_are_visible_on_next_load_due() {
        let manager = StorageManager::new(&StorageConfig::default(), test_metrics()).unwrap();
        let id = manager.save(new_item(0)).await.unwrap();
        let mut item = manager.load_due(10).unwrap().remove(0);

        item.status = Status::Retry;
        item.max_retry -= 1;
        manager.update(item).await.unwrap();

        let due = manager.load_due(10).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, id);
        assert_eq!(due[0].max_retry, 2);
    }

    #[tokio::test]
    async fn delete_removes_queue_row_and_blob() {
        let manager = StorageManager::new(&StorageConfig::default(), test_metrics()).unwrap();
        let id = manager.save(new_item(0)).await.unwrap();
        manager.load_due(10).unwrap();

        manager.delete(id).await.unwrap();

        assert!(manager.load_due(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn shutdown_drains_pending_writes() {
        let manager = StorageManager::new(&StorageConfig::default(), test_metrics()).unwrap();
        manager.save(new_item(0)).await.unwrap();

        manager.shutdown().await.unwrap();
    }
}
