//! `BlobStore`: durable key→(payload, headers) store, co-managed with
//! [`crate::queue_store::QueueStore`]. Kept as a plain `Mutex`-guarded map —
//! the hot/cold split is an optional optimization, not a correctness
//! requirement, so the storage medium matters less than the save/delete
//! ordering relative to the queue store (see `manager.rs`).

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;
use crate::model::BlobRecord;
use crate::types::ItemId;

#[derive(Default)]
pub struct BlobStore {
    records: Mutex<HashMap<ItemId, BlobRecord>>,
}

impl BlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, records: Vec<(ItemId, BlobRecord)>) -> Result<()> {
        let mut store = self.records.lock()?;
        for (id, record) in records {
            store.insert(id, record);
        }
        Ok(())
    }

    /// Load blobs for `ids`. Ids with no matching record are absent from the
    /// returned map — callers treat this as the `StorageConsistency` /
    /// blob-orphan case and drop the item.
    pub fn load(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, BlobRecord>> {
        let store = self.records.lock()?;
        Ok(ids.iter().filter_map(|id| store.get(id).map(|b| (*id, b.clone()))).collect())
    }

    pub fn delete(&self, ids: &[ItemId]) -> Result<()> {
        let mut store = self.records.lock()?;
        for id in ids {
            store.remove(id);
        }
        Ok(())
    }

    pub fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
