//! `QueueStore`: a durable, ordered, claim/release queue of [`QueueRow`]s.
//!
//! A single `Mutex`-guarded `BTreeMap` keyed by `(send_after, id)`, scanned
//! and compare-and-set under the same lock that serializes every other
//! write, so there is only ever one lock holder performing a claim's
//! scan-then-transition.

use std::collections::BTreeMap;
use std::sync::Mutex;

use boomerang_common::{time::now_ms, Status};

use crate::error::Result;
use crate::model::QueueRow;
use crate::types::ItemId;

#[derive(Default)]
struct Index {
    /// Ordered by `(send_after, id)` so a claim scan naturally yields
    /// ascending `send_after` with deterministic tie-breaking (I5).
    rows: BTreeMap<(u64, ItemId), QueueRow>,
    shutting_down: bool,
}

/// Durable priority queue of [`QueueRow`]s, ordered by `send_after`.
pub struct QueueStore {
    index: Mutex<Index>,
}

impl QueueStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: Mutex::new(Index::default()),
        }
    }

    /// Upsert by `id`. New rows are inserted as-is; existing rows are
    /// replaced in place (their `(send_after, id)` key may change).
    pub fn save(&self, rows: Vec<QueueRow>) -> Result<()> {
        let mut index = self.index.lock()?;
        for row in rows {
            Self::upsert(&mut index, row);
        }
        Ok(())
    }

    /// Rewrite existing rows. Implemented identically to `save` — both are
    /// upserts per §4.2.
    pub fn update(&self, rows: Vec<QueueRow>) -> Result<()> {
        self.save(rows)
    }

    /// Remove rows by id. Missing ids are silently ignored.
    pub fn delete(&self, ids: &[ItemId]) -> Result<()> {
        let mut index = self.index.lock()?;
        for id in ids {
            if let Some(key) = index
                .rows
                .iter()
                .find_map(|((send_after, row_id), _)| (row_id == id).then_some((*send_after, *row_id)))
            {
                index.rows.remove(&key);
            }
        }
        Ok(())
    }

    /// Atomically claim at most `max` rows with `send_after <= now` and a
    /// claimable status, ordered ascending by `send_after`, transitioning
    /// them to `Running` in the same locked scan (I2, I5).
    pub fn load_due(&self, max: usize) -> Result<Vec<QueueRow>> {
        let now = now_ms();
        let mut index = self.index.lock()?;

        let claimed_keys: Vec<(u64, ItemId)> = index
            .rows
            .iter()
            .filter(|((send_after, _), row)| *send_after <= now && row.status.is_claimable())
            .take(max)
            .map(|(key, _)| *key)
            .collect();

        let mut claimed = Vec::with_capacity(claimed_keys.len());
        for key in claimed_keys {
            if let Some(row) = index.rows.get_mut(&key) {
                row.status = Status::Running;
                claimed.push(row.clone());
            }
        }
        Ok(claimed)
    }

    /// Transition every `Running` row to `Recovered`. Run exactly once
    /// before accepting traffic (I3).
    pub fn recover_on_start(&self) -> Result<()> {
        let mut index = self.index.lock()?;
        for row in index.rows.values_mut() {
            if row.status.is_running() {
                row.status = Status::Recovered;
            }
        }
        Ok(())
    }

    pub fn shutdown(&self) -> Result<()> {
        self.index.lock()?.shutting_down = true;
        Ok(())
    }

    fn upsert(index: &mut Index, row: QueueRow) {
        if let Some(old_key) = index
            .rows
            .iter()
            .find_map(|((send_after, id), _)| (*id == row.id).then_some((*send_after, *id)))
        {
            index.rows.remove(&old_key);
        }
        index.rows.insert((row.send_after, row.id), row);
    }
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new()
    }
}
