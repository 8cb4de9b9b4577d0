//! The persisted shapes: the user-visible `ScheduledItem`, and the two
//! internal records it is split across (`QueueRow` in the hot path,
//! `BlobRecord` in the cold one).

use std::collections::HashMap;

use boomerang_common::Status;

use crate::types::ItemId;

/// One user-submitted record to be POSTed at `send_after`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledItem {
    pub id: ItemId,
    pub endpoint: String,
    pub headers: HashMap<String, String>,
    pub payload: Vec<u8>,
    pub send_after: u64,
    pub time_to_live: u64,
    pub max_retry: u32,
    pub back_off_ms: u64,
    pub status: Status,
}

impl ScheduledItem {
    /// Split into the hot `QueueRow` and cold `BlobRecord` halves.
    #[must_use]
    pub fn split(self) -> (QueueRow, BlobRecord) {
        let row = QueueRow {
            id: self.id,
            endpoint: self.endpoint,
            send_after: self.send_after,
            time_to_live: self.time_to_live,
            max_retry: self.max_retry,
            back_off_ms: self.back_off_ms,
            status: self.status,
        };
        let blob = BlobRecord {
            payload: self.payload,
            headers: self.headers,
        };
        (row, blob)
    }

    /// Rejoin a `QueueRow` with its matching `BlobRecord`.
    #[must_use]
    pub fn join(row: QueueRow, blob: BlobRecord) -> Self {
        Self {
            id: row.id,
            endpoint: row.endpoint,
            headers: blob.headers,
            payload: blob.payload,
            send_after: row.send_after,
            time_to_live: row.time_to_live,
            max_retry: row.max_retry,
            back_off_ms: row.back_off_ms,
            status: row.status,
        }
    }
}

/// The hot queue table row: small, scanned by `LoadDue`.
///
/// `queue(id PK, endpoint, sendAfter, leftAttempts, backOffMs, status)`,
/// with `timeToLive` carried alongside so `RetryPolicy` can evaluate an item
/// without a second lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRow {
    pub id: ItemId,
    pub endpoint: String,
    pub send_after: u64,
    pub time_to_live: u64,
    pub max_retry: u32,
    pub back_off_ms: u64,
    pub status: Status,
}

/// The cold blob table row: payload and headers, never touched by `LoadDue`'s scan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlobRecord {
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
}
