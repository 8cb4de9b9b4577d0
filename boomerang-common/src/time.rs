//! Wall-clock helpers shared across the storage and dispatch crates.
//!
//! All timestamps in the data model are milliseconds since the Unix epoch,
//! matching the wire format in the original service.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time, milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}
