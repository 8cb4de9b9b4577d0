//! Error types for the storage crate.
//!
//! Covers queue/blob persistence, `BulkProcessor` shutdown semantics, and
//! the orphan-detection case called out in the storage consistency table.

use std::io;

use thiserror::Error;

use crate::types::ItemId;

/// Top-level storage error type. All `QueueStore`/`BlobStore`/`StorageManager`
/// operations return this.
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// I/O error from a durable backend.
    #[error("I/O error: {0}")]
    Io(String),

    /// Item not found (e.g. `Update`/blob lookup on an unknown id).
    #[error("item not found: {0}")]
    NotFound(ItemId),

    /// `Add` was called, or a batch was in flight, after `Shutdown`.
    #[error("storage is shutting down")]
    Shutdown,

    /// Internal invariant violation (lock poisoning, channel closed unexpectedly).
    #[error("internal storage error: {0}")]
    Internal(String),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("lock poisoned: {e}"))
    }
}

impl Error {
    /// Returns `true` if this error should fail the caller immediately
    /// rather than being retried, per the `Shutdown` row of the error table.
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}

/// Specialized `Result` type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;
