//! Error types for the dispatcher crate.
//!
//! Storage errors are surfaced to the caller; HTTP errors never reach this
//! type at all — they are contained inside the dispatch loop and resolved
//! into retry decisions (see `RetryPolicy`) before anything returns.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("storage error: {0}")]
    Storage(#[from] boomerang_storage::Error),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
