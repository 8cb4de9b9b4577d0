#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

pub mod blob_store;
pub mod bulk;
pub mod error;
pub mod manager;
pub mod model;
pub mod queue_store;
pub mod types;

pub use blob_store::BlobStore;
pub use bulk::BulkProcessor;
pub use error::{Error, Result};
pub use manager::{NewItem, StorageManager};
pub use model::{BlobRecord, QueueRow, ScheduledItem};
pub use queue_store::QueueStore;
pub use types::ItemId;
