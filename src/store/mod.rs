//! Installation record store.
//!
//! The runner is the only writer of status, progress and error; the HTTP layer
//! creates records and reads them back for polling.

use async_trait::async_trait;

mod file;
mod memory;
mod table;
mod types;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use types::{BatchId, InstallStatus, InstallationRecord, NewInstallation, StoreError};

/// Persistence for installation batches.
///
/// Implementations serialize writes per id; terminal records are immutable.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Insert a `pending` record and return its id.
    async fn create(&self, new: NewInstallation) -> Result<BatchId, StoreError>;

    /// Fetch a record, `None` when unknown.
    async fn get(&self, id: BatchId) -> Result<Option<InstallationRecord>, StoreError>;

    /// pending -> installing with progress 0 and the app count.
    async fn mark_installing(&self, id: BatchId, apps_count: usize) -> Result<(), StoreError>;

    /// Raise the progress of an installing record.
    async fn update_progress(&self, id: BatchId, progress: u8) -> Result<(), StoreError>;

    /// Move a live record to `failed` with `error` and an end time.
    async fn mark_failed(&self, id: BatchId, error: &str) -> Result<(), StoreError>;

    /// installing -> completed with progress 100 and an end time.
    async fn mark_completed(&self, id: BatchId) -> Result<(), StoreError>;

    /// Persist a cancel request; returns `false` when the record is already terminal.
    async fn request_cancel(&self, id: BatchId) -> Result<bool, StoreError>;
}
