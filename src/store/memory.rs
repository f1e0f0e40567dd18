use async_trait::async_trait;
use tokio::sync::Mutex;

use super::table::Table;
use super::{BatchId, InstallationRecord, NewInstallation, RecordStore, StoreError};

/// Process-local record store; records are lost when the daemon exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<Table>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, new: NewInstallation) -> Result<BatchId, StoreError> {
        Ok(self.table.lock().await.create(new))
    }

    async fn get(&self, id: BatchId) -> Result<Option<InstallationRecord>, StoreError> {
        Ok(self.table.lock().await.get(id))
    }

    async fn mark_installing(&self, id: BatchId, apps_count: usize) -> Result<(), StoreError> {
        self.table.lock().await.mark_installing(id, apps_count)
    }

    async fn update_progress(&self, id: BatchId, progress: u8) -> Result<(), StoreError> {
        self.table.lock().await.update_progress(id, progress)
    }

    async fn mark_failed(&self, id: BatchId, error: &str) -> Result<(), StoreError> {
        self.table.lock().await.mark_failed(id, error)
    }

    async fn mark_completed(&self, id: BatchId) -> Result<(), StoreError> {
        self.table.lock().await.mark_completed(id)
    }

    async fn request_cancel(&self, id: BatchId) -> Result<bool, StoreError> {
        self.table.lock().await.request_cancel(id)
    }
}
