use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};

use super::table::Table;
use super::{BatchId, InstallationRecord, NewInstallation, RecordStore, StoreError};

/// Record store persisted as one JSON document.
///
/// Every read and mutation re-loads the file first. A mutation is applied to
/// a copy of the table, written to a temporary file and renamed into place;
/// the in-memory table only changes once the write succeeded. Records left
/// `pending`/`installing` by a previous process are loaded as-is.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    table: Mutex<Table>,
}

impl FileStore {
    /// What: Open (or start) the store at `path`.
    ///
    /// Inputs:
    /// - `path`: JSON file; a missing or empty file yields an empty store.
    ///
    /// Output:
    /// - The store with any previously persisted records.
    ///
    /// # Errors
    /// - `StoreError::Io` when the file exists but cannot be read.
    /// - `StoreError::Corrupt` when its contents do not parse.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let table = parse_table(&path, std::fs::read_to_string(&path))?;
        tracing::info!(path = %path.display(), records = table.len(), "installation store opened");
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    /// Lock the table after re-reading it from disk.
    ///
    /// Another process may share the file (for example to request a cancel),
    /// so every read and mutation starts from the persisted state.
    async fn refreshed(&self) -> Result<MutexGuard<'_, Table>, StoreError> {
        let mut table = self.table.lock().await;
        *table = parse_table(&self.path, tokio::fs::read_to_string(&self.path).await)?;
        Ok(table)
    }

    /// Apply `op` to a copy, persist it, then commit it in memory.
    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut Table) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut table = self.refreshed().await?;
        let mut next = table.clone();
        let out = op(&mut next)?;
        self.persist(&next).await?;
        *table = next;
        Ok(out)
    }

    async fn persist(&self, table: &Table) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(table).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| self.io_err(source))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|source| self.io_err(source))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| self.io_err(source))
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Decode the result of reading `path`; missing or blank files are empty tables.
fn parse_table(path: &Path, read: std::io::Result<String>) -> Result<Table, StoreError> {
    match read {
        Ok(body) if body.trim().is_empty() => Ok(Table::default()),
        Ok(body) => serde_json::from_str(&body).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Table::default()),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn create(&self, new: NewInstallation) -> Result<BatchId, StoreError> {
        self.mutate(|t| Ok(t.create(new))).await
    }

    async fn get(&self, id: BatchId) -> Result<Option<InstallationRecord>, StoreError> {
        Ok(self.refreshed().await?.get(id))
    }

    async fn mark_installing(&self, id: BatchId, apps_count: usize) -> Result<(), StoreError> {
        self.mutate(|t| t.mark_installing(id, apps_count)).await
    }

    async fn update_progress(&self, id: BatchId, progress: u8) -> Result<(), StoreError> {
        self.mutate(|t| t.update_progress(id, progress)).await
    }

    async fn mark_failed(&self, id: BatchId, error: &str) -> Result<(), StoreError> {
        self.mutate(|t| t.mark_failed(id, error)).await
    }

    async fn mark_completed(&self, id: BatchId) -> Result<(), StoreError> {
        self.mutate(|t| t.mark_completed(id)).await
    }

    async fn request_cancel(&self, id: BatchId) -> Result<bool, StoreError> {
        self.mutate(|t| t.request_cancel(id)).await
    }
}
