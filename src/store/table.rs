//! In-memory record table holding the status transition rules.
//!
//! Both store backends wrap a `Table` behind one lock, which serializes every
//! write to a given id.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::types::{BatchId, InstallStatus, InstallationRecord, NewInstallation, StoreError};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    next_id: BatchId,
    records: BTreeMap<BatchId, InstallationRecord>,
}

impl Table {
    pub fn create(&mut self, new: NewInstallation) -> BatchId {
        self.next_id += 1;
        let id = self.next_id;
        self.records.insert(
            id,
            InstallationRecord {
                id,
                user_id: new.user_id,
                device_id: new.device_id,
                list_id: new.list_id,
                status: InstallStatus::Pending,
                progress: 0,
                apps_count: new.apps_count,
                error: None,
                cancel_requested: false,
                created_at: Utc::now(),
                ended_at: None,
            },
        );
        id
    }

    pub fn get(&self, id: BatchId) -> Option<InstallationRecord> {
        self.records.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    fn live_mut(&mut self, id: BatchId) -> Result<&mut InstallationRecord, StoreError> {
        let record = self.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if record.status.is_terminal() {
            return Err(StoreError::Terminal {
                id,
                status: record.status,
            });
        }
        Ok(record)
    }

    /// pending -> installing, resetting progress and recording the app count.
    pub fn mark_installing(&mut self, id: BatchId, apps_count: usize) -> Result<(), StoreError> {
        let record = self.live_mut(id)?;
        if record.status != InstallStatus::Pending {
            return Err(StoreError::InvalidTransition {
                id,
                from: record.status,
                to: InstallStatus::Installing,
            });
        }
        record.status = InstallStatus::Installing;
        record.progress = 0;
        record.apps_count = apps_count;
        Ok(())
    }

    /// Raise progress of an installing record; lower values are ignored.
    pub fn update_progress(&mut self, id: BatchId, progress: u8) -> Result<(), StoreError> {
        let record = self.live_mut(id)?;
        if record.status != InstallStatus::Installing {
            return Err(StoreError::InvalidTransition {
                id,
                from: record.status,
                to: InstallStatus::Installing,
            });
        }
        record.progress = record.progress.max(progress.min(100));
        Ok(())
    }

    pub fn mark_failed(&mut self, id: BatchId, error: &str) -> Result<(), StoreError> {
        let record = self.live_mut(id)?;
        record.status = InstallStatus::Failed;
        record.error = Some(if error.is_empty() {
            "Installation failed".to_string()
        } else {
            error.to_string()
        });
        record.ended_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_completed(&mut self, id: BatchId) -> Result<(), StoreError> {
        let record = self.live_mut(id)?;
        if record.status != InstallStatus::Installing {
            return Err(StoreError::InvalidTransition {
                id,
                from: record.status,
                to: InstallStatus::Completed,
            });
        }
        record.status = InstallStatus::Completed;
        record.progress = 100;
        record.error = None;
        record.ended_at = Some(Utc::now());
        Ok(())
    }

    /// Flag a live record for cancellation; `false` when already terminal.
    pub fn request_cancel(&mut self, id: BatchId) -> Result<bool, StoreError> {
        match self.live_mut(id) {
            Ok(record) => {
                record.cancel_requested = true;
                Ok(true)
            }
            Err(StoreError::Terminal { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
