use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of an installation batch.
pub type BatchId = u64;

/// Lifecycle state of an installation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    /// Record created, runner not started yet.
    Pending,
    /// Runner is working through the apps.
    Installing,
    /// Every app installed.
    Completed,
    /// Stopped on the first failure or a cancellation.
    Failed,
}

impl InstallStatus {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Installing => "installing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `completed` or `failed`; such records never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of one installation batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationRecord {
    /// Batch identifier.
    pub id: BatchId,
    /// Owning user.
    pub user_id: String,
    /// Target device, when supplied by the caller.
    pub device_id: Option<String>,
    /// List the apps were taken from.
    pub list_id: String,
    /// Lifecycle state.
    pub status: InstallStatus,
    /// Percent complete, 0..=100.
    pub progress: u8,
    /// Number of apps in the batch.
    pub apps_count: usize,
    /// Failure reason; present iff `status` is `failed`.
    pub error: Option<String>,
    /// A cancel request was recorded for this batch.
    #[serde(default)]
    pub cancel_requested: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the batch reached a terminal state.
    pub ended_at: Option<DateTime<Utc>>,
}

/// Fields supplied when a batch is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstallation {
    /// Owning user.
    pub user_id: String,
    /// Target device, if any.
    pub device_id: Option<String>,
    /// Source list.
    pub list_id: String,
    /// Number of valid apps in the batch.
    pub apps_count: usize,
}

/// Installation record store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this id.
    #[error("installation {0} not found")]
    NotFound(BatchId),
    /// The record already reached a terminal status.
    #[error("installation {id} is already {status}")]
    Terminal {
        /// Record id.
        id: BatchId,
        /// Terminal status it holds.
        status: InstallStatus,
    },
    /// The requested status change is not allowed from the current status.
    #[error("installation {id} cannot go from {from} to {to}")]
    InvalidTransition {
        /// Record id.
        id: BatchId,
        /// Current status.
        from: InstallStatus,
        /// Requested status.
        to: InstallStatus,
    },
    /// Reading or writing the backing file failed.
    #[error("failed to access installation store {}: {source}", .path.display())]
    Io {
        /// Backing file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The backing file is not valid JSON for the record table.
    #[error("installation store {} is corrupt: {source}", .path.display())]
    Corrupt {
        /// Backing file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}
