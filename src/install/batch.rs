//! Batch runner: drives one installation batch to a terminal status.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use crate::catalog::AppInstallDescriptor;
use crate::logic::password::Credential;
use crate::platform::Platform;
use crate::store::{BatchId, RecordStore, StoreError};
use crate::template::{self, DecodeError};

use super::executor::{ExecError, Executor};

/// Error text recorded when a user cancels a batch.
pub const CANCELLED_MESSAGE: &str = "Installation cancelled by user";

/// Chunking, progress and terminal-write policy of the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Apps per chunk; bounds intermediate state only.
    pub chunk_size: usize,
    /// Progress is persisted each time it enters a new multiple of this step.
    pub progress_step: u8,
    /// Attempts for the final status write (at least 2).
    pub terminal_write_attempts: u32,
    /// Pause between terminal write attempts.
    pub terminal_retry_delay: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            chunk_size: 50,
            progress_step: 10,
            terminal_write_attempts: 3,
            terminal_retry_delay: Duration::from_millis(500),
        }
    }
}

/// Ids of batches that are running and not cancelled.
///
/// Cancelling removes an id; the runner checks membership before every app.
#[derive(Debug, Default)]
pub struct ActiveSet {
    ids: Mutex<HashSet<BatchId>>,
}

impl ActiveSet {
    /// Mark `id` active.
    pub fn insert(&self, id: BatchId) {
        self.lock().insert(id);
    }

    /// Remove `id`; returns whether it was active.
    pub fn remove(&self, id: BatchId) -> bool {
        self.lock().remove(&id)
    }

    /// Whether `id` is active.
    #[must_use]
    pub fn contains(&self, id: BatchId) -> bool {
        self.lock().contains(&id)
    }

    /// Number of active batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// No active batches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<BatchId>> {
        // A panic while holding this lock cannot leave the set inconsistent.
        self.ids
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Why a batch stopped before completing.
#[derive(Debug, Error)]
pub enum BatchFailure {
    /// The user asked to stop.
    #[error("{}", CANCELLED_MESSAGE)]
    Cancelled,
    /// An app's template no longer resolves for the host.
    #[error("{source}")]
    Decode {
        /// App whose template failed.
        app: String,
        /// Decoder error.
        source: DecodeError,
    },
    /// An app's command failed after all retries.
    #[error("{source}")]
    Exec {
        /// App whose command failed.
        app: String,
        /// Executor error.
        source: ExecError,
    },
    /// The record could not be moved to `installing`.
    #[error("failed to start installation: {0}")]
    Start(#[source] StoreError),
}

/// Tracks completed apps and decides which progress values get persisted.
#[derive(Debug)]
struct ProgressTracker {
    total: usize,
    done: usize,
    step: u8,
    latest: u8,
    persisted: u8,
}

impl ProgressTracker {
    fn new(total: usize, step: u8) -> Self {
        Self {
            total,
            done: 0,
            step: step.clamp(1, 100),
            latest: 0,
            persisted: 0,
        }
    }

    /// Count one success; returns a value to persist when a step boundary was crossed.
    ///
    /// 100 is never returned here; it is written by the completion update.
    fn record_success(&mut self) -> Option<u8> {
        self.done += 1;
        self.latest = percent(self.done, self.total);
        if self.latest >= 100 {
            return None;
        }
        if self.latest / self.step > self.persisted / self.step {
            self.persisted = self.latest;
            return Some(self.latest);
        }
        None
    }

    /// Latest value if it was never persisted and is below 100.
    fn unflushed(&self) -> Option<u8> {
        (self.latest > self.persisted && self.latest < 100).then_some(self.latest)
    }
}

/// `round(done / total * 100)`, half rounded up.
fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (done.min(total) * 100 + total / 2) / total;
    u8::try_from(pct).unwrap_or(100)
}

enum Outcome {
    Completed,
    Failed(String),
}

/// Runs batches sequentially through an [`Executor`], reporting to a [`RecordStore`].
pub struct BatchRunner {
    store: Arc<dyn RecordStore>,
    executor: Arc<Executor>,
    active: Arc<ActiveSet>,
    platform: Platform,
    policy: BatchPolicy,
}

impl BatchRunner {
    /// Create a runner sharing `active` with the coordinator.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        executor: Arc<Executor>,
        active: Arc<ActiveSet>,
        platform: Platform,
        policy: BatchPolicy,
    ) -> Self {
        Self {
            store,
            executor,
            active,
            platform,
            policy,
        }
    }

    /// What: Install `apps` in order and leave the record in a terminal status.
    ///
    /// Inputs:
    /// - `id`: Record created in `pending` state.
    /// - `apps`: Pre-validated descriptors in install order.
    /// - `credential`: Elevation passphrase; dropped when the batch ends.
    ///
    /// Output:
    /// - None. Every outcome, including store errors, ends up in the record.
    ///
    /// Details:
    /// - Writes `installing`/0/app count before the first app.
    /// - Checks for cancellation before every app; an in-flight command is
    ///   never interrupted.
    /// - Stops at the first failure; remaining apps are not attempted.
    /// - Progress writes are bounded by the step size; 100 is written once,
    ///   by the completion update.
    pub async fn run(&self, id: BatchId, apps: Vec<AppInstallDescriptor>, credential: Arc<Credential>) {
        let total = apps.len();
        tracing::info!(installation = id, apps = total, platform = %self.platform, "installation started");
        let mut tracker = ProgressTracker::new(total, self.policy.progress_step);

        let outcome = match self.drive(id, &apps, &credential, &mut tracker).await {
            Ok(()) => Outcome::Completed,
            Err(failure) => {
                match &failure {
                    BatchFailure::Cancelled => {
                        tracing::info!(installation = id, done = tracker.done, "installation cancelled");
                    }
                    BatchFailure::Exec { app, .. } | BatchFailure::Decode { app, .. } => {
                        tracing::error!(installation = id, app = %app, error = %failure, "installation failed");
                    }
                    BatchFailure::Start(_) => {
                        tracing::error!(installation = id, error = %failure, "installation could not start");
                    }
                }
                if let Some(progress) = tracker.unflushed() {
                    self.persist_progress(id, progress).await;
                }
                Outcome::Failed(failure.to_string())
            }
        };
        drop(credential);
        self.finish(id, outcome).await;
    }

    async fn drive(
        &self,
        id: BatchId,
        apps: &[AppInstallDescriptor],
        credential: &Credential,
        tracker: &mut ProgressTracker,
    ) -> Result<(), BatchFailure> {
        self.store
            .mark_installing(id, apps.len())
            .await
            .map_err(BatchFailure::Start)?;

        let chunk_size = self.policy.chunk_size.max(1);
        for (chunk_idx, chunk) in apps.chunks(chunk_size).enumerate() {
            tracing::debug!(installation = id, chunk = chunk_idx, size = chunk.len(), "processing chunk");
            for app in chunk {
                if self.is_cancelled(id).await {
                    return Err(BatchFailure::Cancelled);
                }
                let command = resolve_app(app, self.platform)?;
                tracing::info!(installation = id, app = %app.name, "installing app");
                self.executor
                    .execute(&command, credential)
                    .await
                    .map_err(|source| BatchFailure::Exec {
                        app: app.name.clone(),
                        source,
                    })?;
                if let Some(progress) = tracker.record_success() {
                    self.persist_progress(id, progress).await;
                }
            }
        }
        Ok(())
    }

    /// Cancelled in memory, or a cancel request was persisted by another process.
    async fn is_cancelled(&self, id: BatchId) -> bool {
        if !self.active.contains(id) {
            return true;
        }
        match self.store.get(id).await {
            Ok(Some(record)) => record.cancel_requested,
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(installation = id, error = %err, "failed to read cancel flag");
                false
            }
        }
    }

    async fn persist_progress(&self, id: BatchId, progress: u8) {
        match self.store.update_progress(id, progress).await {
            Ok(()) => tracing::debug!(installation = id, progress, "progress updated"),
            Err(err) => {
                tracing::warn!(installation = id, progress, error = %err, "failed to persist progress");
            }
        }
    }

    async fn finish(&self, id: BatchId, outcome: Outcome) {
        let attempts = self.policy.terminal_write_attempts.max(2);
        for attempt in 1..=attempts {
            let result = match &outcome {
                Outcome::Completed => self.store.mark_completed(id).await,
                Outcome::Failed(error) => self.store.mark_failed(id, error).await,
            };
            match result {
                Ok(()) => {
                    match &outcome {
                        Outcome::Completed => tracing::info!(installation = id, "installation completed"),
                        Outcome::Failed(_) => tracing::info!(installation = id, "installation marked failed"),
                    }
                    return;
                }
                Err(err @ (StoreError::Terminal { .. } | StoreError::NotFound(_))) => {
                    tracing::warn!(installation = id, error = %err, "final status not written");
                    return;
                }
                Err(err) if attempt < attempts => {
                    tracing::warn!(installation = id, attempt, error = %err, "final status write failed; retrying");
                    tokio::time::sleep(self.policy.terminal_retry_delay).await;
                }
                Err(err) => {
                    tracing::error!(installation = id, attempts, error = %err, "giving up on final status write");
                }
            }
        }
    }
}

fn resolve_app(app: &AppInstallDescriptor, platform: Platform) -> Result<String, BatchFailure> {
    let raw = app
        .install_command
        .as_ref()
        .ok_or_else(|| BatchFailure::Decode {
            app: app.name.clone(),
            source: DecodeError::MalformedTemplate("app has no install command".to_string()),
        })?;
    template::resolve(raw, platform).map_err(|source| BatchFailure::Decode {
        app: app.name.clone(),
        source,
    })
}
