//! Install coordinator: admits batches, starts runner tasks and accepts cancels.

use std::sync::Arc;

use thiserror::Error;

use crate::catalog::{AppCatalog, AppInstallDescriptor, CatalogError};
use crate::logic::password::{Credential, CredentialError, CredentialValidator};
use crate::platform::Platform;
use crate::store::{BatchId, InstallationRecord, NewInstallation, RecordStore, StoreError};
use crate::template;

use super::batch::{ActiveSet, BatchRunner};

/// A caller's request to install one list.
pub struct InstallRequest {
    /// Authenticated caller.
    pub user_id: String,
    /// Device the caller acts from, if reported.
    pub device_id: Option<String>,
    /// List to install.
    pub list_id: String,
    /// Elevation passphrase as supplied; consumed into a [`Credential`].
    pub password: String,
}

/// A batch that was admitted and handed to the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Started {
    /// Record id.
    pub id: BatchId,
    /// Apps that will be attempted.
    pub total_apps: usize,
}

/// Reasons a batch is not admitted.
#[derive(Debug, Error)]
pub enum StartError {
    /// No passphrase was supplied.
    #[error("Sudo password is required")]
    MissingPassword,
    /// The passphrase cannot be piped to the elevation tool.
    #[error("Sudo password contains unsupported characters")]
    Unpipeable,
    /// The list does not exist or belongs to someone else.
    #[error("List not found")]
    ListNotFound,
    /// No app in the list carries an install command.
    #[error("No valid apps to install")]
    NoValidApps,
    /// No install command resolves for this host.
    #[error("No apps with valid installation commands")]
    InvalidCommands,
    /// The passphrase was rejected by the elevation probe.
    #[error("Incorrect Password")]
    InvalidPassword,
    /// Loading the list failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Creating the record failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CredentialError> for StartError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Missing => Self::MissingPassword,
            CredentialError::Unpipeable => Self::Unpipeable,
        }
    }
}

/// Owns the active-batch set and the collaborators every batch needs.
pub struct InstallManager {
    catalog: Arc<dyn AppCatalog>,
    store: Arc<dyn RecordStore>,
    validator: Arc<dyn CredentialValidator>,
    runner: Arc<BatchRunner>,
    active: Arc<ActiveSet>,
    platform: Platform,
}

impl InstallManager {
    /// Build a manager; `runner` must share `active`.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn AppCatalog>,
        store: Arc<dyn RecordStore>,
        validator: Arc<dyn CredentialValidator>,
        runner: Arc<BatchRunner>,
        active: Arc<ActiveSet>,
        platform: Platform,
    ) -> Self {
        Self {
            catalog,
            store,
            validator,
            runner,
            active,
            platform,
        }
    }

    /// Host platform batches are resolved for.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// What: Admit a batch and start it in the background.
    ///
    /// Inputs:
    /// - `request`: Caller, list and passphrase.
    ///
    /// Output:
    /// - `Started` once the `pending` record exists and the runner task was spawned.
    ///
    /// # Errors
    /// - Credential shape errors before anything else is looked up.
    /// - `ListNotFound`, `NoValidApps`, `InvalidCommands` from the catalog snapshot.
    /// - `InvalidPassword` when the elevation probe fails; no app is touched.
    /// - `Catalog`/`Store` when a collaborator fails.
    ///
    /// Details:
    /// - Apps whose template does not resolve for the host are skipped with a warning.
    /// - The credential moves into the runner task and is dropped when it ends.
    pub async fn begin(&self, request: InstallRequest) -> Result<Started, StartError> {
        let InstallRequest {
            user_id,
            device_id,
            list_id,
            password,
        } = request;
        let credential = Credential::new(password)?;

        let apps = self
            .catalog
            .list_apps(&user_id, &list_id)
            .await?
            .ok_or(StartError::ListNotFound)?;
        let apps = self.installable(&list_id, apps)?;

        if !self.validator.validate(&credential).await {
            tracing::warn!(user = %user_id, list = %list_id, "elevation credential rejected");
            return Err(StartError::InvalidPassword);
        }

        let total_apps = apps.len();
        let id = self
            .store
            .create(NewInstallation {
                user_id: user_id.clone(),
                device_id,
                list_id: list_id.clone(),
                apps_count: total_apps,
            })
            .await?;
        tracing::info!(installation = id, user = %user_id, list = %list_id, apps = total_apps, "installation admitted");

        self.active.insert(id);
        let runner = Arc::clone(&self.runner);
        let active = Arc::clone(&self.active);
        let credential = Arc::new(credential);
        tokio::spawn(async move {
            runner.run(id, apps, credential).await;
            active.remove(id);
        });

        Ok(Started { id, total_apps })
    }

    /// Keep apps that carry a command resolving for this host.
    fn installable(
        &self,
        list_id: &str,
        apps: Vec<AppInstallDescriptor>,
    ) -> Result<Vec<AppInstallDescriptor>, StartError> {
        let with_command: Vec<_> = apps
            .into_iter()
            .filter(|app| app.install_command.is_some())
            .collect();
        if with_command.is_empty() {
            return Err(StartError::NoValidApps);
        }
        let valid: Vec<_> = with_command
            .into_iter()
            .filter(|app| {
                let Some(raw) = app.install_command.as_ref() else {
                    return false;
                };
                match template::resolve(raw, self.platform) {
                    Ok(_) => true,
                    Err(err) => {
                        tracing::warn!(list = %list_id, app = %app.name, error = %err, "skipping app");
                        false
                    }
                }
            })
            .collect();
        if valid.is_empty() {
            return Err(StartError::InvalidCommands);
        }
        Ok(valid)
    }

    /// What: Fetch a record on behalf of `user_id`.
    ///
    /// Output:
    /// - `None` when the record is missing or owned by someone else.
    ///
    /// # Errors
    /// - Store read failures.
    pub async fn status(
        &self,
        id: BatchId,
        user_id: &str,
    ) -> Result<Option<InstallationRecord>, StoreError> {
        Ok(self
            .store
            .get(id)
            .await?
            .filter(|record| record.user_id == user_id))
    }

    /// What: Ask a batch owned by `user_id` to stop before its next app.
    ///
    /// Output:
    /// - `false` when the record is missing or not owned; `true` otherwise,
    ///   including for batches that already ended.
    ///
    /// # Errors
    /// - Store failures while reading or persisting the request.
    pub async fn cancel(&self, id: BatchId, user_id: &str) -> Result<bool, StoreError> {
        let Some(record) = self.status(id, user_id).await? else {
            return Ok(false);
        };
        let was_active = self.active.remove(id);
        if record.status.is_terminal() {
            tracing::debug!(installation = id, status = %record.status, "cancel on finished installation");
            return Ok(true);
        }
        match self.store.request_cancel(id).await {
            Ok(_) | Err(StoreError::Terminal { .. }) => {}
            Err(err) => return Err(err),
        }
        tracing::info!(installation = id, was_active, "cancel requested");
        Ok(true)
    }

    /// Whether `id` is running in this process and not cancelled.
    #[must_use]
    pub fn is_active(&self, id: BatchId) -> bool {
        self.active.contains(id)
    }
}
