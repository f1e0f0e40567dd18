//! App catalog: which lists a user owns and the install descriptors in them.
//!
//! The relational catalog of the full product is an external collaborator;
//! this crate reads it through [`AppCatalog`] and ships a TOML-backed
//! implementation for single-host deployments.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::template::RawTemplate;

/// One installable app as snapshotted when a batch is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInstallDescriptor {
    /// Catalog id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Per-platform command template; `None` when the app has no installer.
    #[serde(default)]
    pub install_command: Option<RawTemplate>,
}

/// A user-owned list of apps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppList {
    /// List id as used in request paths.
    pub id: String,
    /// Owning user id.
    pub owner: String,
    /// Apps in install order.
    #[serde(default)]
    pub apps: Vec<AppInstallDescriptor>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    lists: Vec<AppList>,
}

/// Catalog access failures.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog {}: {source}", .path.display())]
    Read {
        /// Catalog file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The catalog file is not valid TOML for the expected layout.
    #[error("failed to parse catalog {}: {source}", .path.display())]
    Parse {
        /// Catalog file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },
}

/// Read access to lists and their app descriptors.
#[async_trait]
pub trait AppCatalog: Send + Sync + 'static {
    /// What: Load the apps of `list_id` on behalf of `user_id`.
    ///
    /// Output:
    /// - `Some(apps)` in list order when the list exists and `user_id` owns it;
    ///   `None` otherwise, so callers cannot probe for other users' lists.
    async fn list_apps(
        &self,
        user_id: &str,
        list_id: &str,
    ) -> Result<Option<Vec<AppInstallDescriptor>>, CatalogError>;
}

/// Catalog loaded once from a TOML file.
///
/// ```toml
/// [[lists]]
/// id = "dev-tools"
/// owner = "7"
///
/// [[lists.apps]]
/// id = 1
/// name = "Git"
/// install_command = '{"linux": "apt-get install -y git", "macos": "brew install git"}'
///
/// [[lists.apps]]
/// id = 2
/// name = "VS Code"
/// install_command = { linux = "snap install code --classic", windows = "winget install -e --id Microsoft.VisualStudioCode" }
/// ```
#[derive(Debug, Default, Clone)]
pub struct FileCatalog {
    lists: Vec<AppList>,
}

impl FileCatalog {
    /// Catalog over in-memory lists.
    #[must_use]
    pub const fn new(lists: Vec<AppList>) -> Self {
        Self { lists }
    }

    /// What: Load the catalog from `path`.
    ///
    /// # Errors
    /// - `CatalogError::Read` / `CatalogError::Parse` on I/O or format errors.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let body = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::parse(&body).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(
            path = %path.display(),
            lists = catalog.lists.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// What: Parse catalog TOML.
    ///
    /// # Errors
    /// - The TOML error when the document does not match the layout.
    pub fn parse(body: &str) -> Result<Self, toml::de::Error> {
        let file: CatalogFile = toml::from_str(body)?;
        Ok(Self { lists: file.lists })
    }

    /// Lists held by the catalog.
    #[must_use]
    pub fn lists(&self) -> &[AppList] {
        &self.lists
    }
}

#[async_trait]
impl AppCatalog for FileCatalog {
    async fn list_apps(
        &self,
        user_id: &str,
        list_id: &str,
    ) -> Result<Option<Vec<AppInstallDescriptor>>, CatalogError> {
        Ok(self
            .lists
            .iter()
            .find(|l| l.id == list_id && l.owner == user_id)
            .map(|l| l.apps.clone()))
    }
}
