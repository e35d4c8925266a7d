//! Workspace facade: both record stores and the folder manager for one root.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::config::WorkspaceConfig;
use crate::customer::Customer;
use crate::error::{StoreError, StoreResult};
use crate::folders::{FolderManager, FolderOutcome};
use crate::project::Project;
use crate::record::RecordId;
use crate::storage::RecordStore;

/// An opened workspace.
#[derive(Debug)]
pub struct Workspace {
    config: Arc<WorkspaceConfig>,
    folders: FolderManager,
    customers: RecordStore<Customer>,
    projects: RecordStore<Project>,
}

impl Workspace {
    /// Validates `config`, creates the data and customers directories and
    /// opens both stores.
    ///
    /// # Errors
    /// [`StoreError::InvalidConfig`] for a bad configuration,
    /// [`StoreError::Io`] or [`StoreError::Lock`] if the directories or
    /// record files are not accessible.
    pub fn open(config: WorkspaceConfig) -> StoreResult<Self> {
        let config = Arc::new(config.validate()?);

        for dir in [config.data_path(), config.customers_path()] {
            fs::create_dir_all(&dir)
                .map_err(|e| StoreError::io(format!("creating {}", dir.display()), e))?;
        }

        let folders = FolderManager::new(Arc::clone(&config));
        let customers = RecordStore::open(config.customer_file_path(), &config)?
            .with_folders(folders.clone());
        let projects = RecordStore::open(config.project_file_path(), &config)?
            .with_folders(folders.clone());

        info!(
            root = %config.workspace_root.display(),
            customers = customers.len(),
            projects = projects.len(),
            "opened workspace"
        );

        Ok(Self {
            config,
            folders,
            customers,
            projects,
        })
    }

    /// The workspace configuration.
    #[must_use]
    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// The folder manager shared by both stores.
    #[must_use]
    pub fn folders(&self) -> &FolderManager {
        &self.folders
    }

    /// The customer store.
    #[must_use]
    pub fn customers(&self) -> &RecordStore<Customer> {
        &self.customers
    }

    /// The project store.
    #[must_use]
    pub fn projects(&self) -> &RecordStore<Project> {
        &self.projects
    }

    /// Cached projects belonging to one customer, ascending by project id.
    #[must_use]
    pub fn projects_for_customer(&self, customer_number: RecordId) -> Vec<Project> {
        self.projects
            .filter(|p| p.customer_number == customer_number)
    }

    /// Canonical folder of a customer.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the customer is unknown.
    pub fn customer_folder(&self, customer_number: RecordId) -> StoreResult<PathBuf> {
        let customer = self.customers.get(customer_number)?;
        Ok(self.folders.canonical_path(&customer))
    }

    /// Makes sure a customer's folder exists, e.g. before opening it in a
    /// file browser. The resulting folder path is persisted.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] or [`StoreError::Io`].
    pub fn ensure_customer_folder(&self, customer_number: RecordId) -> StoreResult<FolderOutcome> {
        self.customers.ensure_folder(customer_number)
    }

    /// Makes sure a project's folder exists. The resulting folder path is
    /// persisted.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] or [`StoreError::Io`].
    pub fn ensure_project_folder(&self, project_id: RecordId) -> StoreResult<FolderOutcome> {
        self.projects.ensure_folder(project_id)
    }
}
