//! Workspace configuration.
//!
//! A [`WorkspaceConfig`] is built once at process start and shared read-only
//! by every store and folder manager. Nothing in the crate mutates it after
//! construction.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Paths and durability switches for one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Root directory of the workspace.
    pub workspace_root: PathBuf,
    /// Sub-directory (relative to the root) holding the record files.
    pub data_dir: String,
    /// Sub-directory (relative to the root) holding the customer folders.
    pub customers_dir: String,
    /// File name of the customer table inside `data_dir`.
    pub customer_file: String,
    /// File name of the project table inside `data_dir`.
    pub project_file: String,
    /// Whether to fsync the temp file and its directory before replacing.
    pub sync_on_write: bool,
    /// Whether to hold an OS advisory lock file during read-modify-write.
    pub process_lock: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("PixFrameWorkspace"),
            data_dir: "Data".to_string(),
            customers_dir: "Customers".to_string(),
            customer_file: "customers.csv".to_string(),
            project_file: "projects.csv".to_string(),
            sync_on_write: true,
            process_lock: true,
        }
    }
}

impl WorkspaceConfig {
    /// Creates a configuration rooted at `root` with default sub-paths.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: root.into(),
            ..Self::default()
        }
    }

    /// Disables fsync on save. Only sensible for tests and scratch data.
    #[must_use]
    pub fn without_sync(mut self) -> Self {
        self.sync_on_write = false;
        self
    }

    /// Checks that every configured name is a single path component.
    pub fn validate(self) -> StoreResult<Self> {
        if self.workspace_root.as_os_str().is_empty() {
            return Err(StoreError::invalid_config("workspace_root must not be empty"));
        }

        for (field, value) in [
            ("data_dir", &self.data_dir),
            ("customers_dir", &self.customers_dir),
            ("customer_file", &self.customer_file),
            ("project_file", &self.project_file),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::invalid_config(format!("{field} must not be empty")));
            }
            if value.contains(['/', '\\']) || value == "." || value == ".." {
                return Err(StoreError::invalid_config(format!(
                    "{field} must be a single path component (got '{value}')"
                )));
            }
        }

        if self.customer_file == self.project_file {
            return Err(StoreError::invalid_config(
                "customer_file and project_file must differ",
            ));
        }

        Ok(self)
    }

    /// Parses a configuration from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| StoreError::invalid_config(format!("malformed config: {e}")))?;
        cfg.validate()
    }

    /// Renders the configuration as pretty JSON.
    pub fn to_json(&self) -> StoreResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::encode(format!("config serialization failed: {e}")))
    }

    /// Directory holding the record files.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.workspace_root.join(&self.data_dir)
    }

    /// Directory holding the customer folders.
    #[must_use]
    pub fn customers_path(&self) -> PathBuf {
        self.workspace_root.join(&self.customers_dir)
    }

    /// Full path of the customer table.
    #[must_use]
    pub fn customer_file_path(&self) -> PathBuf {
        self.data_path().join(&self.customer_file)
    }

    /// Full path of the project table.
    #[must_use]
    pub fn project_file_path(&self) -> PathBuf {
        self.data_path().join(&self.project_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let cfg = WorkspaceConfig::new("/srv/studio");
        assert_eq!(cfg.data_path(), PathBuf::from("/srv/studio/Data"));
        assert_eq!(cfg.customers_path(), PathBuf::from("/srv/studio/Customers"));
        assert_eq!(
            cfg.customer_file_path(),
            PathBuf::from("/srv/studio/Data/customers.csv")
        );
        assert_eq!(
            cfg.project_file_path(),
            PathBuf::from("/srv/studio/Data/projects.csv")
        );
        assert!(cfg.sync_on_write);
    }

    #[test]
    fn test_validate_rejects_nested_names() {
        let mut cfg = WorkspaceConfig::new("/srv/studio");
        cfg.data_dir = "Data/sub".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(format!("{err}").contains("data_dir"));
    }

    #[test]
    fn test_validate_rejects_same_file_names() {
        let mut cfg = WorkspaceConfig::new("/srv/studio");
        cfg.project_file = cfg.customer_file.clone();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_root() {
        let cfg = WorkspaceConfig::new("");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let cfg = WorkspaceConfig::from_json(r#"{"workspace_root": "/tmp/ws", "sync_on_write": false}"#)
            .unwrap();
        assert_eq!(cfg.workspace_root, PathBuf::from("/tmp/ws"));
        assert_eq!(cfg.customers_dir, "Customers");
        assert!(!cfg.sync_on_write);
        assert!(cfg.process_lock);
    }

    #[test]
    fn test_json_roundtrip() {
        let cfg = WorkspaceConfig::new("/tmp/ws").without_sync();
        let json = cfg.to_json().unwrap();
        assert_eq!(WorkspaceConfig::from_json(&json).unwrap(), cfg);
    }

    #[test]
    fn test_json_malformed() {
        let err = WorkspaceConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig { .. }));
    }
}
