//! Folder lifecycle for stored records.
//!
//! Every record owns one directory whose location is derived from its
//! identity fields. The manager creates that directory with a fixed
//! skeleton the first time it is needed, and moves it when the derived
//! name changes. It never deletes and never overwrites an occupied target.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tracing::{info, warn};

use crate::config::WorkspaceConfig;
use crate::error::{StoreError, StoreResult};
use crate::record::Record;

/// Fixed folder skeleton of one record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderSpec {
    /// Subdirectories created inside every record folder.
    pub subfolders: &'static [&'static str],
    /// Name of the informational text file.
    pub info_file: &'static str,
}

/// Result of [`FolderManager::relocate_if_needed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relocation {
    /// Old and new path are the same.
    Unchanged,
    /// The directory tree was moved.
    Moved { from: PathBuf, to: PathBuf },
    /// Nothing exists at the old path, so there was nothing to move.
    SourceMissing { from: PathBuf },
    /// The target is occupied; both directories were left as they are.
    Conflict { from: PathBuf, to: PathBuf },
}

/// What happened to a record's folder during a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderOutcome {
    /// The folder and its skeleton were created.
    Created(PathBuf),
    /// The folder already existed where the record says it is.
    Unchanged(PathBuf),
    /// The folder followed a change of its derived name.
    Relocated { from: PathBuf, to: PathBuf },
    /// The derived name changed but the new location is occupied. The
    /// record keeps `kept`.
    Conflict { kept: PathBuf, wanted: PathBuf },
    /// The record points at an existing folder under an older naming
    /// convention. It is left alone.
    LegacyKept { kept: PathBuf, canonical: PathBuf },
}

impl FolderOutcome {
    /// The folder the record refers to after the save.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Created(p) | Self::Unchanged(p) => p,
            Self::Relocated { to, .. } => to,
            Self::Conflict { kept, .. } | Self::LegacyKept { kept, .. } => kept,
        }
    }

    /// Returns true for outcomes a caller should surface as a warning.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::LegacyKept { .. })
    }
}

/// Creates and moves record folders under one workspace.
#[derive(Debug, Clone)]
pub struct FolderManager {
    config: Arc<WorkspaceConfig>,
}

impl FolderManager {
    /// Creates a manager for the given workspace.
    #[must_use]
    pub fn new(config: Arc<WorkspaceConfig>) -> Self {
        Self { config }
    }

    /// The workspace this manager operates on.
    #[must_use]
    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Folder derived from the record's identity fields.
    #[must_use]
    pub fn canonical_path<R: Record>(&self, record: &R) -> PathBuf {
        record.canonical_folder(&self.config)
    }

    /// Creates the record's canonical folder, its subfolders and the info
    /// file, unless the folder already exists. Idempotent.
    ///
    /// # Errors
    /// [`StoreError::Io`] if any directory or the info file cannot be
    /// written.
    pub fn ensure_created<R: Record>(&self, record: &R) -> StoreResult<FolderOutcome> {
        let path = self.canonical_path(record);
        self.ensure_at(record, path)
    }

    fn ensure_at<R: Record>(&self, record: &R, path: PathBuf) -> StoreResult<FolderOutcome> {
        if path.is_dir() {
            return Ok(FolderOutcome::Unchanged(path));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StoreError::io(format!("creating {}", parent.display()), e)
            })?;
        }
        match fs::create_dir(&path) {
            Ok(()) => {}
            // Somebody else won the race; their skeleton stands.
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Ok(FolderOutcome::Unchanged(path));
            }
            Err(e) => {
                return Err(StoreError::io(format!("creating {}", path.display()), e));
            }
        }

        let spec = R::kind().folders;
        for sub in spec.subfolders {
            let sub_path = path.join(sub);
            fs::create_dir_all(&sub_path).map_err(|e| {
                StoreError::io(format!("creating {}", sub_path.display()), e)
            })?;
        }

        let info_path = path.join(spec.info_file);
        let text = record.info_text(Local::now().naive_local());
        fs::write(&info_path, text)
            .map_err(|e| StoreError::io(format!("writing {}", info_path.display()), e))?;

        info!(kind = R::kind().name, id = record.id(), path = %path.display(), "created record folder");
        Ok(FolderOutcome::Created(path))
    }

    /// Moves `old` to `new` if `old` exists and `new` does not.
    ///
    /// An occupied target is reported as [`Relocation::Conflict`], never
    /// overwritten.
    ///
    /// # Errors
    /// [`StoreError::Io`] if the rename itself fails.
    pub fn relocate_if_needed(&self, old: &Path, new: &Path) -> StoreResult<Relocation> {
        if old == new {
            return Ok(Relocation::Unchanged);
        }
        if !old.exists() {
            return Ok(Relocation::SourceMissing {
                from: old.to_path_buf(),
            });
        }
        if new.exists() {
            warn!(from = %old.display(), to = %new.display(), "relocation target occupied, keeping old folder");
            return Ok(Relocation::Conflict {
                from: old.to_path_buf(),
                to: new.to_path_buf(),
            });
        }

        if let Some(parent) = new.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::io(format!("creating {}", parent.display()), e))?;
        }
        fs::rename(old, new).map_err(|e| {
            StoreError::io(format!("moving {} to {}", old.display(), new.display()), e)
        })?;

        info!(from = %old.display(), to = %new.display(), "relocated record folder");
        Ok(Relocation::Moved {
            from: old.to_path_buf(),
            to: new.to_path_buf(),
        })
    }

    /// Brings `record`'s folder in line with its identity fields and
    /// updates its cached folder path.
    ///
    /// `previous` is the persisted version of the same record, if any. A
    /// folder is only moved when the previous derived path differs from the
    /// new one and the record still points at the previous derived path;
    /// folders under any other name are left where they are.
    pub(crate) fn sync<R: Record>(
        &self,
        previous: Option<&R>,
        record: &mut R,
    ) -> StoreResult<FolderOutcome> {
        if record.folder_path().is_empty() {
            if let Some(prev) = previous {
                record.set_folder_path(prev.folder_path().to_string());
            }
        }

        let canonical = self.canonical_path(record);
        let stored = PathBuf::from(record.folder_path());

        if let Some(prev) = previous {
            let old_canonical = self.canonical_path(prev);
            if old_canonical != canonical && stored == old_canonical {
                match self.relocate_if_needed(&old_canonical, &canonical)? {
                    Relocation::Moved { from, to } => {
                        record.set_folder_path(path_string(&to));
                        return Ok(FolderOutcome::Relocated { from, to });
                    }
                    Relocation::Conflict { from, to } => {
                        return Ok(FolderOutcome::Conflict { kept: from, wanted: to });
                    }
                    Relocation::SourceMissing { .. } | Relocation::Unchanged => {}
                }
            }
        }

        if !record.folder_path().is_empty() && stored != canonical && stored.is_dir() {
            warn!(
                kind = R::kind().name,
                id = record.id(),
                kept = %stored.display(),
                canonical = %canonical.display(),
                "record folder uses a different naming convention, leaving it in place"
            );
            return Ok(FolderOutcome::LegacyKept { kept: stored, canonical });
        }

        let outcome = self.ensure_at(record, canonical)?;
        record.set_folder_path(path_string(outcome.path()));
        Ok(outcome)
    }

    /// Reverses a relocation performed by [`FolderManager::sync`]. Used when
    /// the table save that followed it failed.
    pub(crate) fn undo(&self, outcome: &FolderOutcome) -> StoreResult<()> {
        if let FolderOutcome::Relocated { from, to } = outcome {
            fs::rename(to, from).map_err(|e| {
                StoreError::io(format!("moving {} back to {}", to.display(), from.display()), e)
            })?;
            info!(from = %to.display(), to = %from.display(), "rolled back folder relocation");
        }
        Ok(())
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::{Customer, CUSTOMER_SUBFOLDERS};
    use crate::project::Project;
    use tempfile::tempdir;

    fn manager(root: &Path) -> FolderManager {
        FolderManager::new(Arc::new(WorkspaceConfig::new(root)))
    }

    fn customer(id: u32) -> Customer {
        let mut c = Customer::new("Ana", "Lopez");
        c.customer_number = id;
        c
    }

    #[test]
    fn test_ensure_created_builds_skeleton() {
        let dir = tempdir().unwrap();
        let folders = manager(dir.path());

        let outcome = folders.ensure_created(&customer(1000)).unwrap();
        let path = dir.path().join("Customers").join("C_1000");
        assert_eq!(outcome, FolderOutcome::Created(path.clone()));

        for sub in CUSTOMER_SUBFOLDERS {
            assert!(path.join(sub).is_dir(), "{sub}");
        }
        let info = fs::read_to_string(path.join("Kundeninfo.txt")).unwrap();
        assert!(info.contains("Kundennummer: 1000"));
    }

    #[test]
    fn test_ensure_created_is_idempotent() {
        let dir = tempdir().unwrap();
        let folders = manager(dir.path());
        let c = customer(1000);

        folders.ensure_created(&c).unwrap();
        let info = folders.canonical_path(&c).join("Kundeninfo.txt");
        fs::write(&info, "edited by hand").unwrap();

        let outcome = folders.ensure_created(&c).unwrap();
        assert!(matches!(outcome, FolderOutcome::Unchanged(_)));
        assert_eq!(fs::read_to_string(&info).unwrap(), "edited by hand");
    }

    #[test]
    fn test_relocate_same_path_is_noop() {
        let dir = tempdir().unwrap();
        let folders = manager(dir.path());
        let path = dir.path().join("Customers").join("C_1000");
        assert_eq!(folders.relocate_if_needed(&path, &path).unwrap(), Relocation::Unchanged);
    }

    #[test]
    fn test_relocate_moves_tree() {
        let dir = tempdir().unwrap();
        let folders = manager(dir.path());
        let old = dir.path().join("old");
        let new = dir.path().join("nested").join("new");
        fs::create_dir_all(old.join("sub")).unwrap();
        fs::write(old.join("sub").join("f.txt"), "x").unwrap();

        let result = folders.relocate_if_needed(&old, &new).unwrap();
        assert_eq!(result, Relocation::Moved { from: old.clone(), to: new.clone() });
        assert!(!old.exists());
        assert_eq!(fs::read_to_string(new.join("sub").join("f.txt")).unwrap(), "x");
    }

    #[test]
    fn test_relocate_conflict_leaves_both() {
        let dir = tempdir().unwrap();
        let folders = manager(dir.path());
        let old = dir.path().join("old");
        let new = dir.path().join("new");
        fs::create_dir_all(&old).unwrap();
        fs::create_dir_all(&new).unwrap();

        let result = folders.relocate_if_needed(&old, &new).unwrap();
        assert!(matches!(result, Relocation::Conflict { .. }));
        assert!(old.is_dir());
        assert!(new.is_dir());
    }

    #[test]
    fn test_relocate_missing_source() {
        let dir = tempdir().unwrap();
        let folders = manager(dir.path());
        let result = folders
            .relocate_if_needed(&dir.path().join("nope"), &dir.path().join("new"))
            .unwrap();
        assert!(matches!(result, Relocation::SourceMissing { .. }));
        assert!(!dir.path().join("new").exists());
    }

    #[test]
    fn test_sync_moves_renamed_project() {
        let dir = tempdir().unwrap();
        let folders = manager(dir.path());

        let mut original = Project::new(1000, "Shooting");
        original.project_id = 3;
        let created = folders.sync(None, &mut original).unwrap();
        assert!(matches!(created, FolderOutcome::Created(_)));

        let mut renamed = original.clone();
        renamed.project_name = "Shooting Studio".to_string();
        let outcome = folders.sync(Some(&original), &mut renamed).unwrap();

        let expected = dir
            .path()
            .join("Customers/C_1000/01_Projekte/P_3_Shooting_Studio");
        assert!(matches!(outcome, FolderOutcome::Relocated { .. }));
        assert_eq!(PathBuf::from(&renamed.folder_path), expected);
        assert!(expected.join("Projektinfo.txt").is_file());
        assert!(!Path::new(&original.folder_path).exists());
    }

    #[test]
    fn test_sync_conflict_keeps_old_path() {
        let dir = tempdir().unwrap();
        let folders = manager(dir.path());

        let mut original = Project::new(1000, "A");
        original.project_id = 3;
        folders.sync(None, &mut original).unwrap();

        let mut renamed = original.clone();
        renamed.project_name = "B".to_string();
        fs::create_dir_all(folders.canonical_path(&renamed)).unwrap();

        let outcome = folders.sync(Some(&original), &mut renamed).unwrap();
        assert!(outcome.is_warning());
        assert_eq!(renamed.folder_path, original.folder_path);
    }

    #[test]
    fn test_sync_leaves_legacy_folder() {
        let dir = tempdir().unwrap();
        let folders = manager(dir.path());
        let legacy = dir.path().join("Customers").join("C_1000_Lopez_Ana");
        fs::create_dir_all(&legacy).unwrap();

        let mut c = customer(1000);
        c.folder_path = path_string(&legacy);
        let outcome = folders.sync(None, &mut c).unwrap();

        assert!(matches!(outcome, FolderOutcome::LegacyKept { .. }));
        assert_eq!(PathBuf::from(&c.folder_path), legacy);
        assert!(!dir.path().join("Customers").join("C_1000").exists());
    }

    #[test]
    fn test_sync_inherits_previous_folder_path() {
        let dir = tempdir().unwrap();
        let folders = manager(dir.path());

        let mut saved = customer(1000);
        folders.sync(None, &mut saved).unwrap();

        let mut edited = customer(1000);
        edited.city = "Hamburg".to_string();
        let outcome = folders.sync(Some(&saved), &mut edited).unwrap();
        assert!(matches!(outcome, FolderOutcome::Unchanged(_)));
        assert_eq!(edited.folder_path, saved.folder_path);
    }

    #[test]
    fn test_undo_relocation() {
        let dir = tempdir().unwrap();
        let folders = manager(dir.path());
        let from = dir.path().join("a");
        let to = dir.path().join("b");
        fs::create_dir_all(&to).unwrap();

        folders
            .undo(&FolderOutcome::Relocated { from: from.clone(), to: to.clone() })
            .unwrap();
        assert!(from.is_dir());
        assert!(!to.exists());
    }
}
