//! Lock-protected, cached record store.
//!
//! Every mutation runs the same sequence while holding the store's
//! exclusive lock:
//!
//! ```text
//! lock ─→ reload from disk ─→ mutate ─→ save (temp + rename) ─→ swap cache ─→ unlock
//! ```
//!
//! Two callers can therefore never interleave their read-modify-write
//! windows. The lock is taken in two layers: an in-process mutex first,
//! then (optionally) the OS lock file shared with other store instances on
//! the same record file. Both guards are dropped on every exit path.
//!
//! Reads for display use the cache and never block on a writer. The cache
//! only changes after a save succeeded, so a failed mutation is invisible.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use tracing::{debug, warn};

use crate::codec;
use crate::config::WorkspaceConfig;
use crate::error::{StoreError, StoreResult};
use crate::folders::{FolderManager, FolderOutcome};
use crate::record::{Record, RecordId};
use crate::table::RecordTable;

use super::durable::{DurableStore, LoadReport, SkippedRow};
use super::file_lock::FileLock;

/// Result of a successful [`RecordStore::add_or_update`].
#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport<R: Record> {
    /// The record as persisted, with its identity and folder path.
    pub record: R,
    /// What happened to the record's folder, if the store manages folders.
    pub folder: Option<FolderOutcome>,
}

impl<R: Record> SaveReport<R> {
    /// Returns true if the folder step produced a warning-level outcome.
    #[must_use]
    pub fn has_warning(&self) -> bool {
        self.folder.as_ref().is_some_and(FolderOutcome::is_warning)
    }
}

#[derive(Debug)]
struct Cached<R: Record> {
    table: RecordTable<R>,
    skipped: Vec<SkippedRow>,
}

/// One record file behind a cache and an exclusive lock.
#[derive(Debug)]
pub struct RecordStore<R: Record> {
    durable: DurableStore<R>,
    exclusive: Mutex<()>,
    cache: RwLock<Cached<R>>,
    process_lock: bool,
    folders: Option<FolderManager>,
}

impl<R: Record> RecordStore<R> {
    /// Opens the store for `path`.
    ///
    /// Creates the parent directory, removes a temp file left by an
    /// interrupted save, writes a header-only file if none exists and loads
    /// the table into the cache.
    ///
    /// # Errors
    /// [`StoreError::Io`] or [`StoreError::Lock`] if the file or its
    /// directory is not accessible.
    pub fn open(path: impl Into<PathBuf>, config: &WorkspaceConfig) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::io(format!("creating {}", parent.display()), e))?;
        }

        let store = Self {
            durable: DurableStore::new(path, config.sync_on_write),
            exclusive: Mutex::new(()),
            cache: RwLock::new(Cached {
                table: RecordTable::new(),
                skipped: Vec::new(),
            }),
            process_lock: config.process_lock,
            folders: None,
        };

        {
            let _guard = store.lock_exclusive();
            let _file_lock = store.lock_file()?;
            store.durable.remove_stale_temp()?;
            if !store.durable.exists() {
                store.durable.save(&RecordTable::new())?;
                debug!(kind = R::kind().name, path = %store.path().display(), "created empty record file");
            }
            let report = store.durable.load()?;
            store.replace_cache(report.table, report.skipped);
        }

        Ok(store)
    }

    /// Lets the store create and move record folders on save.
    #[must_use]
    pub fn with_folders(mut self, folders: FolderManager) -> Self {
        self.folders = Some(folders);
        self
    }

    /// The record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.durable.path()
    }

    /// The folder manager, if the store manages folders.
    #[must_use]
    pub fn folders(&self) -> Option<&FolderManager> {
        self.folders.as_ref()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Cached snapshot of all records, ascending by identity. May be stale
    /// with respect to other store instances.
    #[must_use]
    pub fn all(&self) -> Vec<R> {
        self.read_cache().table.all()
    }

    /// Cached lookup.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no cached record has this identity.
    pub fn get(&self, id: RecordId) -> StoreResult<R> {
        self.read_cache().table.get(id).cloned()
    }

    /// Cached records matching `predicate`, ascending by identity.
    pub fn filter(&self, predicate: impl Fn(&R) -> bool) -> Vec<R> {
        self.read_cache()
            .table
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    /// Number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_cache().table.len()
    }

    /// Returns true if the cache holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_cache().table.is_empty()
    }

    /// Rows dropped by the most recent load.
    #[must_use]
    pub fn skipped(&self) -> Vec<SkippedRow> {
        self.read_cache().skipped.clone()
    }

    /// Reloads the cache from disk without taking the lock. Saves replace
    /// the file atomically, so this never observes a half-written table.
    ///
    /// Returns the rows that were skipped.
    ///
    /// # Errors
    /// [`StoreError::Io`] if the file cannot be read. The cache is left as
    /// it was.
    pub fn reload(&self) -> StoreResult<Vec<SkippedRow>> {
        let report = self.durable.load()?;
        let skipped = report.skipped.clone();
        self.replace_cache(report.table, report.skipped);
        Ok(skipped)
    }

    /// Lock-protected fresh read of all records. Also refreshes the cache.
    ///
    /// # Errors
    /// [`StoreError::Io`] or [`StoreError::Lock`].
    pub fn all_fresh(&self) -> StoreResult<Vec<R>> {
        let _guard = self.lock_exclusive();
        let _file_lock = self.lock_file()?;
        let report = self.load_complete()?;
        let records = report.table.all();
        self.replace_cache(report.table, report.skipped);
        Ok(records)
    }

    /// Identity the next new record will get, read fresh under the lock.
    ///
    /// Another caller may take the identity before it is used; pass
    /// records with identity `0` to [`RecordStore::add_or_update`] to have
    /// one assigned atomically instead.
    ///
    /// # Errors
    /// [`StoreError::Io`], [`StoreError::Lock`] or
    /// [`StoreError::IdentityExhausted`].
    pub fn next_identity(&self) -> StoreResult<RecordId> {
        let _guard = self.lock_exclusive();
        let _file_lock = self.lock_file()?;
        self.load_complete()?.table.next_identity()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Runs `mutate` on a freshly loaded table and persists the result.
    ///
    /// If `mutate` or the save fails, nothing is written and the cache
    /// keeps its last known-good value.
    ///
    /// # Errors
    /// Whatever `mutate` returns, or [`StoreError::Io`],
    /// [`StoreError::Lock`], [`StoreError::Encode`],
    /// [`StoreError::ReplaceFailed`] from the load and save.
    pub fn with_exclusive<T>(
        &self,
        mutate: impl FnOnce(&mut RecordTable<R>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.transaction(mutate, |_| {})
    }

    /// Replaces the record with the same identity, or adds it. A record
    /// with identity `0` gets the next free identity.
    ///
    /// If the store manages folders, the record's folder is created or
    /// relocated first and its folder path is updated. A relocation is
    /// moved back if the save then fails.
    ///
    /// # Errors
    /// See [`RecordStore::with_exclusive`]; folder I/O failures abort the
    /// save as [`StoreError::Io`].
    pub fn add_or_update(&self, record: R) -> StoreResult<SaveReport<R>> {
        self.persist(false, |_| Ok(record))
    }

    /// Adds a record that must not exist yet.
    ///
    /// # Errors
    /// [`StoreError::IdentityConflict`] if the identity is taken; the
    /// existing record is kept. Otherwise as [`RecordStore::add_or_update`].
    pub fn insert(&self, record: R) -> StoreResult<SaveReport<R>> {
        self.persist(true, |_| Ok(record))
    }

    /// Creates or relocates the folder of a persisted record and saves the
    /// resulting folder path. The record is taken from the fresh load under
    /// the lock, so changes made through other store instances are kept.
    ///
    /// # Errors
    /// - [`StoreError::NotFound`] if the record does not exist
    /// - [`StoreError::InvalidConfig`] if the store does not manage folders
    /// - otherwise as [`RecordStore::add_or_update`]
    pub fn ensure_folder(&self, id: RecordId) -> StoreResult<FolderOutcome> {
        let unmanaged =
            || StoreError::invalid_config(format!("{} store does not manage folders", R::kind().name));
        if self.folders.is_none() {
            return Err(unmanaged());
        }
        self.persist(false, |table| table.get(id).cloned())?
            .folder
            .ok_or_else(unmanaged)
    }

    /// Removes a record and persists the table. The record's folder is
    /// never touched. Returns false if the record did not exist.
    ///
    /// # Errors
    /// See [`RecordStore::with_exclusive`].
    pub fn delete(&self, id: RecordId) -> StoreResult<bool> {
        self.with_exclusive(|table| Ok(table.delete(id)))
    }

    /// Replaces the whole table with `records`. Records with identity `0`
    /// are numbered after the highest explicit identity.
    ///
    /// # Errors
    /// See [`RecordStore::with_exclusive`].
    pub fn save_all(&self, records: Vec<R>) -> StoreResult<()> {
        self.with_exclusive(|table| {
            let (assigned, unassigned): (Vec<R>, Vec<R>) =
                records.into_iter().partition(|r| r.id() != 0);

            let mut fresh: RecordTable<R> = assigned.into_iter().collect();
            for mut record in unassigned {
                fresh.assign_identity(&mut record)?;
                fresh.upsert(record)?;
            }
            *table = fresh;
            Ok(())
        })
    }

    /// Saves the record `select` picks from the freshly loaded table (or
    /// builds itself), with identity assignment and folder sync.
    fn persist(
        &self,
        strict: bool,
        select: impl FnOnce(&RecordTable<R>) -> StoreResult<R>,
    ) -> StoreResult<SaveReport<R>> {
        let folders = self.folders.as_ref();

        self.transaction(
            |table| {
                let mut record = select(table)?;
                let id = table.assign_identity(&mut record)?;
                // Cache and report hold what the file will hold.
                let mut record = codec::normalize(&record)?;
                let previous = table.get(id).ok().cloned();
                if strict && previous.is_some() {
                    return Err(StoreError::IdentityConflict {
                        kind: R::kind().name,
                        id,
                    });
                }

                let folder = match folders {
                    Some(manager) => Some(manager.sync(previous.as_ref(), &mut record)?),
                    None => None,
                };

                table.upsert(record.clone())?;
                Ok(SaveReport { record, folder })
            },
            |report: &SaveReport<R>| {
                if let (Some(manager), Some(outcome)) = (folders, &report.folder) {
                    if let Err(e) = manager.undo(outcome) {
                        warn!(
                            kind = R::kind().name,
                            id = report.record.id(),
                            error = %e,
                            "could not roll back folder relocation"
                        );
                    }
                }
            },
        )
    }

    /// The read-modify-write core. `rollback` sees the mutation's result if
    /// the save fails after a successful mutation.
    fn transaction<T>(
        &self,
        mutate: impl FnOnce(&mut RecordTable<R>) -> StoreResult<T>,
        rollback: impl FnOnce(&T),
    ) -> StoreResult<T> {
        let _guard = self.lock_exclusive();
        let _file_lock = self.lock_file()?;

        let report = self.load_complete()?;
        let mut table = report.table;
        let result = mutate(&mut table)?;

        let saved = table
            .iter()
            .map(codec::normalize)
            .collect::<StoreResult<RecordTable<R>>>()
            .and_then(|table| self.durable.save(&table).map(|()| table));
        let table = match saved {
            Ok(table) => table,
            Err(e) => {
                debug!(kind = R::kind().name, error = %e, "save failed, cache unchanged");
                rollback(&result);
                return Err(e);
            }
        };

        self.replace_cache(table, report.skipped);
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn lock_exclusive(&self) -> MutexGuard<'_, ()> {
        // The mutex guards no data, so a panic while holding it leaves
        // nothing inconsistent.
        let guard = self.exclusive.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(kind = R::kind().name, "acquired store lock");
        guard
    }

    fn lock_file(&self) -> StoreResult<Option<FileLock>> {
        if !self.process_lock {
            return Ok(None);
        }
        FileLock::acquire(self.path())
            .map(Some)
            .map_err(|source| StoreError::Lock {
                path: FileLock::lock_path_for(self.path()),
                source,
            })
    }

    /// Loads for a write. A read that stopped early is an error here: saving
    /// the partial table would drop every row after the failure.
    fn load_complete(&self) -> StoreResult<LoadReport<R>> {
        let mut report = self.durable.load()?;
        match report.read_error.take() {
            Some(e) => Err(StoreError::io(format!("reading {}", self.path().display()), e)),
            None => Ok(report),
        }
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, Cached<R>> {
        // The cache is only ever replaced wholesale, never left half-updated.
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace_cache(&self, table: RecordTable<R>, skipped: Vec<SkippedRow>) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        *cache = Cached { table, skipped };
    }
}
