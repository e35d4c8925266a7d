//! File-backed storage for record tables.
//!
//! - [`durable`]: load a table from a file, save it with an atomic replace
//! - [`file_lock`]: OS advisory lock shared by every store instance on a file
//! - [`guard`]: [`RecordStore`], the cached, lock-protected store callers use

pub mod durable;
pub mod file_lock;
pub mod guard;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub use durable::{DurableStore, LoadReport, SkippedRow, TableWriter};
pub use file_lock::FileLock;
pub use guard::{RecordStore, SaveReport};

/// `<dir>/<name><suffix>` for a file at `<dir>/<name>`.
pub(crate) fn sibling_path(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target
        .file_name()
        .map_or_else(OsString::new, ToOwned::to_owned);
    name.push(suffix);
    target.with_file_name(name)
}
