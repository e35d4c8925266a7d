//! The contract every stored record kind implements.
//!
//! The store, table, codec and folder manager are generic over [`Record`].
//! What differs between kinds (schema, identity floor, folder layout) lives
//! in one static [`KindSpec`] value per kind rather than in the generic code.

use std::fmt::Debug;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::codec::{Row, Schema, Value};
use crate::config::WorkspaceConfig;
use crate::folders::FolderSpec;

/// Integer identity of a record. `0` means "not yet assigned".
pub type RecordId = u32;

/// Per-kind constants.
#[derive(Debug, Clone, Copy)]
pub struct KindSpec {
    /// Lower-case kind name used in messages and logs.
    pub name: &'static str,
    /// First identity handed out by an empty table.
    pub identity_floor: RecordId,
    /// Column layouts.
    pub schema: Schema,
    /// Folder skeleton created for each record.
    pub folders: FolderSpec,
}

/// A record kind the store can persist.
pub trait Record: Debug + Clone + PartialEq + Send + Sync + 'static {
    /// Static description of the kind.
    fn kind() -> &'static KindSpec;

    /// The record's identity, `0` if unassigned.
    fn id(&self) -> RecordId;

    /// Assigns the identity. Only the store calls this.
    fn set_id(&mut self, id: RecordId);

    /// Cached folder path, empty if none was created yet.
    fn folder_path(&self) -> &str;

    /// Updates the cached folder path.
    fn set_folder_path(&mut self, path: String);

    /// Field values in the current column order.
    fn to_values(&self) -> Vec<Value>;

    /// Builds a record from a decoded row, upgrading older layouts.
    fn from_row(row: Row) -> Self;

    /// Canonical folder derived from the identity fields.
    fn canonical_folder(&self, config: &WorkspaceConfig) -> PathBuf;

    /// Contents of the informational text file written on folder creation.
    fn info_text(&self, created_at: NaiveDateTime) -> String;
}

/// Strips characters that are not allowed in file names on common
/// platforms. Empty input becomes `Unknown`.
#[must_use]
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') && !c.is_control())
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();

    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "Unknown".to_string()
    } else {
        cleaned
    }
}
