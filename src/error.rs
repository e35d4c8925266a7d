//! Error types for the record store.
//!
//! Errors are split by how far they are allowed to travel:
//! - [`DecodeError`] describes a single bad row. It never escapes a load;
//!   the row is skipped and reported alongside the table.
//! - [`StoreError`] is everything a caller of a store operation can see.
//!
//! Both are strongly typed using thiserror so callers can match on the
//! specific condition instead of parsing messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::record::RecordId;

/// Row-level decode failures. Always non-fatal to a load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("row has {found} columns, at least {required} required")]
    TooFewColumns {
        found: usize,
        required: usize,
    },

    #[error("identity field '{field}' has invalid value '{value}'")]
    InvalidIdentity {
        field: &'static str,
        value: String,
    },

    #[error("identity {id} already present in an earlier row")]
    DuplicateIdentity {
        id: RecordId,
    },

    #[error("quoted field is not terminated")]
    UnterminatedQuote,

    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors surfaced by store, table and folder operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Encode error: {message}")]
    Encode {
        message: String,
    },

    #[error("Failed to replace {}: {source}", path.display())]
    ReplaceFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{kind} {id} already exists")]
    IdentityConflict {
        kind: &'static str,
        id: RecordId,
    },

    #[error("{kind} has no identity assigned")]
    Unassigned {
        kind: &'static str,
    },

    #[error("no {kind} identity left above the current maximum")]
    IdentityExhausted {
        kind: &'static str,
    },

    #[error("{kind} {id} not found")]
    NotFound {
        kind: &'static str,
        id: RecordId,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        message: String,
    },

    #[error("Failed to acquire lock on {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// Wraps an I/O error with a short description of what was being done.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates an encode error.
    #[must_use]
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true for disk or permission failures.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Lock { .. })
    }

    /// Returns true if the atomic replace step failed.
    #[must_use]
    pub const fn is_replace_failed(&self) -> bool {
        matches!(self, Self::ReplaceFailed { .. })
    }

    /// Returns true if an insert collided with an existing identity.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::IdentityConflict { .. })
    }

    /// Returns true if the addressed record does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_too_few_columns() {
        let err = DecodeError::TooFewColumns { found: 4, required: 11 };
        let msg = format!("{err}");
        assert!(msg.contains('4'));
        assert!(msg.contains("11"));
    }

    #[test]
    fn test_decode_error_invalid_identity() {
        let err = DecodeError::InvalidIdentity {
            field: "CustomerNumber",
            value: "abc".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("CustomerNumber"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn test_store_error_io_context() {
        let err = StoreError::io(
            "writing customers.csv.tmp",
            io::Error::new(io::ErrorKind::Other, "disk full"),
        );
        assert!(err.is_io());
        let msg = format!("{err}");
        assert!(msg.contains("customers.csv.tmp"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_store_error_predicates() {
        let conflict = StoreError::IdentityConflict { kind: "customer", id: 1000 };
        assert!(conflict.is_conflict());
        assert!(!conflict.is_io());
        assert!(format!("{conflict}").contains("customer 1000"));

        let missing = StoreError::NotFound { kind: "project", id: 7 };
        assert!(missing.is_not_found());
        assert!(!missing.is_conflict());

        let replace = StoreError::ReplaceFailed {
            path: PathBuf::from("projects.csv"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(replace.is_replace_failed());
        assert!(format!("{replace}").contains("projects.csv"));
    }
}
