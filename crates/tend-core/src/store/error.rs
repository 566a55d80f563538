//! Store error handling
//!
//! Typed errors for store operations. Validation and not-found conditions
//! are structured so both the CLI and the agent surface can map them to
//! their own error shapes without string matching.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::codec::ParseError;

/// A rejected create or patch, naming the offending field
#[derive(Error, Debug)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record with the given id in the index
    #[error("record not found: {id}")]
    NotFound { id: Uuid },

    /// The operation would leave the record invalid; nothing was written
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A record file on disk could not be decoded
    #[error("failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    /// Failed to create the data or archive directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk failure during a read, write, or relocation; the previously
    /// committed file version remains intact
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors the caller should surface as "bad request" rather
    /// than "store broken"
    pub fn is_caller_error(&self) -> bool {
        matches!(self, StoreError::NotFound { .. } | StoreError::Validation(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_names_field() {
        let err = ValidationError::new("title", "must not be empty");
        assert_eq!(err.to_string(), "invalid title: must not be empty");
    }

    #[test]
    fn test_caller_error_classification() {
        assert!(StoreError::NotFound { id: Uuid::new_v4() }.is_caller_error());
        assert!(StoreError::Validation(ValidationError::new("status", "bad")).is_caller_error());
        assert!(!StoreError::io("/tmp/x", io::Error::new(io::ErrorKind::Other, "boom"))
            .is_caller_error());
    }
}
