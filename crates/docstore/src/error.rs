//! Typed error types for the docstore crate.
//!
//! [`BackendError`] is what a [`DocumentCollection`](crate::DocumentCollection)
//! implementation returns. [`StoreError`] is what callers of the connector and
//! the [`RecordController`](crate::RecordController) see; it wraps backend
//! failures together with the name of the operation that produced them.

use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;

/// Server error code for a unique-index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

// ---------------------------------------------------------------------------
// BackendError
// ---------------------------------------------------------------------------

/// Failure reported by a collection backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Error from the MongoDB driver.
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// A write would violate a unique index.
    #[error("duplicate key error on index '{index}': {key}")]
    DuplicateKey { index: String, key: String },

    /// The backend does not implement the requested operator or option.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The request was rejected as malformed.
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl BackendError {
    /// `true` when the failure is a unique-index violation.
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            Self::DuplicateKey { .. } => true,
            Self::Mongo(err) => match err.kind.as_ref() {
                ErrorKind::Write(WriteFailure::WriteError(write)) => {
                    write.code == DUPLICATE_KEY_CODE
                }
                ErrorKind::Command(command) => command.code == DUPLICATE_KEY_CODE,
                ErrorKind::BulkWrite(bulk) => bulk
                    .write_errors
                    .iter()
                    .flatten()
                    .any(|e| e.code == DUPLICATE_KEY_CODE),
                _ => false,
            },
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors returned by the connector and the record controller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The client could not be built or the deployment did not answer a ping.
    #[error("connection error ({context}): {source}")]
    Connection {
        context: &'static str,
        #[source]
        source: mongodb::error::Error,
    },

    /// Zero documents matched where exactly one was expected.
    #[error("{operation}: no matching document")]
    NotFound { operation: &'static str },

    /// Query failure other than not-found.
    #[error("{operation}: read failed: {source}")]
    Read {
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    /// Insert, update, delete or index creation failed.
    #[error("{operation}: write failed: {source}")]
    Write {
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    /// A record or attribute set could not be converted to a document.
    #[error("{operation}: cannot serialize to document: {source}")]
    Serialization {
        operation: &'static str,
        #[source]
        source: bson::ser::Error,
    },

    /// A stored document could not be decoded into the record type.
    #[error("{operation}: cannot decode document: {source}")]
    Decoding {
        operation: &'static str,
        #[source]
        source: bson::de::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// `true` for a write rejected by a unique index (including `_id`).
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            Self::Write { source, .. } => source.is_duplicate_key(),
            _ => false,
        }
    }

    /// Name of the controller operation that failed, if any.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Connection { .. } => None,
            Self::NotFound { operation }
            | Self::Read { operation, .. }
            | Self::Write { operation, .. }
            | Self::Serialization { operation, .. }
            | Self::Decoding { operation, .. } => Some(operation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_is_detected_through_write_error() {
        let err = StoreError::Write {
            operation: "create",
            source: BackendError::DuplicateKey {
                index: "_id_".into(),
                key: "{ _id: \"a\" }".into(),
            },
        };
        assert!(err.is_duplicate_key());
        assert!(!err.is_not_found());
        assert_eq!(err.operation(), Some("create"));
    }

    #[test]
    fn read_errors_are_never_duplicate_keys() {
        let err = StoreError::Read {
            operation: "find",
            source: BackendError::DuplicateKey {
                index: "x_1".into(),
                key: "1".into(),
            },
        };
        assert!(!err.is_duplicate_key());
    }

    #[test]
    fn messages_name_the_operation() {
        let err = StoreError::NotFound { operation: "get" };
        assert_eq!(err.to_string(), "get: no matching document");

        let err = StoreError::Write {
            operation: "create_index",
            source: BackendError::Invalid("index must name at least one field".into()),
        };
        assert_eq!(
            err.to_string(),
            "create_index: write failed: invalid request: index must name at least one field"
        );
    }
}
