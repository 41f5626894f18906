//! Store error definitions and their failure classes.

use thiserror::Error;

use crate::resilience::classify::{Classify, FailureClass};

/// Errors raised by a document store driver.
///
/// The four driver conditions the retry policy cares about are kept as
/// distinct variants so they can be classified without string matching.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write violated a unique index.
    #[error("E11000 duplicate key error collection: {namespace} dup key: {key}")]
    DuplicateKey { namespace: String, key: String },

    /// No node could be selected within the driver's selection timeout.
    #[error("No servers available after {timeout_ms} ms: {reason}")]
    ServerSelectionTimeout { timeout_ms: u64, reason: String },

    /// The server rejected or failed an operation.
    #[error("Operation failed (code {code}): {message}")]
    OperationFailure { code: i32, message: String },

    /// The connection dropped; the driver will reconnect on next use.
    #[error("Auto-reconnect: {0}")]
    AutoReconnect(String),

    /// The addressed database or collection does not exist.
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    /// A value could not be converted to or from a document.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A document was structurally invalid for the requested operation.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl StoreError {
    /// Shorthand for an [`StoreError::OperationFailure`] with a generic code.
    pub fn operation_failure(message: impl Into<String>) -> Self {
        Self::OperationFailure {
            code: 1,
            message: message.into(),
        }
    }

    /// Shorthand for an [`StoreError::AutoReconnect`].
    pub fn auto_reconnect(message: impl Into<String>) -> Self {
        Self::AutoReconnect(message.into())
    }
}

impl Classify for StoreError {
    fn failure_class(&self) -> FailureClass {
        match self {
            StoreError::DuplicateKey { .. } | StoreError::ServerSelectionTimeout { .. } => {
                FailureClass::Permanent
            }
            StoreError::OperationFailure { .. } | StoreError::AutoReconnect(_) => {
                FailureClass::Transient
            }
            _ => FailureClass::Unclassified,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let dup = StoreError::DuplicateKey {
            namespace: "db.coll".into(),
            key: "{ _id: 1 }".into(),
        };
        assert_eq!(dup.failure_class(), FailureClass::Permanent);

        let sel = StoreError::ServerSelectionTimeout {
            timeout_ms: 30_000,
            reason: "no primary".into(),
        };
        assert_eq!(sel.failure_class(), FailureClass::Permanent);

        assert_eq!(
            StoreError::operation_failure("interrupted").failure_class(),
            FailureClass::Transient
        );
        assert_eq!(
            StoreError::auto_reconnect("connection reset").failure_class(),
            FailureClass::Transient
        );
        assert_eq!(
            StoreError::NamespaceNotFound("db.missing".into()).failure_class(),
            FailureClass::Unclassified
        );
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::ServerSelectionTimeout {
            timeout_ms: 30_000,
            reason: "localhost:27017: connection refused".into(),
        };
        assert!(err.to_string().contains("30000 ms"));

        let err = StoreError::OperationFailure {
            code: 11600,
            message: "interrupted at shutdown".into(),
        };
        assert_eq!(
            err.to_string(),
            "Operation failed (code 11600): interrupted at shutdown"
        );
    }
}
