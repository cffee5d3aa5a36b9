//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by store connections.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint (primary key, unique index) was violated.
    #[error("duplicate key: {detail}")]
    DuplicateKey {
        /// Backend description of the violated constraint.
        detail: String,
    },

    /// A conditional write found the condition false.
    #[error("condition check failed on {storage}")]
    ConditionFailed {
        /// Table the write targeted.
        storage: String,
    },

    /// The call deadline passed before the store answered.
    #[error("deadline exceeded")]
    Timeout,

    /// The caller cancelled the call.
    #[error("call cancelled")]
    Cancelled,

    /// The addressed table or collection does not exist.
    #[error("no such table or collection: {name}")]
    NoSuchStorage {
        /// Name of the missing storage.
        name: String,
    },

    /// The caller aborted a transaction; its writes were rolled back.
    #[error("transaction aborted: {reason}")]
    Aborted {
        /// Why the caller aborted.
        reason: String,
    },

    /// The native query could not be interpreted by the store.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of the problem.
        message: String,
    },

    /// SQLite reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    /// JSON encoding or decoding of a stored value failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Any other backend failure.
    #[error("backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a duplicate key error.
    pub fn duplicate_key(detail: impl Into<String>) -> Self {
        Self::DuplicateKey {
            detail: detail.into(),
        }
    }

    /// Creates a condition failed error.
    pub fn condition_failed(storage: impl Into<String>) -> Self {
        Self::ConditionFailed {
            storage: storage.into(),
        }
    }

    /// Creates a missing storage error.
    pub fn no_such_storage(name: impl Into<String>) -> Self {
        Self::NoSuchStorage { name: name.into() }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Returns true if this error reports a uniqueness violation.
    #[must_use]
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}
