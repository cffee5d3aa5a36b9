//! Error types for DAO operations.

use anydal_bo::BoError;
use anydal_storage::StoreError;
use thiserror::Error;
use tracing::warn;

/// Result type for DAO operations.
pub type DaoResult<T> = Result<T, DaoError>;

/// Errors returned by filter compilers, row mappers and DAOs.
///
/// A record that does not exist is never an error: fetches return `None`
/// and writes return a count of `0`.
#[derive(Debug, Error)]
pub enum DaoError {
    /// A uniqueness constraint rejected the write.
    ///
    /// This is the only way any backend reports a uniqueness violation.
    #[error("duplicate entry")]
    DuplicateEntry,

    /// A path or typed read on a business object failed.
    #[error("business object error: {0}")]
    Bo(#[from] BoError),

    /// The store failed; the error is passed through unchanged.
    #[error(transparent)]
    Store(StoreError),

    /// A filter tree cannot be compiled.
    #[error("invalid filter: {message}")]
    InvalidFilter {
        /// Description of the problem.
        message: String,
    },

    /// A business object and a native row cannot be translated.
    #[error("mapping error: {message}")]
    Mapping {
        /// Description of the problem.
        message: String,
    },
}

impl DaoError {
    /// Creates an invalid filter error.
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            message: message.into(),
        }
    }

    /// Creates a mapping error.
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }

    /// Returns true for [`DaoError::DuplicateEntry`].
    #[must_use]
    pub fn is_duplicate_entry(&self) -> bool {
        matches!(self, Self::DuplicateEntry)
    }
}

impl From<StoreError> for DaoError {
    /// Native uniqueness violations collapse into [`DaoError::DuplicateEntry`];
    /// everything else is wrapped as is.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { detail } => {
                warn!(%detail, "native duplicate key mapped to duplicate entry");
                Self::DuplicateEntry
            }
            other => Self::Store(other),
        }
    }
}
