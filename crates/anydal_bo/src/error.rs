//! Error types for the business-object crate.

use thiserror::Error;

/// Result type for business-object operations.
pub type BoResult<T> = Result<T, BoError>;

/// Errors that can occur while addressing or converting attribute values.
#[derive(Debug, Error)]
pub enum BoError {
    /// The attribute path is syntactically invalid.
    #[error("malformed path {path:?}: {reason}")]
    MalformedPath {
        /// The offending path.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A write needs a container where a non-null scalar already lives.
    #[error("path {path:?} conflicts with existing {found} value")]
    PathConflict {
        /// The path being written.
        path: String,
        /// Kind of the value that blocks the write.
        found: &'static str,
    },

    /// A stored value cannot be converted to the requested type.
    #[error("cannot convert {found} value to {target}: {reason}")]
    Coercion {
        /// Kind of the stored value.
        found: &'static str,
        /// Requested target type.
        target: &'static str,
        /// Why the conversion was refused.
        reason: String,
    },

    /// The root value is not a map where one is required.
    #[error("business object root is {found}, expected a map")]
    NotAMap {
        /// Kind of the actual root.
        found: &'static str,
    },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A time string did not match the requested layout.
    #[error("cannot parse {value:?} with layout {layout:?}: {source}")]
    Time {
        /// The stored string.
        value: String,
        /// The chrono format string.
        layout: String,
        /// Underlying parse failure.
        source: chrono::ParseError,
    },
}

impl BoError {
    /// Creates a malformed path error.
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a coercion error.
    pub fn coercion(found: &'static str, target: &'static str, reason: impl Into<String>) -> Self {
        Self::Coercion {
            found,
            target,
            reason: reason.into(),
        }
    }
}
