//! The filter compiler contract.

use crate::error::DaoResult;
use crate::filter::FilterNode;

/// Renders filter trees into one backend's native query shape.
///
/// Implementations must:
/// - compile `None` to a query matching every record,
/// - handle every [`FilterNode`] variant with an exhaustive match,
/// - reject empty `And`/`Or` nodes with [`crate::DaoError::InvalidFilter`],
/// - preserve the tree's grouping,
/// - translate every field name with the row mapper of `storage_id`.
///
/// Compilation is pure; it never mutates the tree.
pub trait FilterCompiler {
    /// Native query representation.
    type Query;

    /// Compiles `filter` for `storage_id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DaoError::InvalidFilter`] for trees the backend
    /// cannot express.
    fn compile(&self, storage_id: &str, filter: Option<&FilterNode>) -> DaoResult<Self::Query>;
}
