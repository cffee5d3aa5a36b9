//! Types shared by every store family.

use crate::error::StoreResult;
use serde_json::{Map, Value};

/// A native row or document: column/attribute name to value.
pub type Row = Map<String, Value>;

/// A lazily consumed sequence of fetched records.
pub type Cursor<T> = Box<dyn Iterator<Item = StoreResult<T>> + Send>;

/// Wraps already materialized records in a [`Cursor`].
pub fn cursor_from_vec<T: Send + 'static>(records: Vec<T>) -> Cursor<T> {
    Box::new(records.into_iter().map(Ok))
}

/// Read isolation requested for a store transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Statements see data committed before each statement.
    ReadCommitted,
    /// The transaction reads one consistent snapshot and its writes are
    /// acknowledged by a majority (or the backend equivalent).
    #[default]
    Snapshot,
    /// Full serializability.
    Serializable,
}
