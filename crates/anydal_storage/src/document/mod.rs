//! Document store connections (MongoDB-style).
//!
//! Filters, sort specifications and records are all JSON documents.
//! A filter document uses the query operators `$eq`, `$ne`, `$gt`, `$gte`,
//! `$lt`, `$lte`, `$exists`, the logical operators `$and`/`$or`, and `$expr`
//! for field-to-field comparisons. `{field: null}` matches records where the
//! field is null or absent.

mod matcher;
mod memory;

pub use matcher::matches;
pub use memory::MemoryDocumentStore;

use crate::context::CallContext;
use crate::error::StoreResult;
use crate::types::{Cursor, IsolationLevel, Row};
use serde_json::Value;

/// A JSON document.
pub type Document = Row;

/// Options for [`DocumentConnection::find`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Sort document: field to `1` (ascending) or `-1` (descending), in
    /// priority order.
    pub sort: Option<Document>,
    /// Number of matching documents to skip.
    pub skip: u64,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
}

impl FindOptions {
    /// Creates options that return every match in store order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sort document.
    #[must_use]
    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Sets the number of documents to skip.
    #[must_use]
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Sets the maximum number of documents returned.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Result of [`DocumentConnection::replace_one`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaceOutcome {
    /// Documents matched by the filter (0 or 1).
    pub matched_count: u64,
    /// Documents whose content changed.
    pub modified_count: u64,
    /// `_id` of the document inserted by an upsert.
    pub upserted_id: Option<Value>,
}

/// The primitive operations a document DAO needs from its store.
///
/// Every insert or replace that would violate a unique index (always
/// including `_id`) fails with [`crate::StoreError::DuplicateKey`].
pub trait DocumentConnection: Send + Sync {
    /// Returns the first document matching `filter`.
    fn find_one(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
    ) -> StoreResult<Option<Document>>;

    /// Returns every document matching `filter`, honoring `options`.
    fn find(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> StoreResult<Cursor<Document>>;

    /// Inserts one document, returning its `_id`.
    fn insert_one(&self, ctx: &CallContext, collection: &str, doc: Document)
        -> StoreResult<Value>;

    /// Replaces the first document matching `filter`; inserts when nothing
    /// matches and `upsert` is set.
    fn replace_one(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
        doc: Document,
        upsert: bool,
    ) -> StoreResult<ReplaceOutcome>;

    /// Deletes the first document matching `filter`, returning the count.
    fn delete_one(&self, ctx: &CallContext, collection: &str, filter: &Document)
        -> StoreResult<u64>;

    /// Deletes every document matching `filter`, returning the count.
    fn delete_many(&self, ctx: &CallContext, collection: &str, filter: &Document)
        -> StoreResult<u64>;

    /// Runs `body` inside one transaction.
    ///
    /// The connection handed to `body` sees the transaction's own writes.
    /// If `body` fails, none of its writes become visible.
    fn with_transaction(
        &self,
        ctx: &CallContext,
        isolation: IsolationLevel,
        body: &mut dyn FnMut(&dyn DocumentConnection) -> StoreResult<()>,
    ) -> StoreResult<()>;
}
