//! In-memory document store.

use super::{matches, Document, DocumentConnection, FindOptions, ReplaceOutcome};
use crate::compare::{lookup_field, total_order, values_equal};
use crate::config::StoreConfig;
use crate::context::CallContext;
use crate::error::{StoreError, StoreResult};
use crate::types::{cursor_from_vec, Cursor, IsolationLevel};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::trace;

const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, Default)]
struct MemCollection {
    /// Unique indexes besides `_id`, each a list of field names.
    unique_indexes: Vec<Vec<String>>,
    /// Documents in insertion order.
    docs: Vec<Document>,
}

type Collections = HashMap<String, MemCollection>;

/// An in-memory document store.
///
/// Suitable for tests and for ephemeral data. Collections are created on
/// first use. `_id` is always unique; further unique indexes are declared
/// with [`MemoryDocumentStore::create_unique_index`].
///
/// # Thread Safety
///
/// All collections sit behind one reader/writer lock. A transaction holds
/// the write lock for its whole duration and works on a private copy that
/// replaces the live data only on success. Waiting for the lock is bounded
/// by the call's deadline, or by [`StoreConfig::default_timeout`] when the
/// context has none; running out yields [`StoreError::Timeout`].
///
/// # Example
///
/// ```rust
/// use anydal_storage::document::{DocumentConnection, MemoryDocumentStore};
/// use anydal_storage::CallContext;
/// use serde_json::json;
///
/// let store = MemoryDocumentStore::new();
/// let ctx = CallContext::background();
/// let doc = json!({"_id": "1", "name": "a"}).as_object().unwrap().clone();
/// store.insert_one(&ctx, "users", doc.clone()).unwrap();
/// assert!(store.insert_one(&ctx, "users", doc).is_err());
/// ```
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<Collections>,
    config: StoreConfig,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with the given configuration.
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            collections: RwLock::new(Collections::new()),
            config,
        }
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Declares a unique index over `fields` on `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] if existing documents already
    /// violate the index.
    pub fn create_unique_index(&self, collection: &str, fields: &[&str]) -> StoreResult<()> {
        let mut collections = self.collections.write();
        let coll = collections.entry(collection.to_string()).or_default();
        let index: Vec<String> = fields.iter().map(|f| (*f).to_string()).collect();
        for (pos, doc) in coll.docs.iter().enumerate() {
            if let Some(other) = coll.docs[pos + 1..]
                .iter()
                .find(|other| same_key(doc, other, &index))
            {
                return Err(StoreError::duplicate_key(format!(
                    "cannot index {collection} on {index:?}: {:?} repeats",
                    key_of(other, &index)
                )));
            }
        }
        coll.unique_indexes.push(index);
        Ok(())
    }

    /// Returns the number of documents in `collection`.
    #[must_use]
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |coll| coll.docs.len())
    }

    fn read(&self, ctx: &CallContext) -> StoreResult<RwLockReadGuard<'_, Collections>> {
        ctx.check()?;
        let timeout = ctx.effective_timeout(self.config.default_timeout);
        self.collections.try_read_for(timeout).ok_or(StoreError::Timeout)
    }

    fn write(&self, ctx: &CallContext) -> StoreResult<RwLockWriteGuard<'_, Collections>> {
        ctx.check()?;
        let timeout = ctx.effective_timeout(self.config.default_timeout);
        self.collections.try_write_for(timeout).ok_or(StoreError::Timeout)
    }
}

impl DocumentConnection for MemoryDocumentStore {
    fn find_one(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
    ) -> StoreResult<Option<Document>> {
        let collections = self.read(ctx)?;
        let found = find(&collections, collection, filter, &FindOptions::new().limit(1))?;
        Ok(found.into_iter().next())
    }

    fn find(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> StoreResult<Cursor<Document>> {
        let collections = self.read(ctx)?;
        Ok(cursor_from_vec(find(&collections, collection, filter, options)?))
    }

    fn insert_one(
        &self,
        ctx: &CallContext,
        collection: &str,
        doc: Document,
    ) -> StoreResult<Value> {
        insert(&mut *self.write(ctx)?, collection, doc)
    }

    fn replace_one(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
        doc: Document,
        upsert: bool,
    ) -> StoreResult<ReplaceOutcome> {
        replace(&mut *self.write(ctx)?, collection, filter, doc, upsert)
    }

    fn delete_one(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
    ) -> StoreResult<u64> {
        delete(&mut *self.write(ctx)?, collection, filter, false)
    }

    fn delete_many(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
    ) -> StoreResult<u64> {
        delete(&mut *self.write(ctx)?, collection, filter, true)
    }

    fn with_transaction(
        &self,
        ctx: &CallContext,
        isolation: IsolationLevel,
        body: &mut dyn FnMut(&dyn DocumentConnection) -> StoreResult<()>,
    ) -> StoreResult<()> {
        // Every isolation level is served as serializable: the write lock
        // excludes all other readers and writers until commit.
        trace!(?isolation, "begin in-memory document transaction");
        let mut live = self.write(ctx)?;
        let session = TxSession {
            working: Mutex::new(live.clone()),
        };
        body(&session)?;
        ctx.check()?;
        *live = session.working.into_inner();
        trace!("commit in-memory document transaction");
        Ok(())
    }
}

/// A transaction's private view of the collections.
struct TxSession {
    working: Mutex<Collections>,
}

impl DocumentConnection for TxSession {
    fn find_one(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
    ) -> StoreResult<Option<Document>> {
        ctx.check()?;
        let found = find(
            &self.working.lock(),
            collection,
            filter,
            &FindOptions::new().limit(1),
        )?;
        Ok(found.into_iter().next())
    }

    fn find(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> StoreResult<Cursor<Document>> {
        ctx.check()?;
        Ok(cursor_from_vec(find(
            &self.working.lock(),
            collection,
            filter,
            options,
        )?))
    }

    fn insert_one(
        &self,
        ctx: &CallContext,
        collection: &str,
        doc: Document,
    ) -> StoreResult<Value> {
        ctx.check()?;
        insert(&mut self.working.lock(), collection, doc)
    }

    fn replace_one(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
        doc: Document,
        upsert: bool,
    ) -> StoreResult<ReplaceOutcome> {
        ctx.check()?;
        replace(&mut self.working.lock(), collection, filter, doc, upsert)
    }

    fn delete_one(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
    ) -> StoreResult<u64> {
        ctx.check()?;
        delete(&mut self.working.lock(), collection, filter, false)
    }

    fn delete_many(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
    ) -> StoreResult<u64> {
        ctx.check()?;
        delete(&mut self.working.lock(), collection, filter, true)
    }

    fn with_transaction(
        &self,
        _ctx: &CallContext,
        _isolation: IsolationLevel,
        body: &mut dyn FnMut(&dyn DocumentConnection) -> StoreResult<()>,
    ) -> StoreResult<()> {
        // Nested transactions join the enclosing one.
        body(self)
    }
}

fn find(
    collections: &Collections,
    collection: &str,
    filter: &Document,
    options: &FindOptions,
) -> StoreResult<Vec<Document>> {
    let Some(coll) = collections.get(collection) else {
        return Ok(Vec::new());
    };

    let mut hits = Vec::new();
    for doc in &coll.docs {
        if matches(doc, filter)? {
            hits.push(doc.clone());
        }
    }

    if let Some(sort) = &options.sort {
        let keys = sort_keys(sort)?;
        hits.sort_by(|a, b| {
            keys.iter()
                .map(|(field, descending)| {
                    let ord = total_order(lookup_field(a, field), lookup_field(b, field));
                    if *descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
    let limit = options
        .limit
        .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
    Ok(hits.into_iter().skip(skip).take(limit).collect())
}

fn sort_keys(sort: &Document) -> StoreResult<Vec<(String, bool)>> {
    sort.iter()
        .map(|(field, direction)| match direction.as_i64() {
            Some(1) => Ok((field.clone(), false)),
            Some(-1) => Ok((field.clone(), true)),
            _ => Err(StoreError::invalid_query(format!(
                "sort direction for {field} must be 1 or -1"
            ))),
        })
        .collect()
}

fn insert(collections: &mut Collections, collection: &str, mut doc: Document) -> StoreResult<Value> {
    let coll = collections.entry(collection.to_string()).or_default();
    if !doc.contains_key(ID_FIELD) {
        doc.insert(
            ID_FIELD.to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
    }
    check_unique(coll, collection, &doc, None)?;
    let id = doc.get(ID_FIELD).cloned().unwrap_or(Value::Null);
    coll.docs.push(doc);
    Ok(id)
}

fn replace(
    collections: &mut Collections,
    collection: &str,
    filter: &Document,
    mut doc: Document,
    upsert: bool,
) -> StoreResult<ReplaceOutcome> {
    let position = match collections.get(collection) {
        Some(coll) => position_of(coll, filter)?,
        None => None,
    };

    match position {
        Some(pos) => {
            let coll = collections.entry(collection.to_string()).or_default();
            let old_id = coll.docs[pos].get(ID_FIELD).cloned();
            let new_id = doc.get(ID_FIELD).cloned();
            match (old_id, new_id) {
                (Some(old), Some(new)) if !values_equal(&old, &new) => {
                    return Err(StoreError::invalid_query(
                        "replacement may not change _id",
                    ))
                }
                (Some(old), None) => {
                    doc.insert(ID_FIELD.to_string(), old);
                }
                _ => {}
            }
            check_unique(coll, collection, &doc, Some(pos))?;
            let modified = u64::from(coll.docs[pos] != doc);
            coll.docs[pos] = doc;
            Ok(ReplaceOutcome {
                matched_count: 1,
                modified_count: modified,
                upserted_id: None,
            })
        }
        None if upsert => {
            seed_from_filter(&mut doc, filter);
            let id = insert(collections, collection, doc)?;
            Ok(ReplaceOutcome {
                matched_count: 0,
                modified_count: 0,
                upserted_id: Some(id),
            })
        }
        None => Ok(ReplaceOutcome::default()),
    }
}

fn delete(
    collections: &mut Collections,
    collection: &str,
    filter: &Document,
    many: bool,
) -> StoreResult<u64> {
    let Some(coll) = collections.get_mut(collection) else {
        return Ok(0);
    };

    let mut removed = 0u64;
    let mut kept = Vec::with_capacity(coll.docs.len());
    for doc in coll.docs.drain(..) {
        if (many || removed == 0) && matches(&doc, filter)? {
            removed += 1;
        } else {
            kept.push(doc);
        }
    }
    coll.docs = kept;
    Ok(removed)
}

fn position_of(coll: &MemCollection, filter: &Document) -> StoreResult<Option<usize>> {
    for (pos, doc) in coll.docs.iter().enumerate() {
        if matches(doc, filter)? {
            return Ok(Some(pos));
        }
    }
    Ok(None)
}

fn check_unique(
    coll: &MemCollection,
    collection: &str,
    doc: &Document,
    skip: Option<usize>,
) -> StoreResult<()> {
    let id_index = vec![ID_FIELD.to_string()];
    for index in std::iter::once(&id_index).chain(coll.unique_indexes.iter()) {
        let clash = coll
            .docs
            .iter()
            .enumerate()
            .filter(|(pos, _)| Some(*pos) != skip)
            .any(|(_, other)| same_key(doc, other, index));
        if clash {
            return Err(StoreError::duplicate_key(format!(
                "{collection} index {index:?} already holds {:?}",
                key_of(doc, index)
            )));
        }
    }
    Ok(())
}

/// Two documents collide on an index when every indexed field is present
/// in both and equal.
fn same_key(a: &Document, b: &Document, index: &[String]) -> bool {
    index.iter().all(|field| {
        match (lookup_field(a, field), lookup_field(b, field)) {
            (Some(x), Some(y)) => values_equal(x, y),
            _ => false,
        }
    })
}

fn key_of(doc: &Document, index: &[String]) -> Vec<Value> {
    index
        .iter()
        .map(|field| lookup_field(doc, field).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Copies top-level equality conditions of an upsert filter into the new
/// document, as a MongoDB upsert does.
fn seed_from_filter(doc: &mut Document, filter: &Document) {
    for (key, condition) in filter {
        match key.as_str() {
            "$and" => {
                if let Value::Array(clauses) = condition {
                    for clause in clauses {
                        if let Value::Object(clause) = clause {
                            seed_from_filter(doc, clause);
                        }
                    }
                }
            }
            op if op.starts_with('$') || key.contains('.') => {}
            field => {
                let literal = match condition {
                    Value::Object(ops) if ops.keys().all(|k| k.starts_with('$')) => {
                        ops.get("$eq").cloned()
                    }
                    other => Some(other.clone()),
                };
                if let Some(literal) = literal {
                    doc.entry(field.to_string()).or_insert(literal);
                }
            }
        }
    }
}
