//! The document DAO.

use super::compiler::DocumentFilterCompiler;
use super::mapper::DocumentRowMapper;
use anydal_bo::GenericBo;
use anydal_core::{
    DaoBase, DaoConfig, DaoError, DaoResult, FilterCompiler, FilterNode, GenericDao, KeyFilter,
    RowMapper, SortingSpec, TxOutcome,
};
use anydal_storage::document::{Document, FindOptions};
use anydal_storage::{CallContext, DocumentConnection};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// [`GenericDao`] over a document store.
///
/// The storage identifier is the collection name. Uniqueness beyond the
/// key filter is enforced by the collection's unique indexes; violations
/// surface as [`DaoError::DuplicateEntry`]. `create` looks for an existing
/// record first, inside one transaction unless
/// [`DaoConfig::transactional_create`] is off. Update and save are single
/// replace operations.
pub struct DocumentDao {
    conn: Arc<dyn DocumentConnection>,
    base: DaoBase<DocumentRowMapper>,
}

impl DocumentDao {
    /// Creates a DAO with the default configuration.
    pub fn new(
        conn: Arc<dyn DocumentConnection>,
        mapper: DocumentRowMapper,
        key_filter: impl KeyFilter + 'static,
    ) -> Self {
        Self {
            conn,
            base: DaoBase::new(mapper, key_filter),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: DaoConfig) -> Self {
        self.base = self.base.with_config(config);
        self
    }

    /// Returns the row mapper.
    pub fn mapper(&self) -> &DocumentRowMapper {
        self.base.mapper()
    }

    fn compile(&self, storage_id: &str, filter: Option<&FilterNode>) -> DaoResult<Document> {
        DocumentFilterCompiler::new(self.base.mapper()).compile(storage_id, filter)
    }

    fn sort_document(&self, storage_id: &str, sorting: &SortingSpec) -> Document {
        sorting
            .fields()
            .iter()
            .map(|key| {
                let direction = if key.descending { -1 } else { 1 };
                (
                    self.base.mapper().to_db_col_name(storage_id, &key.field),
                    Value::from(direction),
                )
            })
            .collect()
    }
}

impl GenericDao for DocumentDao {
    fn create_filter(&self, storage_id: &str, bo: &GenericBo) -> DaoResult<FilterNode> {
        self.base.create_filter(storage_id, bo)
    }

    fn create(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64> {
        let filter = self.compile(storage_id, Some(&self.create_filter(storage_id, bo)?))?;
        let doc = self.base.mapper().to_native_row(storage_id, bo)?;
        let body = |conn: &dyn DocumentConnection| -> DaoResult<u64> {
            if conn.find_one(ctx, storage_id, &filter)?.is_some() {
                return Err(DaoError::DuplicateEntry);
            }
            conn.insert_one(ctx, storage_id, doc.clone())?;
            Ok(1)
        };
        let result = if self.base.config().transactional_create {
            let mut outcome = TxOutcome::new();
            let tx = self.conn.with_transaction(ctx, self.base.config().isolation, &mut |conn| {
                outcome.record(body(conn))
            });
            outcome.finish(tx)
        } else {
            body(self.conn.as_ref())
        };
        debug!(storage_id, ok = result.is_ok(), "document create");
        result
    }

    fn update(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64> {
        let filter = self.compile(storage_id, Some(&self.create_filter(storage_id, bo)?))?;
        let doc = self.base.mapper().to_native_row(storage_id, bo)?;
        let outcome = self.conn.replace_one(ctx, storage_id, &filter, doc, false)?;
        debug!(storage_id, matched = outcome.matched_count, "document update");
        Ok(outcome.matched_count)
    }

    fn save(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64> {
        let filter = self.compile(storage_id, Some(&self.create_filter(storage_id, bo)?))?;
        let doc = self.base.mapper().to_native_row(storage_id, bo)?;
        let outcome = self.conn.replace_one(ctx, storage_id, &filter, doc, true)?;
        debug!(
            storage_id,
            matched = outcome.matched_count,
            upserted = outcome.upserted_id.is_some(),
            "document save"
        );
        Ok(1)
    }

    fn delete(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64> {
        let filter = self.compile(storage_id, Some(&self.create_filter(storage_id, bo)?))?;
        let removed = self.conn.delete_one(ctx, storage_id, &filter)?;
        debug!(storage_id, removed, "document delete");
        Ok(removed)
    }

    fn fetch_one(
        &self,
        ctx: &CallContext,
        storage_id: &str,
        filter: Option<&FilterNode>,
    ) -> DaoResult<Option<GenericBo>> {
        let filter = self.compile(storage_id, filter)?;
        let doc = self.conn.find_one(ctx, storage_id, &filter)?;
        debug!(storage_id, found = doc.is_some(), "document fetch_one");
        self.base.mapper().to_bo(storage_id, doc)
    }

    fn fetch_many(
        &self,
        ctx: &CallContext,
        storage_id: &str,
        filter: Option<&FilterNode>,
        sorting: &SortingSpec,
        offset: u64,
        limit: u64,
    ) -> DaoResult<Vec<GenericBo>> {
        let filter = self.compile(storage_id, filter)?;
        let mut options = FindOptions::new().skip(offset);
        if !sorting.is_empty() {
            options = options.sort(self.sort_document(storage_id, sorting));
        }
        if limit > 0 {
            options = options.limit(limit);
        }
        let docs = self.conn.find(ctx, storage_id, &filter, &options)?;
        let found = self.base.decode_all(storage_id, docs)?;
        debug!(storage_id, count = found.len(), "document fetch_many");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anydal_core::{PrimaryKeyFilter, TableMapping};
    use anydal_storage::{IsolationLevel, MemoryDocumentStore, StoreError};
    use serde_json::json;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn dao() -> DocumentDao {
        let store = MemoryDocumentStore::new();
        store.create_unique_index("people", &["email"]).unwrap();
        let mapper = DocumentRowMapper::new()
            .with_collection("people", TableMapping::new().rename("id", "_id"));
        DocumentDao::new(Arc::new(store), mapper, PrimaryKeyFilter::new(["id"]))
    }

    fn bo(value: Value) -> GenericBo {
        GenericBo::from_value(value)
    }

    #[test]
    fn key_maps_to_store_id() {
        let dao = dao();
        let ctx = CallContext::background();
        dao.create(&ctx, "people", &bo(json!({"id": "p1", "name": "Ada"}))).unwrap();
        let found = dao
            .fetch_one(&ctx, "people", Some(&FilterNode::eq("id", "p1")))
            .unwrap()
            .unwrap();
        assert_eq!(found.snapshot(), json!({"id": "p1", "name": "Ada"}));
        assert!(dao
            .create(&ctx, "people", &bo(json!({"id": "p1"})))
            .unwrap_err()
            .is_duplicate_entry());
    }

    #[test]
    fn unique_index_collision_on_save_is_duplicate() {
        let dao = dao();
        let ctx = CallContext::background();
        dao.create(&ctx, "people", &bo(json!({"id": "1", "email": "a@x"}))).unwrap();
        let err = dao
            .save(&ctx, "people", &bo(json!({"id": "2", "email": "a@x"})))
            .unwrap_err();
        assert!(matches!(err, DaoError::DuplicateEntry));
    }

    #[test]
    fn update_replaces_whole_document() {
        let dao = dao();
        let ctx = CallContext::background();
        dao.create(&ctx, "people", &bo(json!({"id": "1", "a": 1, "b": 2}))).unwrap();
        assert_eq!(dao.update(&ctx, "people", &bo(json!({"id": "1", "a": 5}))).unwrap(), 1);
        let found = dao.fetch_one(&ctx, "people", None).unwrap().unwrap();
        assert_eq!(found.snapshot(), json!({"id": "1", "a": 5}));
        assert_eq!(dao.update(&ctx, "people", &bo(json!({"id": "9"}))).unwrap(), 0);
    }

    #[test]
    fn null_tests_match_absent_fields() {
        let dao = dao();
        let ctx = CallContext::background();
        dao.create(&ctx, "people", &bo(json!({"id": "1", "email": "a@x"}))).unwrap();
        dao.create(&ctx, "people", &bo(json!({"id": "2"}))).unwrap();
        let missing = dao
            .fetch_many(
                &ctx,
                "people",
                Some(&FilterNode::is_null("email")),
                &SortingSpec::new(),
                0,
                0,
            )
            .unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].get_as::<String>("id").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn lock_timeout_surfaces_as_store_error() {
        let store = Arc::new(MemoryDocumentStore::new());
        let dao = DocumentDao::new(
            Arc::clone(&store) as Arc<dyn DocumentConnection>,
            DocumentRowMapper::new(),
            PrimaryKeyFilter::new(["id"]),
        );
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let ctx = CallContext::background();
                store.with_transaction(&ctx, IsolationLevel::Snapshot, &mut |_| {
                    started_tx.send(()).ok();
                    release_rx.recv().ok();
                    Ok(())
                })
            })
        };
        started_rx.recv().unwrap();

        let ctx = CallContext::with_timeout(Duration::from_millis(50));
        let err = dao
            .create(&ctx, "people", &bo(json!({"id": "1"})))
            .unwrap_err();
        assert!(matches!(err, DaoError::Store(StoreError::Timeout)), "got {err:?}");

        release_tx.send(()).unwrap();
        holder.join().unwrap().unwrap();
        assert_eq!(store.count("people"), 0);
    }
}
