//! The key/value DAO.

use super::compiler::KeyValueFilterCompiler;
use super::mapper::KeyValueRowMapper;
use anydal_bo::GenericBo;
use anydal_core::{
    page, DaoBase, DaoConfig, DaoError, DaoResult, FilterCompiler, FilterNode, GenericDao,
    KeyFilter, Operator, RowMapper, SortingSpec,
};
use anydal_storage::keyvalue::{Condition, Item, TableSpec};
use anydal_storage::{CallContext, KeyValueConnection, StoreError};
use std::sync::Arc;
use tracing::debug;

/// [`GenericDao`] over a key/value store.
///
/// The storage identifier is the table name, and the table's key schema is
/// the uniqueness constraint: `create` is a conditional put that fails with
/// [`DaoError::DuplicateEntry`] when the key is taken. When the key filter
/// names fields other than the table key, `create` first scans for a match
/// of it; that check and the put are not atomic. Update and delete are
/// conditioned on the item existing and matching the key filter.
///
/// The store can neither sort nor skip, so `fetch_many` scans the matching
/// items and orders and pages them client-side.
pub struct KeyValueDao {
    conn: Arc<dyn KeyValueConnection>,
    base: DaoBase<KeyValueRowMapper>,
}

impl KeyValueDao {
    /// Creates a DAO with the default configuration.
    pub fn new(
        conn: Arc<dyn KeyValueConnection>,
        mapper: KeyValueRowMapper,
        key_filter: impl KeyFilter + 'static,
    ) -> Self {
        Self {
            conn,
            base: DaoBase::new(mapper, key_filter),
        }
    }

    /// Replaces the configuration.
    ///
    /// Creates are always atomic here, whatever
    /// [`DaoConfig::transactional_create`] says.
    #[must_use]
    pub fn with_config(mut self, config: DaoConfig) -> Self {
        self.base = self.base.with_config(config);
        self
    }

    /// Returns the row mapper.
    pub fn mapper(&self) -> &KeyValueRowMapper {
        self.base.mapper()
    }

    fn compile(&self, storage_id: &str, filter: Option<&FilterNode>) -> DaoResult<Option<Condition>> {
        KeyValueFilterCompiler::new(self.base.mapper()).compile(storage_id, filter)
    }

    /// Condition that the stored item exists and satisfies the key filter.
    fn existing(&self, storage_id: &str, spec: &TableSpec, bo: &GenericBo) -> DaoResult<Condition> {
        let exists = Condition::AttributeExists(spec.partition_key.clone());
        let key_filter = self.create_filter(storage_id, bo)?;
        Ok(match self.compile(storage_id, Some(&key_filter))? {
            Some(matches_key) => exists.and(matches_key),
            None => exists,
        })
    }

    /// True if `filter` is exactly equality on every table key attribute,
    /// which the conditional put already enforces.
    fn is_table_key(&self, storage_id: &str, spec: &TableSpec, filter: &FilterNode) -> bool {
        let mut fields = Vec::new();
        if !equality_fields(filter, &mut fields) {
            return false;
        }
        let mut columns: Vec<String> = fields
            .into_iter()
            .map(|field| self.base.mapper().to_db_col_name(storage_id, field))
            .collect();
        columns.sort();
        columns.dedup();
        let mut key: Vec<&str> = spec.key_attributes().collect();
        key.sort_unstable();
        columns.iter().map(String::as_str).eq(key)
    }

    fn key_of(storage_id: &str, spec: &TableSpec, item: &Item) -> DaoResult<Item> {
        spec.key_of(item).ok_or_else(|| {
            DaoError::mapping(format!(
                "record lacks a key attribute of {storage_id} ({})",
                spec.key_attributes().collect::<Vec<_>>().join(", ")
            ))
        })
    }
}

impl GenericDao for KeyValueDao {
    fn create_filter(&self, storage_id: &str, bo: &GenericBo) -> DaoResult<FilterNode> {
        self.base.create_filter(storage_id, bo)
    }

    fn create(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64> {
        let spec = self.conn.describe_table(ctx, storage_id)?;
        let item = self.base.mapper().to_native_row(storage_id, bo)?;
        Self::key_of(storage_id, &spec, &item)?;
        let key_filter = self.create_filter(storage_id, bo)?;
        if !self.is_table_key(storage_id, &spec, &key_filter) {
            let condition = self.compile(storage_id, Some(&key_filter))?;
            let taken = self
                .conn
                .scan(ctx, storage_id, condition.as_ref())?
                .next()
                .transpose()?
                .is_some();
            if taken {
                debug!(storage_id, "key/value create found a record matching the key filter");
                return Err(DaoError::DuplicateEntry);
            }
        }
        let unused = Condition::AttributeNotExists(spec.partition_key.clone());
        match self.conn.put_item(ctx, storage_id, item, Some(&unused)) {
            Ok(()) => {
                debug!(storage_id, "key/value create");
                Ok(1)
            }
            Err(StoreError::ConditionFailed { .. }) => {
                debug!(storage_id, "key/value create found the key taken");
                Err(DaoError::DuplicateEntry)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn update(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64> {
        let spec = self.conn.describe_table(ctx, storage_id)?;
        let item = self.base.mapper().to_native_row(storage_id, bo)?;
        Self::key_of(storage_id, &spec, &item)?;
        let condition = self.existing(storage_id, &spec, bo)?;
        let updated = match self.conn.put_item(ctx, storage_id, item, Some(&condition)) {
            Ok(()) => 1,
            Err(StoreError::ConditionFailed { .. }) => 0,
            Err(err) => return Err(err.into()),
        };
        debug!(storage_id, updated, "key/value update");
        Ok(updated)
    }

    fn save(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64> {
        let spec = self.conn.describe_table(ctx, storage_id)?;
        let item = self.base.mapper().to_native_row(storage_id, bo)?;
        Self::key_of(storage_id, &spec, &item)?;
        self.conn.put_item(ctx, storage_id, item, None)?;
        debug!(storage_id, "key/value save");
        Ok(1)
    }

    fn delete(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64> {
        let spec = self.conn.describe_table(ctx, storage_id)?;
        let item = self.base.mapper().to_native_row(storage_id, bo)?;
        let key = Self::key_of(storage_id, &spec, &item)?;
        let condition = self.existing(storage_id, &spec, bo)?;
        let removed = match self.conn.delete_item(ctx, storage_id, &key, Some(&condition)) {
            Ok(existed) => u64::from(existed),
            Err(StoreError::ConditionFailed { .. }) => 0,
            Err(err) => return Err(err.into()),
        };
        debug!(storage_id, removed, "key/value delete");
        Ok(removed)
    }

    fn fetch_one(
        &self,
        ctx: &CallContext,
        storage_id: &str,
        filter: Option<&FilterNode>,
    ) -> DaoResult<Option<GenericBo>> {
        let condition = self.compile(storage_id, filter)?;
        let item = self
            .conn
            .scan(ctx, storage_id, condition.as_ref())?
            .next()
            .transpose()?;
        debug!(storage_id, found = item.is_some(), "key/value fetch_one");
        self.base.mapper().to_bo(storage_id, item)
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
        let condition = self.compile(storage_id, filter)?;
        let mut items = self
            .conn
            .scan(ctx, storage_id, condition.as_ref())?
            .collect::<Result<Vec<_>, _>>()?;
        let scanned = items.len();
        self.base.sort_rows(storage_id, &mut items, sorting);
        let found = self
            .base
            .decode_all(storage_id, page(items, offset, limit).into_iter().map(Ok))?;
        debug!(storage_id, scanned, count = found.len(), "key/value fetch_many, paged client-side");
        Ok(found)
    }
}

fn equality_fields<'a>(filter: &'a FilterNode, out: &mut Vec<&'a str>) -> bool {
    match filter {
        FilterNode::FieldOpValue {
            field,
            op: Operator::Equal,
            ..
        } => {
            out.push(field);
            true
        }
        FilterNode::And(children) => children.iter().all(|child| equality_fields(child, out)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anydal_core::{PrimaryKeyFilter, TableMapping};
    use anydal_storage::MemoryKeyValueStore;
    use serde_json::{json, Value};

    fn dao() -> KeyValueDao {
        let store = MemoryKeyValueStore::new();
        store.create_table("users", TableSpec::new("pk"));
        let mapper =
            KeyValueRowMapper::new().with_table("users", TableMapping::new().rename("id", "pk"));
        KeyValueDao::new(Arc::new(store), mapper, PrimaryKeyFilter::new(["id"]))
    }

    fn bo(value: Value) -> GenericBo {
        GenericBo::from_value(value)
    }

    #[test]
    fn create_is_a_conditional_put() {
        let dao = dao();
        let ctx = CallContext::background();
        assert_eq!(dao.create(&ctx, "users", &bo(json!({"id": "1", "n": 1}))).unwrap(), 1);
        let err = dao.create(&ctx, "users", &bo(json!({"id": "1", "n": 2}))).unwrap_err();
        assert!(err.is_duplicate_entry());
        let kept = dao.fetch_one(&ctx, "users", None).unwrap().unwrap();
        assert_eq!(kept.snapshot(), json!({"id": "1", "n": 1}));
    }

    #[test]
    fn update_and_delete_of_missing_items_do_nothing() {
        let dao = dao();
        let ctx = CallContext::background();
        let ghost = bo(json!({"id": "9"}));
        assert_eq!(dao.update(&ctx, "users", &ghost).unwrap(), 0);
        assert_eq!(dao.delete(&ctx, "users", &ghost).unwrap(), 0);
        assert!(dao.fetch_one(&ctx, "users", None).unwrap().is_none());
    }

    #[test]
    fn save_inserts_then_replaces() {
        let dao = dao();
        let ctx = CallContext::background();
        dao.save(&ctx, "users", &bo(json!({"id": "1", "a": 1}))).unwrap();
        dao.save(&ctx, "users", &bo(json!({"id": "1", "b": 2}))).unwrap();
        let found = dao.fetch_one(&ctx, "users", None).unwrap().unwrap();
        assert_eq!(found.snapshot(), json!({"id": "1", "b": 2}));
        assert_eq!(dao.delete(&ctx, "users", &found).unwrap(), 1);
    }

    #[test]
    fn missing_key_attribute_is_a_mapping_error() {
        let dao = dao();
        let err = dao
            .save(&CallContext::background(), "users", &bo(json!({"name": "x"})))
            .unwrap_err();
        assert!(matches!(err, DaoError::Mapping { .. }));
    }

    #[test]
    fn missing_table_is_a_store_error() {
        let err = dao()
            .fetch_many(&CallContext::background(), "nope", None, &SortingSpec::new(), 0, 0)
            .unwrap_err();
        assert!(matches!(err, DaoError::Store(StoreError::NoSuchStorage { .. })));
    }

    #[test]
    fn filters_reach_nested_attributes() {
        let dao = dao();
        let ctx = CallContext::background();
        dao.create(&ctx, "users", &bo(json!({"id": "1", "address": {"city": "Oslo"}}))).unwrap();
        dao.create(&ctx, "users", &bo(json!({"id": "2", "address": {"city": "Rome"}}))).unwrap();
        let found = dao
            .fetch_one(&ctx, "users", Some(&FilterNode::eq("address.city", "Rome")))
            .unwrap()
            .unwrap();
        assert_eq!(found.get_as::<String>("id").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn non_key_filter_is_checked_before_the_put() {
        let store = MemoryKeyValueStore::new();
        store.create_table("users", TableSpec::new("pk"));
        let mapper =
            KeyValueRowMapper::new().with_table("users", TableMapping::new().rename("id", "pk"));
        let dao = KeyValueDao::new(Arc::new(store), mapper, PrimaryKeyFilter::new(["email"]));
        let ctx = CallContext::background();
        dao.create(&ctx, "users", &bo(json!({"id": "1", "email": "a@x"}))).unwrap();
        let err = dao
            .create(&ctx, "users", &bo(json!({"id": "2", "email": "a@x"})))
            .unwrap_err();
        assert!(err.is_duplicate_entry());
        let all = dao
            .fetch_many(&ctx, "users", None, &SortingSpec::new(), 0, 0)
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn only_equality_on_the_table_key_skips_the_scan() {
        let dao = dao();
        let spec = TableSpec::new("pk");
        assert!(dao.is_table_key("users", &spec, &FilterNode::eq("id", "1")));
        assert!(dao.is_table_key(
            "users",
            &spec,
            &FilterNode::And(vec![FilterNode::eq("id", "1")])
        ));
        assert!(!dao.is_table_key("users", &spec, &FilterNode::eq("email", "a@x")));
        assert!(!dao.is_table_key("users", &spec, &FilterNode::ge("id", "1")));
        assert!(!dao.is_table_key(
            "users",
            &spec,
            &FilterNode::And(vec![FilterNode::eq("id", "1"), FilterNode::eq("email", "a@x")])
        ));
    }
}
