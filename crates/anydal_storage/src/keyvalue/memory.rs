//! In-memory key/value store.

use super::{Condition, Item, KeyValueConnection, TableSpec};
use crate::config::StoreConfig;
use crate::context::CallContext;
use crate::error::{StoreError, StoreResult};
use crate::types::{cursor_from_vec, Cursor};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

#[derive(Debug)]
struct MemTable {
    spec: TableSpec,
    /// Items keyed by the canonical text of their key attributes.
    items: BTreeMap<Vec<String>, Item>,
}

type Tables = HashMap<String, MemTable>;

/// An in-memory key/value store.
///
/// Tables must be created with [`MemoryKeyValueStore::create_table`] before
/// use. Key attributes must be strings or numbers; numbers are keyed by
/// value, so `1` and `1.0` address the same item. Every write is atomic
/// with its condition check. Lock waits are bounded by the call's deadline,
/// or by [`StoreConfig::default_timeout`] when it has none.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    tables: RwLock<Tables>,
    config: StoreConfig,
}

impl MemoryKeyValueStore {
    /// Creates a store with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given configuration.
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Creates `table` with the given key schema. An existing table of the
    /// same name is left untouched.
    pub fn create_table(&self, table: &str, spec: TableSpec) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_insert_with(|| MemTable {
                spec,
                items: BTreeMap::new(),
            });
    }

    /// Returns the number of items in `table`.
    #[must_use]
    pub fn len(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, |t| t.items.len())
    }

    /// Returns true if `table` is missing or holds no items.
    #[must_use]
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    fn read(&self, ctx: &CallContext) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        ctx.check()?;
        let timeout = ctx.effective_timeout(self.config.default_timeout);
        self.tables.try_read_for(timeout).ok_or(StoreError::Timeout)
    }

    fn write(&self, ctx: &CallContext) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        ctx.check()?;
        let timeout = ctx.effective_timeout(self.config.default_timeout);
        self.tables.try_write_for(timeout).ok_or(StoreError::Timeout)
    }
}

// Integral floats share the text of the equal integer.
fn number_text(number: &Number) -> String {
    if number.is_i64() || number.is_u64() {
        return number.to_string();
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", f as i64),
        _ => number.to_string(),
    }
}

fn key_text(spec: &TableSpec, table: &str, item: &Item) -> StoreResult<Vec<String>> {
    spec.key_attributes()
        .map(|name| match item.get(name) {
            Some(value @ Value::String(_)) => Ok(value.to_string()),
            Some(Value::Number(number)) => Ok(number_text(number)),
            Some(other) => Err(StoreError::invalid_query(format!(
                "key attribute {name} of {table} must be a string or number, got {other}"
            ))),
            None => Err(StoreError::invalid_query(format!(
                "missing key attribute {name} for {table}"
            ))),
        })
        .collect()
}

fn check_condition(
    table: &str,
    current: Option<&Item>,
    condition: Option<&Condition>,
) -> StoreResult<()> {
    let Some(condition) = condition else {
        return Ok(());
    };
    let empty = Item::new();
    if condition.evaluate(current.unwrap_or(&empty)) {
        Ok(())
    } else {
        trace!(table, %condition, "condition check failed");
        Err(StoreError::condition_failed(table))
    }
}

impl KeyValueConnection for MemoryKeyValueStore {
    fn describe_table(&self, ctx: &CallContext, table: &str) -> StoreResult<TableSpec> {
        self.read(ctx)?
            .get(table)
            .map(|t| t.spec.clone())
            .ok_or_else(|| StoreError::no_such_storage(table))
    }

    fn get_item(&self, ctx: &CallContext, table: &str, key: &Item) -> StoreResult<Option<Item>> {
        let tables = self.read(ctx)?;
        let t = tables
            .get(table)
            .ok_or_else(|| StoreError::no_such_storage(table))?;
        let key = key_text(&t.spec, table, key)?;
        Ok(t.items.get(&key).cloned())
    }

    fn scan(
        &self,
        ctx: &CallContext,
        table: &str,
        filter: Option<&Condition>,
    ) -> StoreResult<Cursor<Item>> {
        let tables = self.read(ctx)?;
        let t = tables
            .get(table)
            .ok_or_else(|| StoreError::no_such_storage(table))?;
        let items: Vec<Item> = t
            .items
            .values()
            .filter(|item| filter.map_or(true, |c| c.evaluate(item)))
            .cloned()
            .collect();
        trace!(table, hits = items.len(), "scan");
        Ok(cursor_from_vec(items))
    }

    fn put_item(
        &self,
        ctx: &CallContext,
        table: &str,
        item: Item,
        condition: Option<&Condition>,
    ) -> StoreResult<()> {
        let mut tables = self.write(ctx)?;
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::no_such_storage(table))?;
        let key = key_text(&t.spec, table, &item)?;
        check_condition(table, t.items.get(&key), condition)?;
        t.items.insert(key, item);
        Ok(())
    }

    fn delete_item(
        &self,
        ctx: &CallContext,
        table: &str,
        key: &Item,
        condition: Option<&Condition>,
    ) -> StoreResult<bool> {
        let mut tables = self.write(ctx)?;
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::no_such_storage(table))?;
        let key = key_text(&t.spec, table, key)?;
        check_condition(table, t.items.get(&key), condition)?;
        Ok(t.items.remove(&key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyvalue::CompareOp;
    use serde_json::json;
    use std::time::{Duration, Instant};

    fn item(value: Value) -> Item {
        value.as_object().cloned().expect("object")
    }

    fn store() -> MemoryKeyValueStore {
        let store = MemoryKeyValueStore::new();
        store.create_table("t", TableSpec::new("pk"));
        store
    }

    #[test]
    fn missing_table() {
        let store = MemoryKeyValueStore::new();
        let ctx = CallContext::background();
        assert!(matches!(
            store.describe_table(&ctx, "nope"),
            Err(StoreError::NoSuchStorage { .. })
        ));
        assert!(store.scan(&ctx, "nope", None).is_err());
    }

    #[test]
    fn conditional_put_guards_existence() {
        let store = store();
        let ctx = CallContext::background();
        let guard = Condition::AttributeNotExists("pk".into());
        store
            .put_item(&ctx, "t", item(json!({"pk": "a", "v": 1})), Some(&guard))
            .unwrap();
        let err = store
            .put_item(&ctx, "t", item(json!({"pk": "a", "v": 2})), Some(&guard))
            .unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed { .. }));

        let stored = store
            .get_item(&ctx, "t", &item(json!({"pk": "a"})))
            .unwrap()
            .unwrap();
        assert_eq!(stored["v"], json!(1));
    }

    #[test]
    fn conditional_delete() {
        let store = store();
        let ctx = CallContext::background();
        let exists = Condition::AttributeExists("pk".into());
        let key = item(json!({"pk": 7}));
        assert!(store.delete_item(&ctx, "t", &key, Some(&exists)).is_err());
        assert!(!store.delete_item(&ctx, "t", &key, None).unwrap());
        store.put_item(&ctx, "t", item(json!({"pk": 7})), None).unwrap();
        assert!(store.delete_item(&ctx, "t", &key, Some(&exists)).unwrap());
        assert!(store.is_empty("t"));
    }

    #[test]
    fn scan_filters() {
        let store = store();
        let ctx = CallContext::background();
        for i in 0..5 {
            store
                .put_item(&ctx, "t", item(json!({"pk": i.to_string(), "n": i})), None)
                .unwrap();
        }
        let filter = Condition::compare("n", CompareOp::Ge, 3);
        let hits: Vec<Item> = store
            .scan(&ctx, "t", Some(&filter))
            .unwrap()
            .collect::<StoreResult<_>>()
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn key_must_be_scalar() {
        let store = store();
        let ctx = CallContext::background();
        assert!(store
            .put_item(&ctx, "t", item(json!({"pk": [1]})), None)
            .is_err());
        assert!(store.put_item(&ctx, "t", item(json!({"v": 1})), None).is_err());
    }

    #[test]
    fn numeric_keys_compare_by_value() {
        let store = store();
        let ctx = CallContext::background();
        store.put_item(&ctx, "t", item(json!({"pk": 1, "v": "int"})), None).unwrap();
        let unused = Condition::AttributeNotExists("pk".into());
        assert!(matches!(
            store.put_item(&ctx, "t", item(json!({"pk": 1.0, "v": "float"})), Some(&unused)),
            Err(StoreError::ConditionFailed { .. })
        ));
        let found = store.get_item(&ctx, "t", &item(json!({"pk": 1.0}))).unwrap();
        assert_eq!(found, Some(item(json!({"pk": 1, "v": "int"}))));
        store.put_item(&ctx, "t", item(json!({"pk": "1"})), None).unwrap();
        store.put_item(&ctx, "t", item(json!({"pk": 1.5})), None).unwrap();
        assert_eq!(store.len("t"), 3);
    }

    #[test]
    fn deadline_bounds_lock_wait() {
        let store = store();
        let _held = store.tables.write();
        let started = Instant::now();
        let ctx = CallContext::with_timeout(Duration::from_millis(50));
        assert!(matches!(
            store.put_item(&ctx, "t", item(json!({"pk": "a"})), None),
            Err(StoreError::Timeout)
        ));
        assert!(matches!(store.scan(&ctx, "t", None), Err(StoreError::Timeout)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn default_timeout_applies_without_deadline() {
        let store = MemoryKeyValueStore::with_config(
            StoreConfig::new().default_timeout(Duration::from_millis(50)),
        );
        store.create_table("t", TableSpec::new("pk"));
        let _held = store.tables.write();
        assert!(matches!(
            store.describe_table(&CallContext::background(), "t"),
            Err(StoreError::Timeout)
        ));
    }
}
