//! The generic DAO contract and the state every backend DAO shares.

use crate::config::DaoConfig;
use crate::error::{DaoError, DaoResult};
use crate::filter::{FilterNode, SortingSpec};
use crate::mapper::RowMapper;
use anydal_bo::GenericBo;
use anydal_storage::compare::{lookup_field, total_order};
use anydal_storage::{CallContext, Row, StoreError, StoreResult};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// CRUD over business objects, identical for every backend.
///
/// A record is either absent or present. Misses are not errors: fetches
/// return `None`, and `update`/`delete` return `0`. Uniqueness violations
/// are always [`DaoError::DuplicateEntry`]. Every call carries the caller's
/// [`CallContext`], which is handed to the store unchanged; nothing is
/// retried.
pub trait GenericDao: Send + Sync {
    /// Builds the predicate identifying the record `bo` represents.
    ///
    /// # Errors
    ///
    /// Propagates the key filter's failure, e.g. a missing key field.
    fn create_filter(&self, storage_id: &str, bo: &GenericBo) -> DaoResult<FilterNode>;

    /// Inserts `bo` unless a record matching its key filter exists.
    ///
    /// Returns `Ok(1)` on insert. An existing record, or a lost race
    /// against a concurrent insert, gives [`DaoError::DuplicateEntry`] and
    /// leaves the store unchanged.
    ///
    /// # Errors
    ///
    /// [`DaoError::DuplicateEntry`] or any mapping and store failure.
    fn create(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64>;

    /// Replaces the record matching the key filter of `bo`.
    ///
    /// Returns `Ok(0)` when no record matches, `Ok(1)` otherwise.
    ///
    /// # Errors
    ///
    /// [`DaoError::DuplicateEntry`] if the new content collides with a
    /// different record, or any mapping and store failure.
    fn update(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64>;

    /// Inserts `bo`, or replaces the record matching its key filter.
    ///
    /// # Errors
    ///
    /// As for [`GenericDao::update`].
    fn save(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64>;

    /// Removes the record matching the key filter of `bo`.
    ///
    /// Returns `Ok(1)` if a record was removed and `Ok(0)` if none matched.
    ///
    /// # Errors
    ///
    /// Any mapping and store failure.
    fn delete(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64>;

    /// Returns one record matching `filter`, or `None`.
    ///
    /// # Errors
    ///
    /// Any compile, mapping and store failure.
    fn fetch_one(
        &self,
        ctx: &CallContext,
        storage_id: &str,
        filter: Option<&FilterNode>,
    ) -> DaoResult<Option<GenericBo>>;

    /// Returns the records matching `filter` in `sorting` order, skipping
    /// `offset` of them and returning at most `limit` (`0` for no limit).
    ///
    /// # Errors
    ///
    /// Any compile, mapping and store failure.
    fn fetch_many(
        &self,
        ctx: &CallContext,
        storage_id: &str,
        filter: Option<&FilterNode>,
        sorting: &SortingSpec,
        offset: u64,
        limit: u64,
    ) -> DaoResult<Vec<GenericBo>>;
}

/// Builds the predicate identifying the record a business object holds.
///
/// Supplied by the caller; the DAO never guesses key fields. Any
/// `Fn(&str, &GenericBo) -> DaoResult<FilterNode>` closure qualifies.
pub trait KeyFilter: Send + Sync {
    /// Returns a filter matching at most the record `bo` represents.
    ///
    /// # Errors
    ///
    /// Fails when `bo` lacks the data to identify a record.
    fn key_filter(&self, storage_id: &str, bo: &GenericBo) -> DaoResult<FilterNode>;
}

impl<F> KeyFilter for F
where
    F: Fn(&str, &GenericBo) -> DaoResult<FilterNode> + Send + Sync,
{
    fn key_filter(&self, storage_id: &str, bo: &GenericBo) -> DaoResult<FilterNode> {
        self(storage_id, bo)
    }
}

/// Key filter equating a fixed set of key fields with the object's values.
///
/// # Example
///
/// ```rust
/// use anydal_bo::GenericBo;
/// use anydal_core::{FilterNode, KeyFilter, PrimaryKeyFilter};
/// use serde_json::json;
///
/// let keys = PrimaryKeyFilter::new(["id"]).with_storage("lines", ["order", "line"]);
/// let bo = GenericBo::from_value(json!({"id": "7", "order": 1, "line": 2}));
///
/// assert_eq!(keys.key_filter("users", &bo).unwrap(), FilterNode::eq("id", "7"));
/// assert_eq!(
///     keys.key_filter("lines", &bo).unwrap(),
///     FilterNode::And(vec![FilterNode::eq("order", 1), FilterNode::eq("line", 2)])
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct PrimaryKeyFilter {
    default_fields: Vec<String>,
    per_storage: HashMap<String, Vec<String>>,
}

impl PrimaryKeyFilter {
    /// Uses `fields` as the key of every storage.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            default_fields: fields.into_iter().map(Into::into).collect(),
            per_storage: HashMap::new(),
        }
    }

    /// Uses `fields` as the key of `storage_id`.
    #[must_use]
    pub fn with_storage<I, S>(mut self, storage_id: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.per_storage
            .insert(storage_id.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    /// Key fields of `storage_id`.
    #[must_use]
    pub fn key_fields(&self, storage_id: &str) -> &[String] {
        self.per_storage
            .get(storage_id)
            .unwrap_or(&self.default_fields)
    }
}

impl KeyFilter for PrimaryKeyFilter {
    fn key_filter(&self, storage_id: &str, bo: &GenericBo) -> DaoResult<FilterNode> {
        let mut clauses = Vec::new();
        for field in self.key_fields(storage_id) {
            let value = bo.get_attribute(field, None)?.ok_or_else(|| {
                DaoError::mapping(format!("key field {field} of {storage_id} is missing"))
            })?;
            clauses.push(FilterNode::eq(field.clone(), value));
        }
        match clauses.len() {
            0 => Err(DaoError::mapping(format!("no key fields configured for {storage_id}"))),
            1 => Ok(clauses.remove(0)),
            _ => Ok(FilterNode::And(clauses)),
        }
    }
}

/// State shared by every backend DAO: the row mapper, the caller's key
/// filter and the configuration.
pub struct DaoBase<M> {
    mapper: M,
    key_filter: Box<dyn KeyFilter>,
    config: DaoConfig,
}

impl<M: RowMapper> DaoBase<M> {
    /// Creates the shared state with the default configuration.
    pub fn new(mapper: M, key_filter: impl KeyFilter + 'static) -> Self {
        Self {
            mapper,
            key_filter: Box::new(key_filter),
            config: DaoConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: DaoConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the row mapper.
    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DaoConfig {
        &self.config
    }

    /// Runs the caller's key filter and checks the result.
    ///
    /// # Errors
    ///
    /// Propagates the key filter's error, or [`DaoError::InvalidFilter`] for
    /// a tree with empty composites.
    pub fn create_filter(&self, storage_id: &str, bo: &GenericBo) -> DaoResult<FilterNode> {
        let filter = self.key_filter.key_filter(storage_id, bo)?;
        filter.validate()?;
        Ok(filter)
    }

    /// Decodes fetched native rows.
    ///
    /// # Errors
    ///
    /// The first store or mapping failure.
    pub fn decode_all(
        &self,
        storage_id: &str,
        rows: impl IntoIterator<Item = StoreResult<Row>>,
    ) -> DaoResult<Vec<GenericBo>> {
        let mut out = Vec::new();
        for row in rows {
            if let Some(bo) = self.mapper.to_bo(storage_id, Some(row?))? {
                out.push(bo);
            }
        }
        Ok(out)
    }

    /// Sorts native rows client-side, for stores that cannot sort.
    ///
    /// Sort fields are translated to column names first. Values of
    /// different kinds order as missing, numbers, strings, maps,
    /// sequences, bools.
    pub fn sort_rows(&self, storage_id: &str, rows: &mut [Row], sorting: &SortingSpec) {
        if sorting.is_empty() {
            return;
        }
        let keys: Vec<(String, bool)> = sorting
            .fields()
            .iter()
            .map(|key| (self.mapper.to_db_col_name(storage_id, &key.field), key.descending))
            .collect();
        rows.sort_by(|a, b| {
            keys.iter()
                .map(|(column, descending)| {
                    let ord = total_order(lookup_field(a, column), lookup_field(b, column));
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
}

impl<M: fmt::Debug> fmt::Debug for DaoBase<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaoBase")
            .field("mapper", &self.mapper)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Carries a DAO result out of a store transaction body.
///
/// Store transactions take bodies returning [`StoreResult<()>`]. A body
/// records its [`DaoResult`] here; a failed result aborts the transaction so
/// that nothing it wrote survives, and [`TxOutcome::finish`] hands the
/// original error back.
///
/// ```rust
/// use anydal_core::{DaoError, TxOutcome};
/// use anydal_storage::StoreResult;
///
/// fn transaction(body: &mut dyn FnMut() -> StoreResult<()>) -> StoreResult<()> {
///     body()
/// }
///
/// let mut outcome = TxOutcome::new();
/// let result = transaction(&mut || outcome.record(Err::<u64, _>(DaoError::DuplicateEntry)));
/// assert!(outcome.finish(result).unwrap_err().is_duplicate_entry());
/// ```
#[derive(Debug)]
pub struct TxOutcome<T> {
    slot: Option<DaoResult<T>>,
}

impl<T> Default for TxOutcome<T> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<T> TxOutcome<T> {
    /// An outcome with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the body's result; an error aborts the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Aborted`] when `result` is an error.
    pub fn record(&mut self, result: DaoResult<T>) -> StoreResult<()> {
        let failed = result.is_err();
        self.slot = Some(result);
        if failed {
            Err(StoreError::Aborted {
                reason: "DAO operation failed".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Combines the recorded result with the transaction's own result.
    ///
    /// # Errors
    ///
    /// The body's error if it failed, otherwise the store's begin or
    /// commit error.
    pub fn finish(self, transaction: StoreResult<()>) -> DaoResult<T> {
        match (self.slot, transaction) {
            (Some(Err(err)), _) => Err(err),
            (_, Err(err)) => Err(err.into()),
            (Some(Ok(value)), Ok(())) => Ok(value),
            (None, Ok(())) => Err(DaoError::Store(StoreError::Aborted {
                reason: "transaction committed without running its body".to_string(),
            })),
        }
    }
}

/// Applies zero-based `offset` and `limit` (`0` for no limit) to an
/// already ordered sequence.
pub fn page<T>(items: impl IntoIterator<Item = T>, offset: u64, limit: u64) -> Vec<T> {
    let skip = usize::try_from(offset).unwrap_or(usize::MAX);
    let take = match limit {
        0 => usize::MAX,
        n => usize::try_from(n).unwrap_or(usize::MAX),
    };
    items.into_iter().skip(skip).take(take).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{GenericRowMapper, TableMapping};
    use serde_json::{json, Value};

    #[test]
    fn closures_are_key_filters() {
        let filter = |_: &str, bo: &GenericBo| -> DaoResult<FilterNode> {
            let id = bo.get_attribute("id", None)?.unwrap_or(Value::Null);
            Ok(FilterNode::eq("id", id))
        };
        let base = DaoBase::new(GenericRowMapper::new(), filter);
        let bo = GenericBo::from_value(json!({"id": 3}));
        assert_eq!(base.create_filter("t", &bo).unwrap(), FilterNode::eq("id", 3));
    }

    #[test]
    fn empty_key_filters_are_rejected() {
        let base = DaoBase::new(
            GenericRowMapper::new(),
            |_: &str, _: &GenericBo| -> DaoResult<FilterNode> { Ok(FilterNode::And(Vec::new())) },
        );
        assert!(matches!(
            base.create_filter("t", &GenericBo::new()),
            Err(DaoError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn primary_key_needs_its_fields() {
        let keys = PrimaryKeyFilter::new(["id"]);
        let err = keys.key_filter("t", &GenericBo::new()).unwrap_err();
        assert!(matches!(err, DaoError::Mapping { .. }));
        let none = PrimaryKeyFilter::new(Vec::<String>::new());
        assert!(none.key_filter("t", &GenericBo::new()).is_err());
    }

    #[test]
    fn outcome_prefers_body_error() {
        let mut outcome = TxOutcome::<u64>::new();
        let aborted = outcome.record(Err(DaoError::DuplicateEntry));
        assert!(matches!(aborted, Err(StoreError::Aborted { .. })));
        assert!(outcome.finish(aborted).unwrap_err().is_duplicate_entry());

        let mut outcome = TxOutcome::new();
        outcome.record(Ok(1u64)).unwrap();
        assert_eq!(outcome.finish(Ok(())).unwrap(), 1);

        let mut outcome = TxOutcome::new();
        outcome.record(Ok(1u64)).unwrap();
        let commit_failed = outcome.finish(Err(StoreError::Timeout)).unwrap_err();
        assert!(matches!(commit_failed, DaoError::Store(StoreError::Timeout)));
    }

    #[test]
    fn paging() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(page(items.clone(), 1, 3), vec![1, 2, 3]);
        assert_eq!(page(items.clone(), 8, 0), vec![8, 9]);
        assert!(page(items, 10, 5).is_empty());
    }

    #[test]
    fn client_side_sort_uses_column_names() {
        let mapper =
            GenericRowMapper::new().with_table("t", TableMapping::new().rename("rank", "r"));
        let base = DaoBase::new(mapper, PrimaryKeyFilter::new(["id"]));
        let mut rows: Vec<Row> = [
            json!({"id": "a", "r": 2}),
            json!({"id": "b", "r": 1}),
            json!({"id": "c"}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();

        base.sort_rows("t", &mut rows, &SortingSpec::new().desc("rank"));
        let ids: Vec<&Value> = rows.iter().map(|r| &r["id"]).collect();
        assert_eq!(ids, [&json!("a"), &json!("b"), &json!("c")]);
    }
}
