//! The relational DAO.

use super::compiler::{SqlFilterCompiler, SqlFragment};
use super::mapper::SqlRowMapper;
use anydal_bo::GenericBo;
use anydal_core::{
    Columns, DaoBase, DaoConfig, DaoError, DaoResult, FilterCompiler, FilterNode, GenericDao, KeyFilter,
    RowMapper, SortingSpec, TxOutcome,
};
use anydal_storage::{CallContext, Row, SqlConnection, SqlExecutor, SqlFlavor};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

/// [`GenericDao`] over a relational connection.
///
/// The storage identifier is the table name. Uniqueness is enforced by the
/// table's PRIMARY KEY and UNIQUE constraints; violations surface as
/// [`anydal_core::DaoError::DuplicateEntry`]. `create` additionally checks
/// for an existing record first, inside one transaction unless
/// [`DaoConfig::transactional_create`] is off. Updates and saves always run
/// in a transaction.
///
/// # Example
///
/// ```rust
/// use anydal_backends::sql::{SqlDao, SqlRowMapper};
/// use anydal_bo::GenericBo;
/// use anydal_core::{GenericDao, PrimaryKeyFilter};
/// use anydal_storage::{CallContext, SqliteConnection};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let db = SqliteConnection::open_in_memory().unwrap();
/// db.execute_batch("CREATE TABLE users (id TEXT PRIMARY KEY, name TEXT)").unwrap();
/// let dao = SqlDao::new(Arc::new(db), SqlRowMapper::new(), PrimaryKeyFilter::new(["id"]));
///
/// let ctx = CallContext::background();
/// let bo = GenericBo::from_value(json!({"id": "1", "name": "Ada"}));
/// assert_eq!(dao.create(&ctx, "users", &bo).unwrap(), 1);
/// assert!(dao.create(&ctx, "users", &bo).unwrap_err().is_duplicate_entry());
/// ```
pub struct SqlDao {
    conn: Arc<dyn SqlConnection>,
    base: DaoBase<SqlRowMapper>,
}

impl SqlDao {
    /// Creates a DAO with the default configuration.
    pub fn new(
        conn: Arc<dyn SqlConnection>,
        mapper: SqlRowMapper,
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
    pub fn mapper(&self) -> &SqlRowMapper {
        self.base.mapper()
    }

    fn flavor(&self) -> SqlFlavor {
        self.conn.flavor()
    }

    fn compile(
        &self,
        storage_id: &str,
        filter: Option<&FilterNode>,
        first_param: usize,
    ) -> DaoResult<SqlFragment> {
        SqlFilterCompiler::new(self.flavor(), self.base.mapper())
            .first_param(first_param)
            .compile(storage_id, filter)
    }

    fn projection(&self, storage_id: &str) -> String {
        match self.base.mapper().columns_list(storage_id) {
            Columns::All => "*".to_string(),
            Columns::List(columns) => columns
                .iter()
                .map(|c| self.flavor().quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    fn order_by(&self, storage_id: &str, sorting: &SortingSpec) -> String {
        if sorting.is_empty() {
            return String::new();
        }
        let keys: Vec<String> = sorting
            .fields()
            .iter()
            .map(|key| {
                let column = self.base.mapper().to_db_col_name(storage_id, &key.field);
                let direction = if key.descending { "DESC" } else { "ASC" };
                format!("{} {direction}", self.flavor().quote_ident(&column))
            })
            .collect();
        format!(" ORDER BY {}", keys.join(", "))
    }

    fn select(
        &self,
        storage_id: &str,
        projection: &str,
        fragment: &SqlFragment,
        sorting: &SortingSpec,
        offset: u64,
        limit: u64,
    ) -> String {
        format!(
            "SELECT {projection} FROM {}{}{}{}",
            self.flavor().quote_ident(storage_id),
            fragment.where_clause(),
            self.order_by(storage_id, sorting),
            self.flavor().paging_clause(offset, limit, !sorting.is_empty()),
        )
    }

    fn first_row(
        &self,
        exec: &dyn SqlExecutor,
        ctx: &CallContext,
        storage_id: &str,
        projection: &str,
        filter: Option<&FilterNode>,
    ) -> DaoResult<Option<Row>> {
        let fragment = self.compile(storage_id, filter, 1)?;
        let sql = self.select(storage_id, projection, &fragment, &SortingSpec::new(), 0, 1);
        trace!(storage_id, %sql, "select one");
        let mut rows = exec.query(ctx, &sql, &fragment.params)?;
        Ok(rows.next().transpose()?)
    }

    fn insert(
        &self,
        exec: &dyn SqlExecutor,
        ctx: &CallContext,
        storage_id: &str,
        row: &Row,
    ) -> DaoResult<u64> {
        let flavor = self.flavor();
        let columns: Vec<String> = row.keys().map(|c| flavor.quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=row.len()).map(|n| flavor.placeholder(n)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            flavor.quote_ident(storage_id),
            columns.join(", "),
            placeholders.join(", ")
        );
        trace!(storage_id, %sql, "insert");
        let params: Vec<Value> = row.values().cloned().collect();
        Ok(exec.execute(ctx, &sql, &params)?)
    }

    /// Overwrites every column of the record matching `filter`.
    ///
    /// Without a configured column list the existing row supplies the
    /// column set, and columns the new row lacks are set to `NULL`.
    fn replace(
        &self,
        exec: &dyn SqlExecutor,
        ctx: &CallContext,
        storage_id: &str,
        filter: &FilterNode,
        mut row: Row,
    ) -> DaoResult<u64> {
        if self.base.mapper().columns_list(storage_id) == Columns::All {
            let Some(existing) = self.first_row(exec, ctx, storage_id, "*", Some(filter))? else {
                return Ok(0);
            };
            for column in existing.keys() {
                if !row.contains_key(column) {
                    row.insert(column.clone(), Value::Null);
                }
            }
        }
        if row.is_empty() {
            return Ok(0);
        }

        let flavor = self.flavor();
        let assignments: Vec<String> = row
            .keys()
            .enumerate()
            .map(|(i, column)| format!("{} = {}", flavor.quote_ident(column), flavor.placeholder(i + 1)))
            .collect();
        let fragment = self.compile(storage_id, Some(filter), row.len() + 1)?;
        let sql = format!(
            "UPDATE {} SET {}{}",
            flavor.quote_ident(storage_id),
            assignments.join(", "),
            fragment.where_clause()
        );
        trace!(storage_id, %sql, "update");
        let mut params: Vec<Value> = row.into_iter().map(|(_, value)| value).collect();
        params.extend(fragment.params);
        Ok(exec.execute(ctx, &sql, &params)?)
    }

    fn in_transaction<T>(
        &self,
        ctx: &CallContext,
        mut body: impl FnMut(&dyn SqlExecutor) -> DaoResult<T>,
    ) -> DaoResult<T> {
        let mut outcome = TxOutcome::new();
        let result = self.conn.transaction(ctx, self.base.config().isolation, &mut |exec| {
            outcome.record(body(exec))
        });
        outcome.finish(result)
    }
}

impl GenericDao for SqlDao {
    fn create_filter(&self, storage_id: &str, bo: &GenericBo) -> DaoResult<FilterNode> {
        self.base.create_filter(storage_id, bo)
    }

    fn create(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64> {
        let filter = self.create_filter(storage_id, bo)?;
        let row = self.base.mapper().to_native_row(storage_id, bo)?;
        let body = |exec: &dyn SqlExecutor| -> DaoResult<u64> {
            if self.first_row(exec, ctx, storage_id, "1", Some(&filter))?.is_some() {
                return Err(DaoError::DuplicateEntry);
            }
            self.insert(exec, ctx, storage_id, &row)
        };
        let result = if self.base.config().transactional_create {
            self.in_transaction(ctx, body)
        } else {
            body(self.conn.as_executor())
        };
        debug!(storage_id, ok = result.is_ok(), "sql create");
        result
    }

    fn update(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64> {
        let filter = self.create_filter(storage_id, bo)?;
        let row = self.base.mapper().to_native_row(storage_id, bo)?;
        let result = self.in_transaction(ctx, |exec| {
            self.replace(exec, ctx, storage_id, &filter, row.clone())
        });
        debug!(storage_id, ?result, "sql update");
        result
    }

    fn save(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64> {
        let filter = self.create_filter(storage_id, bo)?;
        let row = self.base.mapper().to_native_row(storage_id, bo)?;
        let result = self.in_transaction(ctx, |exec| {
            match self.replace(exec, ctx, storage_id, &filter, row.clone())? {
                0 => self.insert(exec, ctx, storage_id, &row),
                n => Ok(n),
            }
        });
        debug!(storage_id, ?result, "sql save");
        result
    }

    fn delete(&self, ctx: &CallContext, storage_id: &str, bo: &GenericBo) -> DaoResult<u64> {
        let filter = self.create_filter(storage_id, bo)?;
        let fragment = self.compile(storage_id, Some(&filter), 1)?;
        let sql = format!(
            "DELETE FROM {}{}",
            self.flavor().quote_ident(storage_id),
            fragment.where_clause()
        );
        trace!(storage_id, %sql, "delete");
        let removed = self.conn.execute(ctx, &sql, &fragment.params)?;
        debug!(storage_id, removed, "sql delete");
        Ok(removed)
    }

    fn fetch_one(
        &self,
        ctx: &CallContext,
        storage_id: &str,
        filter: Option<&FilterNode>,
    ) -> DaoResult<Option<GenericBo>> {
        let projection = self.projection(storage_id);
        let row = self.first_row(self.conn.as_executor(), ctx, storage_id, &projection, filter)?;
        debug!(storage_id, found = row.is_some(), "sql fetch_one");
        self.base.mapper().to_bo(storage_id, row)
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
        let fragment = self.compile(storage_id, filter, 1)?;
        let projection = self.projection(storage_id);
        let sql = self.select(storage_id, &projection, &fragment, sorting, offset, limit);
        trace!(storage_id, %sql, "select many");
        let rows = self.conn.query(ctx, &sql, &fragment.params)?;
        let found = self.base.decode_all(storage_id, rows)?;
        debug!(storage_id, count = found.len(), "sql fetch_many");
        Ok(found)
    }
}
