//! SQLite relational connection backed by rusqlite.

use crate::config::StoreConfig;
use crate::context::CallContext;
use crate::error::{StoreError, StoreResult};
use crate::sql::{SqlConnection, SqlExecutor, SqlFlavor};
use crate::types::{cursor_from_vec, Cursor, IsolationLevel, Row};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{ErrorCode, TransactionBehavior};
use serde_json::{Number, Value};
use std::path::Path;
use tracing::{debug, trace};

/// A SQLite database opened through rusqlite.
///
/// One underlying connection is shared behind a mutex. A call waits for the
/// mutex and for SQLite's own locks at most as long as its context allows,
/// so contention surfaces as [`StoreError::Timeout`].
///
/// PRIMARY KEY and UNIQUE violations are reported as
/// [`StoreError::DuplicateKey`].
///
/// # Example
///
/// ```rust
/// use anydal_storage::sql::SqlExecutor;
/// use anydal_storage::{CallContext, SqliteConnection};
/// use serde_json::json;
///
/// let db = SqliteConnection::open_in_memory().unwrap();
/// db.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY, n INTEGER)").unwrap();
///
/// let ctx = CallContext::background();
/// db.execute(&ctx, "INSERT INTO t VALUES (?, ?)", &[json!("a"), json!(1)]).unwrap();
/// assert!(db
///     .execute(&ctx, "INSERT INTO t VALUES (?, ?)", &[json!("a"), json!(2)])
///     .unwrap_err()
///     .is_duplicate_key());
/// ```
#[derive(Debug)]
pub struct SqliteConnection {
    conn: Mutex<rusqlite::Connection>,
    config: StoreConfig,
}

impl SqliteConnection {
    /// Opens (or creates) a database file in WAL mode.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = rusqlite::Connection::open(path.as_ref()).map_err(map_sqlite_error)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(map_sqlite_error)?;
        debug!(path = %path.as_ref().display(), "opened sqlite database");
        Ok(Self::from_connection(conn))
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if SQLite cannot allocate it.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(map_sqlite_error)?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an already opened rusqlite connection.
    #[must_use]
    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            config: StoreConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Runs several semicolon-separated statements without parameters,
    /// typically schema setup.
    ///
    /// # Errors
    ///
    /// Returns the mapped SQLite error of the first failing statement.
    pub fn execute_batch(&self, sql: &str) -> StoreResult<()> {
        let conn = self.lock(&CallContext::background())?;
        conn.execute_batch(sql).map_err(map_sqlite_error)
    }

    fn lock(&self, ctx: &CallContext) -> StoreResult<MutexGuard<'_, rusqlite::Connection>> {
        ctx.check()?;
        let timeout = ctx.effective_timeout(self.config.default_timeout);
        let conn = self.conn.try_lock_for(timeout).ok_or(StoreError::Timeout)?;
        // The mutex wait consumed part of the budget.
        let remaining = ctx.effective_timeout(self.config.default_timeout);
        conn.busy_timeout(remaining).map_err(map_sqlite_error)?;
        Ok(conn)
    }
}

impl SqlExecutor for SqliteConnection {
    fn flavor(&self) -> SqlFlavor {
        SqlFlavor::Sqlite
    }

    fn query(&self, ctx: &CallContext, sql: &str, params: &[Value]) -> StoreResult<Cursor<Row>> {
        let conn = self.lock(ctx)?;
        query(&conn, ctx, sql, params)
    }

    fn execute(&self, ctx: &CallContext, sql: &str, params: &[Value]) -> StoreResult<u64> {
        let conn = self.lock(ctx)?;
        execute(&conn, ctx, sql, params)
    }
}

impl SqlConnection for SqliteConnection {
    fn as_executor(&self) -> &dyn SqlExecutor {
        self
    }

    fn transaction(
        &self,
        ctx: &CallContext,
        isolation: IsolationLevel,
        body: &mut dyn FnMut(&dyn SqlExecutor) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let mut conn = self.lock(ctx)?;
        // SQLite transactions are always serializable; the behavior only
        // decides when the write lock is taken.
        let behavior = match isolation {
            IsolationLevel::ReadCommitted => TransactionBehavior::Deferred,
            IsolationLevel::Snapshot | IsolationLevel::Serializable => {
                TransactionBehavior::Immediate
            }
        };
        let tx = conn
            .transaction_with_behavior(behavior)
            .map_err(map_sqlite_error)?;
        trace!(?isolation, "begin sqlite transaction");
        body(&SqliteTransaction { conn: &tx })?;
        ctx.check()?;
        tx.commit().map_err(map_sqlite_error)?;
        trace!("commit sqlite transaction");
        Ok(())
    }
}

/// Executor handed to a transaction body.
struct SqliteTransaction<'a> {
    conn: &'a rusqlite::Connection,
}

impl SqlExecutor for SqliteTransaction<'_> {
    fn flavor(&self) -> SqlFlavor {
        SqlFlavor::Sqlite
    }

    fn query(&self, ctx: &CallContext, sql: &str, params: &[Value]) -> StoreResult<Cursor<Row>> {
        ctx.check()?;
        query(self.conn, ctx, sql, params)
    }

    fn execute(&self, ctx: &CallContext, sql: &str, params: &[Value]) -> StoreResult<u64> {
        ctx.check()?;
        execute(self.conn, ctx, sql, params)
    }
}

fn query(
    conn: &rusqlite::Connection,
    ctx: &CallContext,
    sql: &str,
    params: &[Value],
) -> StoreResult<Cursor<Row>> {
    trace!(sql, params = params.len(), "sqlite query");
    let mut stmt = conn.prepare(sql).map_err(map_sqlite_error)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| (*c).to_string()).collect();
    let mut rows = stmt
        .query(rusqlite::params_from_iter(to_sql_params(params)?))
        .map_err(map_sqlite_error)?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(map_sqlite_error)? {
        ctx.check()?;
        let mut record = Row::new();
        for (i, column) in columns.iter().enumerate() {
            let value = row.get_ref(i).map_err(map_sqlite_error)?;
            record.insert(column.clone(), from_sql_value(value)?);
        }
        out.push(record);
    }
    Ok(cursor_from_vec(out))
}

fn execute(
    conn: &rusqlite::Connection,
    ctx: &CallContext,
    sql: &str,
    params: &[Value],
) -> StoreResult<u64> {
    trace!(sql, params = params.len(), "sqlite execute");
    let changed = conn
        .execute(sql, rusqlite::params_from_iter(to_sql_params(params)?))
        .map_err(map_sqlite_error)?;
    ctx.check()?;
    Ok(u64::try_from(changed).unwrap_or(u64::MAX))
}

/// Converts parameters to SQLite values.
///
/// Bools become 0/1, containers are stored as JSON text, and unsigned
/// integers beyond `i64` fall back to REAL.
fn to_sql_params(params: &[Value]) -> StoreResult<Vec<SqlValue>> {
    params
        .iter()
        .map(|param| {
            Ok(match param {
                Value::Null => SqlValue::Null,
                Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
                Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                    (Some(i), _) => SqlValue::Integer(i),
                    (None, Some(f)) => SqlValue::Real(f),
                    (None, None) => {
                        return Err(StoreError::invalid_query(format!(
                            "number {n} has no SQLite representation"
                        )))
                    }
                },
                Value::String(s) => SqlValue::Text(s.clone()),
                container @ (Value::Array(_) | Value::Object(_)) => {
                    SqlValue::Text(serde_json::to_string(container)?)
                }
            })
        })
        .collect()
}

fn from_sql_value(value: ValueRef<'_>) -> StoreResult<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(
            std::str::from_utf8(bytes)
                .map_err(|e| StoreError::Backend {
                    message: format!("column text is not UTF-8: {e}"),
                })?
                .to_string(),
        ),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    })
}

/// Maps rusqlite errors onto the store taxonomy.
///
/// Uniqueness violations become [`StoreError::DuplicateKey`] and lock
/// contention past the busy timeout becomes [`StoreError::Timeout`]. Other
/// errors keep their source.
pub fn map_sqlite_error(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        match failure.code {
            ErrorCode::ConstraintViolation
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                return StoreError::duplicate_key(
                    message.clone().unwrap_or_else(|| failure.to_string()),
                );
            }
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => return StoreError::Timeout,
            _ => {}
        }
    }
    StoreError::Sqlite(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn db() -> SqliteConnection {
        let db = SqliteConnection::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE t (id TEXT PRIMARY KEY, email TEXT UNIQUE, n INTEGER, doc TEXT, f REAL)",
        )
        .unwrap();
        db
    }

    fn rows(cursor: Cursor<Row>) -> Vec<Row> {
        cursor.collect::<StoreResult<_>>().unwrap()
    }

    #[test]
    fn values_round_trip() {
        let db = db();
        let ctx = CallContext::background();
        db.execute(
            &ctx,
            "INSERT INTO t (id, email, n, doc, f) VALUES (?, ?, ?, ?, ?)",
            &[json!("a"), Value::Null, json!(true), json!({"k": [1]}), json!(1.5)],
        )
        .unwrap();
        let got = rows(db.query(&ctx, "SELECT * FROM t", &[]).unwrap());
        assert_eq!(
            Value::Object(got[0].clone()),
            json!({"id": "a", "email": null, "n": 1, "doc": "{\"k\":[1]}", "f": 1.5})
        );
    }

    #[test]
    fn primary_and_unique_violations_are_duplicates() {
        let db = db();
        let ctx = CallContext::background();
        let insert = "INSERT INTO t (id, email) VALUES (?, ?)";
        db.execute(&ctx, insert, &[json!("a"), json!("x@y")]).unwrap();
        assert!(db
            .execute(&ctx, insert, &[json!("a"), json!("other")])
            .unwrap_err()
            .is_duplicate_key());
        assert!(db
            .execute(&ctx, insert, &[json!("b"), json!("x@y")])
            .unwrap_err()
            .is_duplicate_key());
    }

    #[test]
    fn other_errors_keep_source() {
        let db = db();
        let err = db
            .execute(&CallContext::background(), "INSERT INTO missing VALUES (1)", &[])
            .unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let db = db();
        let ctx = CallContext::background();
        let result = db.transaction(&ctx, IsolationLevel::Snapshot, &mut |tx| {
            tx.execute(&ctx, "INSERT INTO t (id) VALUES ('a')", &[])?;
            tx.execute(&ctx, "INSERT INTO t (id) VALUES ('a')", &[])?;
            Ok(())
        });
        assert!(result.unwrap_err().is_duplicate_key());
        assert!(rows(db.query(&ctx, "SELECT id FROM t", &[]).unwrap()).is_empty());

        db.transaction(&ctx, IsolationLevel::ReadCommitted, &mut |tx| {
            tx.execute(&ctx, "INSERT INTO t (id) VALUES ('b')", &[])?;
            assert_eq!(rows(tx.query(&ctx, "SELECT id FROM t", &[])?).len(), 1);
            Ok(())
        })
        .unwrap();
        assert_eq!(rows(db.query(&ctx, "SELECT id FROM t", &[]).unwrap()).len(), 1);
    }

    #[test]
    fn expired_context_is_refused() {
        let db = db();
        let ctx = CallContext::with_timeout(Duration::ZERO);
        assert!(matches!(
            db.query(&ctx, "SELECT 1", &[]),
            Err(StoreError::Timeout)
        ));
    }

    #[test]
    fn file_database_in_wal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let db = SqliteConnection::open(&path).unwrap();
        db.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY)").unwrap();
        drop(db);

        let reopened = SqliteConnection::open(&path).unwrap();
        let mode = rows(
            reopened
                .query(&CallContext::background(), "PRAGMA journal_mode", &[])
                .unwrap(),
        );
        assert_eq!(mode[0]["journal_mode"], json!("wal"));
    }
}
