//! Relational store connections.
//!
//! Statements are plain SQL text with positional parameters in the
//! connection's [`SqlFlavor`]. Values travel as JSON values; each
//! connection converts them to and from its native column types.

use crate::context::CallContext;
use crate::error::StoreResult;
use crate::types::{Cursor, IsolationLevel, Row};
use serde_json::Value;

/// SQL dialect of a relational connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SqlFlavor {
    /// SQLite: `"x"`, `?`, `LIMIT/OFFSET`.
    #[default]
    Sqlite,
    /// MySQL / MariaDB: `` `x` ``, `?`, `LIMIT/OFFSET`.
    MySql,
    /// PostgreSQL: `"x"`, `$1`, `LIMIT/OFFSET`.
    PostgreSql,
    /// SQL Server: `[x]`, `@p1`, `OFFSET .. FETCH`.
    MsSql,
    /// Oracle: `"x"`, `:1`, `OFFSET .. FETCH`.
    Oracle,
}

impl SqlFlavor {
    /// Quotes an identifier, doubling any embedded closing quote.
    #[must_use]
    pub fn quote_ident(self, ident: &str) -> String {
        match self {
            Self::Sqlite | Self::PostgreSql | Self::Oracle => {
                format!("\"{}\"", ident.replace('"', "\"\""))
            }
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
            Self::MsSql => format!("[{}]", ident.replace(']', "]]")),
        }
    }

    /// Placeholder for the `n`-th parameter, counting from 1.
    #[must_use]
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Self::Sqlite | Self::MySql => "?".to_string(),
            Self::PostgreSql => format!("${n}"),
            Self::MsSql => format!("@p{n}"),
            Self::Oracle => format!(":{n}"),
        }
    }

    /// Paging clause appended after the (optional) `ORDER BY`.
    ///
    /// `limit == 0` means unbounded. Returns an empty string when neither
    /// offset nor limit restricts the result.
    #[must_use]
    pub fn paging_clause(self, offset: u64, limit: u64, sorted: bool) -> String {
        if offset == 0 && limit == 0 {
            return String::new();
        }
        match self {
            Self::Sqlite => match limit {
                0 => format!(" LIMIT -1 OFFSET {offset}"),
                _ => format!(" LIMIT {limit} OFFSET {offset}"),
            },
            Self::MySql => match limit {
                // MySQL has no unbounded LIMIT.
                0 => format!(" LIMIT {offset}, 18446744073709551615"),
                _ => format!(" LIMIT {limit} OFFSET {offset}"),
            },
            Self::PostgreSql => match limit {
                0 => format!(" OFFSET {offset}"),
                _ => format!(" LIMIT {limit} OFFSET {offset}"),
            },
            Self::MsSql | Self::Oracle => {
                let mut clause = String::new();
                if self == Self::MsSql && !sorted {
                    clause.push_str(" ORDER BY (SELECT NULL)");
                }
                clause.push_str(&format!(" OFFSET {offset} ROWS"));
                if limit > 0 {
                    clause.push_str(&format!(" FETCH NEXT {limit} ROWS ONLY"));
                }
                clause
            }
        }
    }
}

/// Executes statements on a relational store.
///
/// Implemented both by connections and by the transaction handles they pass
/// to [`SqlConnection::transaction`].
pub trait SqlExecutor {
    /// Dialect of the statements this executor accepts.
    fn flavor(&self) -> SqlFlavor;

    /// Runs a query, returning its rows keyed by column name.
    fn query(&self, ctx: &CallContext, sql: &str, params: &[Value]) -> StoreResult<Cursor<Row>>;

    /// Runs a statement, returning the number of affected rows.
    fn execute(&self, ctx: &CallContext, sql: &str, params: &[Value]) -> StoreResult<u64>;
}

/// A relational connection shared between threads.
pub trait SqlConnection: SqlExecutor + Send + Sync {
    /// Returns this connection as a plain executor, outside any
    /// transaction.
    fn as_executor(&self) -> &dyn SqlExecutor;

    /// Runs `body` inside one transaction at the requested isolation.
    ///
    /// Commits if `body` succeeds and rolls back otherwise.
    fn transaction(
        &self,
        ctx: &CallContext,
        isolation: IsolationLevel,
        body: &mut dyn FnMut(&dyn SqlExecutor) -> StoreResult<()>,
    ) -> StoreResult<()>;
}
