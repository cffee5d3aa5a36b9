//! Filter compilation to SQL `WHERE` fragments.

use anydal_core::{
    non_empty, DaoResult, FilterCompiler, FilterKind, FilterNode, RowMapper,
};
use anydal_storage::SqlFlavor;
use serde_json::Value;
use tracing::trace;

/// A compiled SQL condition with its positional parameters.
///
/// An empty clause matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    /// Condition text without the `WHERE` keyword.
    pub clause: String,
    /// Parameter values, in placeholder order.
    pub params: Vec<Value>,
}

impl SqlFragment {
    /// Returns true if the fragment matches every row.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }

    /// ` WHERE <clause>`, or nothing for an empty fragment.
    #[must_use]
    pub fn where_clause(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clause)
        }
    }
}

/// Compiles filter trees into [`SqlFragment`]s for one dialect.
///
/// Values are never inlined; each becomes a placeholder numbered from
/// [`SqlFilterCompiler::first_param`] on, so a fragment can follow other
/// parameters in the same statement. Every composite is parenthesized.
///
/// # Example
///
/// ```rust
/// use anydal_backends::sql::SqlFilterCompiler;
/// use anydal_core::{FilterCompiler, FilterNode, GenericRowMapper};
/// use anydal_storage::SqlFlavor;
/// use serde_json::json;
///
/// let mapper = GenericRowMapper::new();
/// let compiler = SqlFilterCompiler::new(SqlFlavor::PostgreSql, &mapper);
/// let filter = FilterNode::all_of([FilterNode::ge("id", "3"), FilterNode::lt("id", "8")]);
/// let fragment = compiler.compile("t", filter.as_ref()).unwrap();
///
/// assert_eq!(fragment.clause, r#"("id" >= $1 AND "id" < $2)"#);
/// assert_eq!(fragment.params, vec![json!("3"), json!("8")]);
/// ```
pub struct SqlFilterCompiler<'a> {
    flavor: SqlFlavor,
    mapper: &'a dyn RowMapper,
    first_param: usize,
}

impl<'a> SqlFilterCompiler<'a> {
    /// A compiler numbering parameters from 1.
    pub fn new(flavor: SqlFlavor, mapper: &'a dyn RowMapper) -> Self {
        Self {
            flavor,
            mapper,
            first_param: 1,
        }
    }

    /// Numbers parameters from `first` instead of 1.
    #[must_use]
    pub fn first_param(mut self, first: usize) -> Self {
        self.first_param = first;
        self
    }

    fn column(&self, storage_id: &str, field: &str) -> String {
        self.flavor
            .quote_ident(&self.mapper.to_db_col_name(storage_id, field))
    }

    fn emit(&self, storage_id: &str, node: &FilterNode, out: &mut SqlFragment) -> DaoResult<()> {
        match node {
            FilterNode::FieldOpValue { field, op, value } => {
                let placeholder = self.flavor.placeholder(self.first_param + out.params.len());
                out.clause.push_str(&format!(
                    "{} {} {placeholder}",
                    self.column(storage_id, field),
                    op.symbol()
                ));
                out.params.push(value.clone());
            }
            FilterNode::FieldOpField { left, op, right } => {
                out.clause.push_str(&format!(
                    "{} {} {}",
                    self.column(storage_id, left),
                    op.symbol(),
                    self.column(storage_id, right)
                ));
            }
            FilterNode::FieldIsNull { field } => {
                out.clause
                    .push_str(&format!("{} IS NULL", self.column(storage_id, field)));
            }
            FilterNode::FieldIsNotNull { field } => {
                out.clause
                    .push_str(&format!("{} IS NOT NULL", self.column(storage_id, field)));
            }
            FilterNode::And(children) => {
                self.group(storage_id, non_empty(FilterKind::And, children)?, " AND ", out)?;
            }
            FilterNode::Or(children) => {
                self.group(storage_id, non_empty(FilterKind::Or, children)?, " OR ", out)?;
            }
        }
        Ok(())
    }

    fn group(
        &self,
        storage_id: &str,
        children: &[FilterNode],
        separator: &str,
        out: &mut SqlFragment,
    ) -> DaoResult<()> {
        out.clause.push('(');
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                out.clause.push_str(separator);
            }
            self.emit(storage_id, child, out)?;
        }
        out.clause.push(')');
        Ok(())
    }
}

impl FilterCompiler for SqlFilterCompiler<'_> {
    type Query = SqlFragment;

    fn compile(&self, storage_id: &str, filter: Option<&FilterNode>) -> DaoResult<SqlFragment> {
        let mut fragment = SqlFragment::default();
        if let Some(filter) = filter {
            self.emit(storage_id, filter, &mut fragment)?;
        }
        trace!(storage_id, clause = %fragment.clause, params = fragment.params.len(), "compiled SQL filter");
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anydal_core::{DaoError, GenericRowMapper, Operator, TableMapping};
    use serde_json::json;

    fn mapper() -> GenericRowMapper {
        GenericRowMapper::new()
            .with_table("users", TableMapping::new().column("id", "user_id").column("age", "age"))
    }

    #[test]
    fn absent_filter_matches_all() {
        let mapper = mapper();
        let fragment = SqlFilterCompiler::new(SqlFlavor::Sqlite, &mapper)
            .compile("users", None)
            .unwrap();
        assert!(fragment.is_empty());
        assert_eq!(fragment.where_clause(), "");
    }

    #[test]
    fn every_operator_maps_exactly() {
        let mapper = mapper();
        let compiler = SqlFilterCompiler::new(SqlFlavor::Sqlite, &mapper);
        let symbols: Vec<String> = Operator::ALL
            .iter()
            .map(|op| {
                compiler
                    .compile("users", Some(&FilterNode::compare("age", *op, 1)))
                    .unwrap()
                    .clause
            })
            .collect();
        assert_eq!(
            symbols,
            [
                "\"age\" = ?",
                "\"age\" <> ?",
                "\"age\" > ?",
                "\"age\" >= ?",
                "\"age\" < ?",
                "\"age\" <= ?"
            ]
        );
    }

    #[test]
    fn fields_are_mapped_and_grouping_kept() {
        let mapper = mapper();
        let filter = FilterNode::And(vec![
            FilterNode::Or(vec![FilterNode::eq("id", 1), FilterNode::is_null("age")]),
            FilterNode::compare_fields("age", Operator::Greater, "id"),
            FilterNode::is_not_null("id"),
        ]);
        let fragment = SqlFilterCompiler::new(SqlFlavor::MySql, &mapper)
            .compile("users", Some(&filter))
            .unwrap();
        assert_eq!(
            fragment.clause,
            "((`user_id` = ? OR `age` IS NULL) AND `age` > `user_id` AND `user_id` IS NOT NULL)"
        );
        assert_eq!(fragment.params, vec![json!(1)]);
    }

    #[test]
    fn numbering_continues_from_first_param() {
        let mapper = mapper();
        let filter = FilterNode::And(vec![FilterNode::eq("id", 1), FilterNode::eq("age", 2)]);
        let fragment = SqlFilterCompiler::new(SqlFlavor::MsSql, &mapper)
            .first_param(3)
            .compile("users", Some(&filter))
            .unwrap();
        assert_eq!(fragment.clause, "([user_id] = @p3 AND [age] = @p4)");
    }

    #[test]
    fn empty_composite_is_rejected() {
        let mapper = mapper();
        let err = SqlFilterCompiler::new(SqlFlavor::Oracle, &mapper)
            .compile("users", Some(&FilterNode::Or(vec![])))
            .unwrap_err();
        assert!(matches!(err, DaoError::InvalidFilter { .. }));
    }
}
