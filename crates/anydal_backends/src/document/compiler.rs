//! Filter compilation to filter documents.

use anydal_core::{non_empty, DaoResult, FilterCompiler, FilterKind, FilterNode, Operator, RowMapper};
use anydal_storage::document::Document;
use serde_json::{json, Value};
use tracing::trace;

/// Query operator of a field condition.
fn query_operator(op: Operator) -> &'static str {
    match op {
        Operator::Equal => "$eq",
        Operator::NotEqual => "$ne",
        Operator::Greater => "$gt",
        Operator::GreaterOrEqual => "$gte",
        Operator::Less => "$lt",
        Operator::LessOrEqual => "$lte",
    }
}

/// Compiles filter trees into filter documents.
///
/// | node | document |
/// |------|----------|
/// | `f op v` | `{f: {$op: v}}` |
/// | `a op b` | `{$expr: {$op: ["$a", "$b"]}}` |
/// | `f IS NULL` | `{f: null}` |
/// | `f IS NOT NULL` | `{f: {$ne: null}}` |
/// | `And` / `Or` | `{$and: [..]}` / `{$or: [..]}` |
///
/// A null test matches absent fields as well as stored nulls. An absent
/// filter compiles to the empty document, which matches everything.
pub struct DocumentFilterCompiler<'a> {
    mapper: &'a dyn RowMapper,
}

impl<'a> DocumentFilterCompiler<'a> {
    /// A compiler translating field names through `mapper`.
    pub fn new(mapper: &'a dyn RowMapper) -> Self {
        Self { mapper }
    }

    fn field(&self, storage_id: &str, field: &str) -> String {
        self.mapper.to_db_col_name(storage_id, field)
    }

    fn emit(&self, storage_id: &str, node: &FilterNode) -> DaoResult<Document> {
        let mut doc = Document::new();
        match node {
            FilterNode::FieldOpValue { field, op, value } => {
                doc.insert(
                    self.field(storage_id, field),
                    json!({ query_operator(*op): value }),
                );
            }
            FilterNode::FieldOpField { left, op, right } => {
                let operands = json!([
                    format!("${}", self.field(storage_id, left)),
                    format!("${}", self.field(storage_id, right)),
                ]);
                doc.insert("$expr".to_string(), json!({ query_operator(*op): operands }));
            }
            FilterNode::FieldIsNull { field } => {
                doc.insert(self.field(storage_id, field), Value::Null);
            }
            FilterNode::FieldIsNotNull { field } => {
                doc.insert(self.field(storage_id, field), json!({"$ne": null}));
            }
            FilterNode::And(children) => {
                let clauses = self.clauses(storage_id, non_empty(FilterKind::And, children)?)?;
                doc.insert("$and".to_string(), clauses);
            }
            FilterNode::Or(children) => {
                let clauses = self.clauses(storage_id, non_empty(FilterKind::Or, children)?)?;
                doc.insert("$or".to_string(), clauses);
            }
        }
        Ok(doc)
    }

    fn clauses(&self, storage_id: &str, children: &[FilterNode]) -> DaoResult<Value> {
        children
            .iter()
            .map(|child| self.emit(storage_id, child).map(Value::Object))
            .collect::<DaoResult<Vec<_>>>()
            .map(Value::Array)
    }
}

impl FilterCompiler for DocumentFilterCompiler<'_> {
    type Query = Document;

    fn compile(&self, storage_id: &str, filter: Option<&FilterNode>) -> DaoResult<Document> {
        let doc = match filter {
            Some(filter) => self.emit(storage_id, filter)?,
            None => Document::new(),
        };
        trace!(storage_id, filter = %serde_json::Value::Object(doc.clone()), "compiled document filter");
        Ok(doc)
    }
}
