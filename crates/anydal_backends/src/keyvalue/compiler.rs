//! Filter compilation to condition expressions.

use anydal_core::{non_empty, DaoResult, FilterCompiler, FilterKind, FilterNode, Operator, RowMapper};
use anydal_storage::keyvalue::{CompareOp, Condition};
use tracing::trace;

fn compare_op(op: Operator) -> CompareOp {
    match op {
        Operator::Equal => CompareOp::Eq,
        Operator::NotEqual => CompareOp::Ne,
        Operator::Greater => CompareOp::Gt,
        Operator::GreaterOrEqual => CompareOp::Ge,
        Operator::Less => CompareOp::Lt,
        Operator::LessOrEqual => CompareOp::Le,
    }
}

/// Compiles filter trees into key/value [`Condition`]s.
///
/// Items never store nulls, so `IS NULL` becomes `attribute_not_exists`
/// and `IS NOT NULL` becomes `attribute_exists`. An absent filter compiles
/// to no condition.
///
/// # Example
///
/// ```rust
/// use anydal_backends::keyvalue::KeyValueFilterCompiler;
/// use anydal_core::{FilterCompiler, FilterNode, GenericRowMapper};
///
/// let mapper = GenericRowMapper::new();
/// let filter = FilterNode::all_of([FilterNode::ge("id", "3"), FilterNode::is_null("gone")]);
/// let condition = KeyValueFilterCompiler::new(&mapper)
///     .compile("t", filter.as_ref())
///     .unwrap()
///     .unwrap();
/// assert_eq!(condition.to_string(), "(#n0 >= :v0 AND attribute_not_exists(#n1))");
/// ```
pub struct KeyValueFilterCompiler<'a> {
    mapper: &'a dyn RowMapper,
}

impl<'a> KeyValueFilterCompiler<'a> {
    /// A compiler translating field names through `mapper`.
    pub fn new(mapper: &'a dyn RowMapper) -> Self {
        Self { mapper }
    }

    fn emit(&self, storage_id: &str, node: &FilterNode) -> DaoResult<Condition> {
        let attribute = |field: &str| self.mapper.to_db_col_name(storage_id, field);
        Ok(match node {
            FilterNode::FieldOpValue { field, op, value } => {
                Condition::compare(attribute(field), compare_op(*op), value.clone())
            }
            FilterNode::FieldOpField { left, op, right } => {
                Condition::compare_attributes(attribute(left), compare_op(*op), attribute(right))
            }
            FilterNode::FieldIsNull { field } => Condition::AttributeNotExists(attribute(field)),
            FilterNode::FieldIsNotNull { field } => Condition::AttributeExists(attribute(field)),
            FilterNode::And(children) => Condition::And(
                self.emit_all(storage_id, non_empty(FilterKind::And, children)?)?,
            ),
            FilterNode::Or(children) => Condition::Or(
                self.emit_all(storage_id, non_empty(FilterKind::Or, children)?)?,
            ),
        })
    }

    fn emit_all(&self, storage_id: &str, children: &[FilterNode]) -> DaoResult<Vec<Condition>> {
        children
            .iter()
            .map(|child| self.emit(storage_id, child))
            .collect()
    }
}

impl FilterCompiler for KeyValueFilterCompiler<'_> {
    type Query = Option<Condition>;

    fn compile(&self, storage_id: &str, filter: Option<&FilterNode>) -> DaoResult<Option<Condition>> {
        let condition = filter
            .map(|filter| self.emit(storage_id, filter))
            .transpose()?;
        if let Some(condition) = &condition {
            trace!(storage_id, %condition, "compiled key/value condition");
        }
        Ok(condition)
    }
}
