//! Reference evaluation of filter trees over business objects.
//!
//! Backends are checked against this oracle on data where their native
//! null handling agrees:
//!
//! - a comparison with a missing or null side is false, whatever the
//!   operator
//! - values of different kinds never compare
//! - `IS NULL` holds for missing and null fields alike

use anydal_bo::GenericBo;
use anydal_core::FilterNode;
use anydal_storage::compare::compare_values;
use serde_json::Value;
use std::cmp::Ordering;

fn field(bo: &GenericBo, name: &str) -> Option<Value> {
    bo.get_attribute(name, None).ok().flatten()
}

fn compare(left: Option<Value>, right: Option<&Value>, accepts: impl Fn(Ordering) -> bool) -> bool {
    match (left, right) {
        (Some(left), Some(right)) if !right.is_null() => {
            compare_values(&left, right).is_some_and(accepts)
        }
        _ => false,
    }
}

/// Returns true if `bo` satisfies `filter`.
pub fn evaluate(filter: &FilterNode, bo: &GenericBo) -> bool {
    match filter {
        FilterNode::FieldOpValue { field: name, op, value } => {
            compare(field(bo, name), Some(value), |o| op.accepts(o))
        }
        FilterNode::FieldOpField { left, op, right } => {
            let right = field(bo, right);
            compare(field(bo, left), right.as_ref(), |o| op.accepts(o))
        }
        FilterNode::FieldIsNull { field: name } => field(bo, name).is_none(),
        FilterNode::FieldIsNotNull { field: name } => field(bo, name).is_some(),
        FilterNode::And(children) => children.iter().all(|child| evaluate(child, bo)),
        FilterNode::Or(children) => children.iter().any(|child| evaluate(child, bo)),
    }
}

/// Returns the records satisfying `filter`, in their original order.
pub fn select<'a>(filter: &FilterNode, records: &'a [GenericBo]) -> Vec<&'a GenericBo> {
    records.iter().filter(|bo| evaluate(filter, bo)).collect()
}
