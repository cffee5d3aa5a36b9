//! Evaluation of filter documents against records.

use super::Document;
use crate::compare::{compare_values, lookup_field, total_order, values_equal};
use crate::error::{StoreError, StoreResult};
use serde_json::Value;
use std::cmp::Ordering;

/// Returns true if `doc` satisfies `filter`.
///
/// An empty filter matches every document.
///
/// # Errors
///
/// Returns [`StoreError::InvalidQuery`] for unknown operators or badly
/// shaped operator arguments.
pub fn matches(doc: &Document, filter: &Document) -> StoreResult<bool> {
    for (key, condition) in filter {
        let holds = match key.as_str() {
            "$and" => all_clauses(doc, condition, true)?,
            "$or" => all_clauses(doc, condition, false)?,
            "$expr" => eval_expr(doc, condition)?,
            op if op.starts_with('$') => {
                return Err(StoreError::invalid_query(format!(
                    "unsupported top-level operator {op}"
                )))
            }
            field => match_field(lookup_field(doc, field), condition)?,
        };
        if !holds {
            return Ok(false);
        }
    }
    Ok(true)
}

fn all_clauses(doc: &Document, clauses: &Value, conjunction: bool) -> StoreResult<bool> {
    let Value::Array(clauses) = clauses else {
        return Err(StoreError::invalid_query("$and/$or expects an array"));
    };
    if clauses.is_empty() {
        return Err(StoreError::invalid_query("$and/$or needs at least one clause"));
    }
    for clause in clauses {
        let Value::Object(clause) = clause else {
            return Err(StoreError::invalid_query("$and/$or clauses must be documents"));
        };
        if matches(doc, clause)? != conjunction {
            return Ok(!conjunction);
        }
    }
    Ok(conjunction)
}

fn is_operator_doc(condition: &Value) -> bool {
    matches!(condition, Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')))
}

fn match_field(actual: Option<&Value>, condition: &Value) -> StoreResult<bool> {
    let Value::Object(operators) = condition else {
        return Ok(equals(actual, condition));
    };
    if !is_operator_doc(condition) {
        return Ok(equals(actual, condition));
    }

    for (op, operand) in operators {
        let holds = match op.as_str() {
            "$eq" => equals(actual, operand),
            "$ne" => !equals(actual, operand),
            "$gt" => ordered(actual, operand, |o| o == Ordering::Greater),
            "$gte" => ordered(actual, operand, |o| o != Ordering::Less),
            "$lt" => ordered(actual, operand, |o| o == Ordering::Less),
            "$lte" => ordered(actual, operand, |o| o != Ordering::Greater),
            "$exists" => {
                let wanted = operand
                    .as_bool()
                    .ok_or_else(|| StoreError::invalid_query("$exists expects a bool"))?;
                actual.is_some() == wanted
            }
            other => {
                return Err(StoreError::invalid_query(format!(
                    "unsupported field operator {other}"
                )))
            }
        };
        if !holds {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Equality with null matching both null and absent fields.
fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None | Some(Value::Null), Value::Null) => true,
        (Some(actual), expected) => values_equal(actual, expected),
        (None, _) => false,
    }
}

/// Range comparison; only values of the same kind are comparable.
fn ordered(actual: Option<&Value>, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match actual {
        Some(actual) if !actual.is_null() && !operand.is_null() => {
            compare_values(actual, operand).is_some_and(accept)
        }
        _ => false,
    }
}

fn eval_expr(doc: &Document, expr: &Value) -> StoreResult<bool> {
    let Value::Object(map) = expr else {
        return Err(StoreError::invalid_query("$expr expects a document"));
    };
    let mut entries = map.iter();
    let (Some((op, args)), None) = (entries.next(), entries.next()) else {
        return Err(StoreError::invalid_query("$expr expects exactly one operator"));
    };
    let Some([left, right]) = args.as_array().map(Vec::as_slice) else {
        return Err(StoreError::invalid_query(format!("{op} expects two operands")));
    };

    let left = resolve_operand(doc, left);
    let right = resolve_operand(doc, right);
    let ordering = total_order(left, right);
    Ok(match op.as_str() {
        "$eq" => ordering == Ordering::Equal,
        "$ne" => ordering != Ordering::Equal,
        "$gt" => ordering == Ordering::Greater,
        "$gte" => ordering != Ordering::Less,
        "$lt" => ordering == Ordering::Less,
        "$lte" => ordering != Ordering::Greater,
        other => {
            return Err(StoreError::invalid_query(format!(
                "unsupported $expr operator {other}"
            )))
        }
    })
}

/// `"$name"` references a field of the document; anything else is literal.
fn resolve_operand<'a>(doc: &'a Document, operand: &'a Value) -> Option<&'a Value> {
    match operand {
        Value::String(s) if s.starts_with('$') => lookup_field(doc, &s[1..]),
        literal => Some(literal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn empty_filter_matches_all() {
        assert!(matches(&doc(json!({"a": 1})), &Document::new()).unwrap());
    }

    #[test]
    fn implicit_and_explicit_equality() {
        let d = doc(json!({"a": 1, "b": "x"}));
        assert!(matches(&d, &doc(json!({"a": 1}))).unwrap());
        assert!(matches(&d, &doc(json!({"b": {"$eq": "x"}}))).unwrap());
        assert!(!matches(&d, &doc(json!({"a": 2}))).unwrap());
    }

    #[test]
    fn range_operators_use_type_brackets() {
        let d = doc(json!({"n": 5, "s": "5"}));
        assert!(matches(&d, &doc(json!({"n": {"$gt": 4, "$lte": 5}}))).unwrap());
        assert!(!matches(&d, &doc(json!({"s": {"$gt": 4}}))).unwrap());
        assert!(matches(&d, &doc(json!({"s": {"$gte": "5"}}))).unwrap());
    }

    #[test]
    fn null_matches_missing() {
        let d = doc(json!({"a": null}));
        assert!(matches(&d, &doc(json!({"a": null}))).unwrap());
        assert!(matches(&d, &doc(json!({"missing": null}))).unwrap());
        assert!(!matches(&d, &doc(json!({"a": {"$ne": null}}))).unwrap());
        assert!(matches(&doc(json!({"a": 0})), &doc(json!({"a": {"$ne": null}}))).unwrap());
    }

    #[test]
    fn logical_operators_nest() {
        let d = doc(json!({"a": 1, "b": 2}));
        let filter = doc(json!({"$or": [{"a": 5}, {"$and": [{"a": 1}, {"b": {"$lt": 3}}]}]}));
        assert!(matches(&d, &filter).unwrap());
        let filter = doc(json!({"$and": [{"a": 1}, {"b": 3}]}));
        assert!(!matches(&d, &filter).unwrap());
    }

    #[test]
    fn expr_compares_fields() {
        let d = doc(json!({"lo": 1, "hi": 9}));
        assert!(matches(&d, &doc(json!({"$expr": {"$gt": ["$hi", "$lo"]}}))).unwrap());
        assert!(!matches(&d, &doc(json!({"$expr": {"$eq": ["$hi", "$lo"]}}))).unwrap());
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let d = doc(json!({"a": 1}));
        assert!(matches(&d, &doc(json!({"a": {"$regex": "x"}}))).is_err());
        assert!(matches(&d, &doc(json!({"$nor": []}))).is_err());
        assert!(matches(&d, &doc(json!({"$and": []}))).is_err());
    }
}
