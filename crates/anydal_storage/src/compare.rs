//! Value comparison rules used by the reference stores.

use serde_json::Value;
use std::cmp::Ordering;

/// Compares two values of the same kind.
///
/// Numbers compare numerically regardless of integer/float representation,
/// strings bytewise, bools `false < true`. Maps and sequences only compare
/// equal or not. Values of different kinds are incomparable (`None`).
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return Some(x.cmp(&y));
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return Some(x.cmp(&y));
            }
            x.as_f64()?.partial_cmp(&y.as_f64()?)
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            (a == b).then_some(Ordering::Equal)
        }
        _ => None,
    }
}

/// Returns true if the values are equal under [`compare_values`].
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Some(Ordering::Equal)
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order across kinds: missing/null, numbers, strings, maps,
/// sequences, bools. Used for sorting and field-to-field expressions.
#[must_use]
pub fn total_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (rank_a, rank_b) = (type_rank(a), type_rank(b));
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }
    match (a, b) {
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or_else(|| {
            // Same rank but unordered containers: fall back to their text.
            x.to_string().cmp(&y.to_string())
        }),
        _ => Ordering::Equal,
    }
}

/// Looks up a possibly dotted field name (`a.b.c`) inside a record.
#[must_use]
pub fn lookup_field<'a>(record: &'a serde_json::Map<String, Value>, field: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(field) {
        return Some(value);
    }
    let mut parts = field.split('.');
    let first = record.get(parts.next()?)?;
    parts.try_fold(first, |current, part| match current {
        Value::Object(map) => map.get(part),
        Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_compare_across_representations() {
        assert_eq!(compare_values(&json!(1), &json!(1.0)), Some(Ordering::Equal));
        assert_eq!(compare_values(&json!(-2), &json!(1.5)), Some(Ordering::Less));
        assert_eq!(
            compare_values(&json!(u64::MAX), &json!(1)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn different_kinds_are_incomparable() {
        assert_eq!(compare_values(&json!("1"), &json!(1)), None);
        assert_eq!(compare_values(&json!({"a": 1}), &json!({"a": 2})), None);
        assert!(values_equal(&json!([1, 2]), &json!([1, 2])));
    }

    #[test]
    fn total_order_ranks_kinds() {
        assert_eq!(total_order(None, Some(&json!(0))), Ordering::Less);
        assert_eq!(total_order(Some(&json!(9)), Some(&json!("0"))), Ordering::Less);
        assert_eq!(total_order(Some(&json!(null)), None), Ordering::Equal);
        assert_eq!(total_order(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
    }

    #[test]
    fn dotted_lookup() {
        let record = json!({"a": {"b": [10, {"c": 3}]}, "x.y": 1});
        let map = record.as_object().unwrap();
        assert_eq!(lookup_field(map, "a.b.1.c"), Some(&json!(3)));
        assert_eq!(lookup_field(map, "x.y"), Some(&json!(1)));
        assert_eq!(lookup_field(map, "a.z"), None);
    }
}
