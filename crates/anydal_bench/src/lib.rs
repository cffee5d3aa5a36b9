//! Benchmark workloads.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use anydal_core::FilterNode;
use serde_json::{json, Map, Value};

/// A document nested `depth` maps deep, each level holding `width` scalar
/// fields plus the `next` map.
pub fn nested_document(depth: usize, width: usize) -> Value {
    let mut doc = Value::Null;
    for level in (0..depth).rev() {
        let mut map = Map::new();
        for i in 0..width {
            map.insert(format!("f{i}"), json!(level * width + i));
        }
        if !doc.is_null() {
            map.insert("next".to_string(), doc);
        }
        doc = Value::Object(map);
    }
    doc
}

/// Path to field `f0` at `depth` levels down in a [`nested_document`].
pub fn deep_path(depth: usize) -> String {
    let mut path = vec!["next"; depth.saturating_sub(1)];
    path.push("f0");
    path.join(".")
}

/// A conjunction of `n` alternating range and null tests.
pub fn wide_filter(n: usize) -> FilterNode {
    FilterNode::And(
        (0..n)
            .map(|i| match i % 3 {
                0 => FilterNode::ge(format!("f{i}"), i),
                1 => FilterNode::Or(vec![
                    FilterNode::lt(format!("f{i}"), i),
                    FilterNode::is_null(format!("f{i}")),
                ]),
                _ => FilterNode::is_not_null(format!("f{i}")),
            })
            .collect(),
    )
}

/// A flat record with id `id` and `width` numeric fields.
pub fn record(id: usize, width: usize) -> Value {
    let mut map = Map::new();
    map.insert("id".to_string(), json!(format!("{id:08}")));
    for i in 0..width {
        map.insert(format!("f{i}"), json!(id + i));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anydal_bo::GenericBo;

    #[test]
    fn deep_path_reaches_the_bottom() {
        let bo = GenericBo::from_value(nested_document(4, 2));
        assert_eq!(bo.get_as::<i64>(&deep_path(4)).unwrap(), Some(6));
        assert_eq!(bo.get_as::<i64>(&deep_path(1)).unwrap(), Some(0));
    }

    #[test]
    fn wide_filter_is_valid() {
        assert!(wide_filter(7).validate().is_ok());
    }
}
