//! Property-based test generators using proptest.

use anydal_core::{FilterNode, Operator};
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Strategy for a single map key usable in attribute paths.
pub fn path_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,7}").expect("Invalid regex")
}

/// Strategy for attribute paths of one to four segments, each optionally
/// indexed, e.g. `a.b[2].c`.
pub fn path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec((path_key_strategy(), prop::option::of(0usize..4)), 1..5).prop_map(
        |segments| {
            segments
                .into_iter()
                .map(|(key, index)| match index {
                    Some(i) => format!("{key}[{i}]"),
                    None => key,
                })
                .collect::<Vec<_>>()
                .join(".")
        },
    )
}

/// Strategy for non-null scalar values.
///
/// Floats are quarter steps, which survive a trip through JSON text
/// unchanged.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1_000_000i32..1_000_000).prop_map(|n| Value::from(f64::from(n) / 4.0)),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
    ]
}

/// Strategy for arbitrary JSON trees, nulls included.
pub fn json_tree_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![Just(Value::Null), scalar_strategy()];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec((path_key_strategy(), inner), 0..6)
                .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Strategy for map-rooted JSON trees.
pub fn json_document_strategy() -> impl Strategy<Value = Value> {
    prop::collection::vec((path_key_strategy(), json_tree_strategy()), 0..6)
        .prop_map(|entries| Value::Object(entries.into_iter().collect()))
}

/// Strategy for comparison operators.
pub fn operator_strategy() -> impl Strategy<Value = Operator> {
    prop::sample::select(Operator::ALL.to_vec())
}

/// Strategy for filter trees over the fixture fields.
///
/// Comparisons keep each field to its own value kind, so every backend
/// evaluates the tree the same way.
pub fn fixture_filter_strategy() -> impl Strategy<Value = FilterNode> {
    let id = (0u8..12).prop_map(|i| Value::String(i.to_string()));
    let number = (-1i64..11).prop_map(Value::from);
    let leaf = prop_oneof![
        (operator_strategy(), id).prop_map(|(op, v)| FilterNode::compare("id", op, v)),
        (operator_strategy(), number.clone()).prop_map(|(op, v)| FilterNode::compare("rank", op, v)),
        (operator_strategy(), number).prop_map(|(op, v)| FilterNode::compare("score", op, v)),
        operator_strategy().prop_map(|op| FilterNode::compare_fields("rank", op, "score")),
        Just(FilterNode::is_null("tag")),
        Just(FilterNode::is_not_null("tag")),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(FilterNode::And),
            prop::collection::vec(inner, 1..4).prop_map(FilterNode::Or),
        ]
    })
}

/// Case budget for property tests.
///
/// [`PropTestConfig::default`] suits pure in-memory properties over
/// business objects and filters. [`PropTestConfig::quick`] is for runs that
/// query a seeded store once per case.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Generated cases per property.
    pub cases: u32,
    /// Shrinking steps spent on a failing case.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// A smaller budget for properties that hit a store on every case.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// The matching `proptest` runner configuration.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anydal_bo::GenericBo;

    #[test]
    fn quick_budget_carries_into_the_runner() {
        let config = PropTestConfig::quick().to_proptest_config();
        assert_eq!(config.cases, 32);
        assert_eq!(config.max_shrink_iters, 100);
        assert!(PropTestConfig::quick().cases < PropTestConfig::default().cases);
    }

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn paths_parse(path in path_strategy()) {
            prop_assert!(anydal_bo::path::parse(&path).is_ok());
        }

        #[test]
        fn documents_are_maps(doc in json_document_strategy()) {
            prop_assert!(GenericBo::from_value(doc).to_map().is_ok());
        }

        #[test]
        fn fixture_filters_validate(filter in fixture_filter_strategy()) {
            prop_assert!(filter.validate().is_ok());
        }
    }
}
