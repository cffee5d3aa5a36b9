//! The filter expression tree.
//!
//! A [`FilterNode`] is a backend-independent predicate over one record.
//! Field names are business-object field names; compilers translate them
//! through the row mapper before emitting a native query.
//!
//! An absent filter (`None` wherever an `Option<&FilterNode>` is taken)
//! matches every record.

use crate::error::{DaoError, DaoResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `=`
    Equal,
    /// `<>`
    NotEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
}

impl Operator {
    /// Every operator.
    pub const ALL: [Operator; 6] = [
        Self::Equal,
        Self::NotEqual,
        Self::Greater,
        Self::GreaterOrEqual,
        Self::Less,
        Self::LessOrEqual,
    ];

    /// Returns true if `ordering` (left compared to right) satisfies the
    /// operator.
    #[must_use]
    pub const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Equal => matches!(ordering, Ordering::Equal),
            Self::NotEqual => !matches!(ordering, Ordering::Equal),
            Self::Greater => matches!(ordering, Ordering::Greater),
            Self::GreaterOrEqual => !matches!(ordering, Ordering::Less),
            Self::Less => matches!(ordering, Ordering::Less),
            Self::LessOrEqual => !matches!(ordering, Ordering::Greater),
        }
    }

    /// SQL spelling of the operator.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
        }
    }
}

/// Variant tags of [`FilterNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// [`FilterNode::FieldOpValue`]
    FieldOpValue,
    /// [`FilterNode::FieldOpField`]
    FieldOpField,
    /// [`FilterNode::FieldIsNull`]
    FieldIsNull,
    /// [`FilterNode::FieldIsNotNull`]
    FieldIsNotNull,
    /// [`FilterNode::And`]
    And,
    /// [`FilterNode::Or`]
    Or,
}

impl FilterKind {
    /// Every variant. Compiler tests iterate this list, so a new variant
    /// must be added here as well.
    pub const ALL: [FilterKind; 6] = [
        Self::FieldOpValue,
        Self::FieldOpField,
        Self::FieldIsNull,
        Self::FieldIsNotNull,
        Self::And,
        Self::Or,
    ];
}

/// A predicate over one record.
///
/// # Example
///
/// ```rust
/// use anydal_core::{FilterNode, Operator};
///
/// let filter = FilterNode::all_of([
///     FilterNode::ge("id", "3"),
///     FilterNode::lt("id", "8"),
/// ])
/// .unwrap();
/// assert_eq!(filter.to_string(), r#"(id >= "3" AND id < "8")"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterNode {
    /// `field op value`.
    FieldOpValue {
        /// Field on the left-hand side.
        field: String,
        /// Comparison operator.
        op: Operator,
        /// Literal on the right-hand side.
        value: Value,
    },
    /// `left op right`, both fields of the same record.
    FieldOpField {
        /// Field on the left-hand side.
        left: String,
        /// Comparison operator.
        op: Operator,
        /// Field on the right-hand side.
        right: String,
    },
    /// The field is null or absent.
    FieldIsNull {
        /// Tested field.
        field: String,
    },
    /// The field is present and not null.
    FieldIsNotNull {
        /// Tested field.
        field: String,
    },
    /// Every child holds.
    And(Vec<FilterNode>),
    /// At least one child holds.
    Or(Vec<FilterNode>),
}

impl FilterNode {
    /// `field op value`.
    pub fn compare(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self::FieldOpValue {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// `field = value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Equal, value)
    }

    /// `field <> value`.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::NotEqual, value)
    }

    /// `field > value`.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Greater, value)
    }

    /// `field >= value`.
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::GreaterOrEqual, value)
    }

    /// `field < value`.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Less, value)
    }

    /// `field <= value`.
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::LessOrEqual, value)
    }

    /// `left op right` between two fields.
    pub fn compare_fields(left: impl Into<String>, op: Operator, right: impl Into<String>) -> Self {
        Self::FieldOpField {
            left: left.into(),
            op,
            right: right.into(),
        }
    }

    /// The field is null or absent.
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::FieldIsNull {
            field: field.into(),
        }
    }

    /// The field is present and not null.
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::FieldIsNotNull {
            field: field.into(),
        }
    }

    /// Conjunction of `children`; `None` when there are none.
    pub fn all_of(children: impl IntoIterator<Item = FilterNode>) -> Option<Self> {
        let children: Vec<_> = children.into_iter().collect();
        (!children.is_empty()).then_some(Self::And(children))
    }

    /// Disjunction of `children`; `None` when there are none.
    pub fn any_of(children: impl IntoIterator<Item = FilterNode>) -> Option<Self> {
        let children: Vec<_> = children.into_iter().collect();
        (!children.is_empty()).then_some(Self::Or(children))
    }

    /// Returns the variant tag.
    #[must_use]
    pub const fn kind(&self) -> FilterKind {
        match self {
            Self::FieldOpValue { .. } => FilterKind::FieldOpValue,
            Self::FieldOpField { .. } => FilterKind::FieldOpField,
            Self::FieldIsNull { .. } => FilterKind::FieldIsNull,
            Self::FieldIsNotNull { .. } => FilterKind::FieldIsNotNull,
            Self::And(_) => FilterKind::And,
            Self::Or(_) => FilterKind::Or,
        }
    }

    /// Checks that every composite in the tree has at least one child.
    ///
    /// # Errors
    ///
    /// Returns [`DaoError::InvalidFilter`] naming the first empty composite.
    pub fn validate(&self) -> DaoResult<()> {
        match self {
            Self::FieldOpValue { .. }
            | Self::FieldOpField { .. }
            | Self::FieldIsNull { .. }
            | Self::FieldIsNotNull { .. } => Ok(()),
            Self::And(children) | Self::Or(children) => {
                non_empty(self.kind(), children)?;
                children.iter().try_for_each(Self::validate)
            }
        }
    }
}

/// Returns `children`, or an error if a composite of `kind` has none.
///
/// # Errors
///
/// Returns [`DaoError::InvalidFilter`] for an empty composite.
pub fn non_empty(kind: FilterKind, children: &[FilterNode]) -> DaoResult<&[FilterNode]> {
    if children.is_empty() {
        Err(DaoError::invalid_filter(format!("{kind:?} without children")))
    } else {
        Ok(children)
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldOpValue { field, op, value } => {
                write!(f, "{field} {} {value}", op.symbol())
            }
            Self::FieldOpField { left, op, right } => write!(f, "{left} {} {right}", op.symbol()),
            Self::FieldIsNull { field } => write!(f, "{field} IS NULL"),
            Self::FieldIsNotNull { field } => write!(f, "{field} IS NOT NULL"),
            Self::And(children) | Self::Or(children) => {
                let separator = if matches!(self, Self::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(separator)?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    /// Business-object field name.
    pub field: String,
    /// Sort from largest to smallest.
    pub descending: bool,
}

/// Ordered sort keys; earlier keys take priority, later keys break ties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortingSpec {
    fields: Vec<SortField>,
}

impl SortingSpec {
    /// No sorting: records come back in store order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an ascending key.
    #[must_use]
    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.fields.push(SortField {
            field: field.into(),
            descending: false,
        });
        self
    }

    /// Appends a descending key.
    #[must_use]
    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.fields.push(SortField {
            field: field.into(),
            descending: true,
        });
        self
    }

    /// Returns the keys in priority order.
    #[must_use]
    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    /// Returns true if there are no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builders_reject_empty_composites() {
        assert_eq!(FilterNode::all_of([]), None);
        assert_eq!(FilterNode::any_of(Vec::new()), None);
        let single = FilterNode::any_of([FilterNode::is_null("a")]).unwrap();
        assert_eq!(single, FilterNode::Or(vec![FilterNode::is_null("a")]));
    }

    #[test]
    fn validate_finds_nested_empty_composite() {
        let tree = FilterNode::And(vec![FilterNode::eq("a", 1), FilterNode::Or(vec![])]);
        assert!(matches!(tree.validate(), Err(DaoError::InvalidFilter { .. })));
        assert!(FilterNode::eq("a", 1).validate().is_ok());
    }

    #[test]
    fn kinds_cover_every_variant() {
        let samples = [
            FilterNode::eq("a", 1),
            FilterNode::compare_fields("a", Operator::Less, "b"),
            FilterNode::is_null("a"),
            FilterNode::is_not_null("a"),
            FilterNode::And(vec![FilterNode::is_null("a")]),
            FilterNode::Or(vec![FilterNode::is_null("a")]),
        ];
        let kinds: Vec<FilterKind> = samples.iter().map(FilterNode::kind).collect();
        assert_eq!(kinds, FilterKind::ALL.to_vec());
    }

    #[test]
    fn operators_accept_orderings() {
        use Ordering::{Equal, Greater, Less};
        assert!(Operator::GreaterOrEqual.accepts(Equal));
        assert!(!Operator::Greater.accepts(Equal));
        assert!(Operator::NotEqual.accepts(Less));
        assert!(Operator::LessOrEqual.accepts(Less));
        assert!(!Operator::Less.accepts(Greater));
    }

    #[test]
    fn display_keeps_grouping() {
        let tree = FilterNode::Or(vec![
            FilterNode::And(vec![FilterNode::gt("a", 1), FilterNode::ne("b", "x")]),
            FilterNode::is_not_null("c"),
        ]);
        assert_eq!(tree.to_string(), r#"((a > 1 AND b <> "x") OR c IS NOT NULL)"#);
    }

    #[test]
    fn filters_serialize() {
        let tree = FilterNode::le("n", 2);
        let encoded = serde_json::to_value(&tree).unwrap();
        assert_eq!(
            encoded,
            json!({"FieldOpValue": {"field": "n", "op": "LessOrEqual", "value": 2}})
        );
        let decoded: FilterNode = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn sorting_keeps_priority() {
        let sorting = SortingSpec::new().desc("id").asc("name");
        assert_eq!(sorting.fields()[0].field, "id");
        assert!(sorting.fields()[0].descending);
        assert!(!sorting.fields()[1].descending);
        assert!(SortingSpec::new().is_empty());
    }
}
