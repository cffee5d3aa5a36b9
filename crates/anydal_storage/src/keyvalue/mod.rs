//! Key/value store connections (DynamoDB-style).
//!
//! Items are flat attribute maps addressed by a partition key and an
//! optional sort key. Reads and conditional writes take a [`Condition`],
//! the typed form of a DynamoDB condition expression.

mod memory;

pub use memory::MemoryKeyValueStore;

use crate::compare::{compare_values, lookup_field};
use crate::context::CallContext;
use crate::error::StoreResult;
use crate::types::{Cursor, Row};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A key/value item: attribute name to value.
pub type Item = Row;

/// Key schema of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Partition (hash) key attribute.
    pub partition_key: String,
    /// Optional sort (range) key attribute.
    pub sort_key: Option<String>,
}

impl TableSpec {
    /// A table keyed by `partition_key` only.
    pub fn new(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: None,
        }
    }

    /// Adds a sort key.
    #[must_use]
    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    /// Key attribute names, partition key first.
    pub fn key_attributes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition_key.as_str()).chain(self.sort_key.as_deref())
    }

    /// Extracts the key attributes of `item`, or `None` if one is missing.
    #[must_use]
    pub fn key_of(&self, item: &Item) -> Option<Item> {
        self.key_attributes()
            .map(|name| item.get(name).map(|v| (name.to_string(), v.clone())))
            .collect()
    }
}

/// Comparison operators of a condition expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
}

impl CompareOp {
    /// Expression syntax of the operator.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A literal, rendered as an expression attribute value.
    Value(Value),
    /// Another attribute of the same item.
    Attribute(String),
}

/// A condition over one item.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `name op operand`.
    Compare {
        /// Attribute on the left-hand side.
        name: String,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand side.
        operand: Operand,
    },
    /// `attribute_exists(name)`.
    AttributeExists(String),
    /// `attribute_not_exists(name)`.
    AttributeNotExists(String),
    /// Conjunction of at least one condition.
    And(Vec<Condition>),
    /// Disjunction of at least one condition.
    Or(Vec<Condition>),
}

impl Condition {
    /// Builds `name op value`.
    pub fn compare(name: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            name: name.into(),
            op,
            operand: Operand::Value(value.into()),
        }
    }

    /// Builds `left op right` between two attributes.
    pub fn compare_attributes(
        left: impl Into<String>,
        op: CompareOp,
        right: impl Into<String>,
    ) -> Self {
        Self::Compare {
            name: left.into(),
            op,
            operand: Operand::Attribute(right.into()),
        }
    }

    /// Conjunction of `self` and `other`, flattening nested conjunctions.
    #[must_use]
    pub fn and(self, other: Condition) -> Self {
        let mut parts = match self {
            Self::And(parts) => parts,
            single => vec![single],
        };
        match other {
            Self::And(more) => parts.extend(more),
            single => parts.push(single),
        }
        Self::And(parts)
    }

    /// Evaluates the condition against an item.
    ///
    /// Attribute names may be document paths (`address.city`, `tags.0`)
    /// into nested maps and lists. A comparison involving a missing
    /// attribute is false, whatever the operator. Values of different kinds
    /// are never ordered.
    #[must_use]
    pub fn evaluate(&self, item: &Item) -> bool {
        match self {
            Self::Compare { name, op, operand } => {
                let Some(left) = lookup_field(item, name) else {
                    return false;
                };
                let right = match operand {
                    Operand::Value(value) => Some(value),
                    Operand::Attribute(other) => lookup_field(item, other),
                };
                match right.and_then(|right| compare_values(left, right)) {
                    Some(ordering) => op.accepts(ordering),
                    None => *op == CompareOp::Ne && right.is_some(),
                }
            }
            Self::AttributeExists(name) => lookup_field(item, name).is_some(),
            Self::AttributeNotExists(name) => lookup_field(item, name).is_none(),
            Self::And(parts) => parts.iter().all(|c| c.evaluate(item)),
            Self::Or(parts) => parts.iter().any(|c| c.evaluate(item)),
        }
    }

    /// Renders the condition as an expression with placeholder maps.
    #[must_use]
    pub fn render(&self) -> Expression {
        let mut expression = Expression::default();
        let text = expression.render(self);
        expression.text = text;
        expression
    }
}

/// A rendered condition expression.
///
/// Attribute names are referenced as `#n0, #n1, ..` and literals as
/// `:v0, :v1, ..`, exactly as a DynamoDB request carries them. A document
/// path renders one placeholder per map key, list positions inline:
/// `tags.0.label` becomes `#n0[0].#n1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    /// Expression text, e.g. `(#n0 >= :v0 AND #n0 < :v1)`.
    pub text: String,
    /// Placeholder to attribute name.
    pub names: BTreeMap<String, String>,
    /// Placeholder to literal value.
    pub values: BTreeMap<String, Value>,
}

impl Expression {
    fn path(&mut self, attribute: &str) -> String {
        let mut rendered = String::new();
        for (i, segment) in attribute.split('.').enumerate() {
            if i > 0 && !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                rendered.push_str(&format!("[{segment}]"));
                continue;
            }
            if i > 0 {
                rendered.push('.');
            }
            rendered.push_str(&self.name(segment));
        }
        rendered
    }

    fn name(&mut self, attribute: &str) -> String {
        if let Some((placeholder, _)) = self.names.iter().find(|(_, n)| *n == attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.to_string());
        placeholder
    }

    fn value(&mut self, value: &Value) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value.clone());
        placeholder
    }

    fn render(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Compare { name, op, operand } => {
                let left = self.path(name);
                let right = match operand {
                    Operand::Value(value) => self.value(value),
                    Operand::Attribute(other) => self.path(other),
                };
                format!("{left} {} {right}", op.symbol())
            }
            Condition::AttributeExists(name) => format!("attribute_exists({})", self.path(name)),
            Condition::AttributeNotExists(name) => {
                format!("attribute_not_exists({})", self.path(name))
            }
            Condition::And(parts) => self.join(parts, " AND "),
            Condition::Or(parts) => self.join(parts, " OR "),
        }
    }

    fn join(&mut self, parts: &[Condition], separator: &str) -> String {
        let rendered: Vec<String> = parts.iter().map(|part| self.render(part)).collect();
        format!("({})", rendered.join(separator))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render().text)
    }
}

/// The primitive operations a key/value DAO needs from its store.
pub trait KeyValueConnection: Send + Sync {
    /// Returns the key schema of `table`.
    ///
    /// # Errors
    ///
    /// [`crate::StoreError::NoSuchStorage`] when the table does not exist.
    fn describe_table(&self, ctx: &CallContext, table: &str) -> StoreResult<TableSpec>;

    /// Fetches one item by its full key.
    fn get_item(&self, ctx: &CallContext, table: &str, key: &Item) -> StoreResult<Option<Item>>;

    /// Scans `table`, returning the items for which `filter` holds.
    fn scan(
        &self,
        ctx: &CallContext,
        table: &str,
        filter: Option<&Condition>,
    ) -> StoreResult<Cursor<Item>>;

    /// Writes `item`, replacing any item with the same key.
    ///
    /// With a condition, the write happens only if the condition holds for
    /// the current item (an absent item has no attributes); otherwise
    /// [`crate::StoreError::ConditionFailed`] is returned.
    fn put_item(
        &self,
        ctx: &CallContext,
        table: &str,
        item: Item,
        condition: Option<&Condition>,
    ) -> StoreResult<()>;

    /// Deletes the item with `key`, returning whether one existed.
    ///
    /// Condition handling is as for [`KeyValueConnection::put_item`].
    fn delete_item(
        &self,
        ctx: &CallContext,
        table: &str,
        key: &Item,
        condition: Option<&Condition>,
    ) -> StoreResult<bool>;
}
