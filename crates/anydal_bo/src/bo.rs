//! The generic business object.

use crate::coerce::{kind_name, FromAttribute, TargetType};
use crate::error::{BoError, BoResult};
use crate::path;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Shape of the root being iterated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterKind {
    /// The root is a map.
    Map,
    /// The root is a sequence.
    Sequence,
}

/// Position of an element visited by [`GenericBo::iterate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterKey<'a> {
    /// Key of a map entry.
    Field(&'a str),
    /// Position of a sequence element.
    Index(usize),
}

/// A thread-safe, path-addressed attribute bag.
///
/// The root value is absent (`null`) until the first write. A write whose
/// path starts with an index marker turns the root into a sequence; any
/// other write turns it into a map.
///
/// Every accessor takes the object's own reader/writer lock and releases it
/// before returning. Values never leave the object by reference: reads
/// return clones, and JSON export/import copy the whole tree.
///
/// # Example
///
/// ```rust
/// use anydal_bo::GenericBo;
/// use serde_json::json;
///
/// let bo = GenericBo::new();
/// bo.set_attribute("user.name", "Alice").unwrap();
/// bo.set_attribute("user.tags[]", "admin").unwrap();
///
/// assert_eq!(bo.get_as::<String>("user.name").unwrap().as_deref(), Some("Alice"));
/// assert_eq!(bo.get_attribute("user.tags[0]", None).unwrap(), Some(json!("admin")));
/// assert_eq!(bo.get_attribute("user.age", None).unwrap(), None);
/// ```
#[derive(Default)]
pub struct GenericBo {
    root: RwLock<Value>,
}

impl GenericBo {
    /// Creates an empty business object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a business object owning `root`.
    #[must_use]
    pub fn from_value(root: Value) -> Self {
        Self {
            root: RwLock::new(root),
        }
    }

    /// Creates a business object from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not valid JSON.
    pub fn parse(data: &[u8]) -> BoResult<Self> {
        Ok(Self::from_value(serde_json::from_slice(data)?))
    }

    /// Reads the attribute at `path`, converting it to `target` if given.
    ///
    /// Missing attributes are `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed paths and failed conversions.
    pub fn get_attribute(&self, path: &str, target: Option<TargetType>) -> BoResult<Option<Value>> {
        let root = self.root.read();
        path::get(&root, path, target)
    }

    /// Reads the attribute at `path` as a concrete type.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed paths and failed conversions.
    pub fn get_as<T: FromAttribute>(&self, path: &str) -> BoResult<Option<T>> {
        let root = self.root.read();
        match path::get(&root, path, None)? {
            Some(value) => T::from_attribute(&value).map(Some),
            None => Ok(None),
        }
    }

    /// Reads a string attribute and parses it with a chrono format `layout`.
    ///
    /// Layouts with only date fields are accepted and yield midnight.
    ///
    /// # Errors
    ///
    /// Returns an error if the attribute is not a string or does not match
    /// the layout.
    pub fn get_as_time(&self, path: &str, layout: &str) -> BoResult<Option<NaiveDateTime>> {
        let Some(value) = self.get_attribute(path, None)? else {
            return Ok(None);
        };
        let Value::String(text) = &value else {
            return Err(BoError::coercion(kind_name(&value), "time", "expected a string"));
        };

        match NaiveDateTime::parse_from_str(text, layout) {
            Ok(time) => Ok(Some(time)),
            Err(err) => NaiveDate::parse_from_str(text, layout)
                .map(|date| date.and_hms_opt(0, 0, 0))
                .map_err(|_| BoError::Time {
                    value: text.clone(),
                    layout: layout.to_string(),
                    source: err,
                }),
        }
    }

    /// Writes `value` at `path`, creating intermediate containers.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed paths or when an existing scalar blocks
    /// the path.
    pub fn set_attribute(&self, path: &str, value: impl Into<Value>) -> BoResult<()> {
        let value = value.into();
        let mut root = self.root.write();
        path::set(&mut root, path, value)
    }

    /// Serializes the root value to JSON. An absent root yields `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> BoResult<Vec<u8>> {
        let root = self.root.read();
        Ok(serde_json::to_vec(&*root)?)
    }

    /// Replaces the root value with the parsed JSON document.
    ///
    /// The previous content is discarded, not merged. On a parse error the
    /// object is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not valid JSON.
    pub fn from_json(&self, data: &[u8]) -> BoResult<()> {
        let parsed: Value = serde_json::from_slice(data)?;
        *self.root.write() = parsed;
        Ok(())
    }

    /// Copies this object into a freshly deserialized `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the content does not fit `T`.
    pub fn transfer_to<T: DeserializeOwned>(&self) -> BoResult<T> {
        let snapshot = self.snapshot();
        Ok(serde_json::from_value(snapshot)?)
    }

    /// Replaces this object's content with the serialized form of `src`.
    ///
    /// # Errors
    ///
    /// Returns an error if `src` cannot be serialized.
    pub fn import_from<T: Serialize + ?Sized>(&self, src: &T) -> BoResult<()> {
        let value = serde_json::to_value(src)?;
        *self.root.write() = value;
        Ok(())
    }

    /// Visits the top level of a map or sequence root.
    ///
    /// The callback runs on a snapshot, outside the lock, so it may read or
    /// write this same object. Other root kinds visit nothing.
    pub fn iterate<F>(&self, mut callback: F)
    where
        F: FnMut(IterKind, IterKey<'_>, &Value),
    {
        match self.snapshot() {
            Value::Object(map) => {
                for (key, value) in &map {
                    callback(IterKind::Map, IterKey::Field(key), value);
                }
            }
            Value::Array(items) => {
                for (index, value) in items.iter().enumerate() {
                    callback(IterKind::Sequence, IterKey::Index(index), value);
                }
            }
            _ => {}
        }
    }

    /// Returns a deep copy of the root value.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.root.read().clone()
    }

    /// Returns a deep copy of the root as a map.
    ///
    /// A `null` root yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`BoError::NotAMap`] for scalar and sequence roots.
    pub fn to_map(&self) -> BoResult<Map<String, Value>> {
        match self.snapshot() {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(BoError::NotAMap {
                found: kind_name(&other),
            }),
        }
    }

    /// Returns true if the root is absent or an empty container.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &*self.root.read() {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }
}

impl Clone for GenericBo {
    fn clone(&self) -> Self {
        Self::from_value(self.snapshot())
    }
}

impl PartialEq for GenericBo {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.snapshot() == other.snapshot()
    }
}

impl fmt::Debug for GenericBo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GenericBo").field(&*self.root.read()).finish()
    }
}

impl From<Value> for GenericBo {
    fn from(root: Value) -> Self {
        Self::from_value(root)
    }
}

impl From<Map<String, Value>> for GenericBo {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_value(Value::Object(map))
    }
}
