//! Translation between business objects and native rows.

use crate::error::{DaoError, DaoResult};
use anydal_bo::GenericBo;
use anydal_storage::Row;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Projection of a storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Columns {
    /// The storage is schemaless; every attribute is returned.
    All,
    /// The full ordered column list.
    List(Vec<String>),
}

/// Translates business objects to and from one backend's native rows.
///
/// Every method is parameterized by the storage identifier (table or
/// collection name) because mappings are configured per storage. Filter
/// compilers resolve field names through the same mapper, so filters and
/// decoded rows agree on field identity.
pub trait RowMapper: Send + Sync {
    /// Converts a business object into a native row.
    ///
    /// # Errors
    ///
    /// Fails when the object's root is not a map or a value has no native
    /// representation.
    fn to_native_row(&self, storage_id: &str, bo: &GenericBo) -> DaoResult<Row>;

    /// Converts a native row into a business object. An absent row yields
    /// `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Fails when a stored value cannot be decoded.
    fn to_bo(&self, storage_id: &str, row: Option<Row>) -> DaoResult<Option<GenericBo>>;

    /// Returns the projection used when fetching from `storage_id`.
    fn columns_list(&self, storage_id: &str) -> Columns;

    /// Translates a business-object field name into a column name.
    fn to_db_col_name(&self, storage_id: &str, field: &str) -> String;

    /// Translates a column name into a business-object field name.
    fn to_bo_field_name(&self, storage_id: &str, column: &str) -> String;
}

/// Name mapping of one storage.
///
/// # Example
///
/// ```rust
/// use anydal_core::TableMapping;
///
/// let mapping = TableMapping::new()
///     .column("id", "user_id")
///     .column("name", "name")
///     .json_column("address", "address_json");
/// assert_eq!(mapping.to_column("id"), "user_id");
/// assert_eq!(mapping.to_field("address_json"), "address");
/// assert!(mapping.is_json_column("address_json"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMapping {
    field_to_column: HashMap<String, String>,
    column_to_field: HashMap<String, String>,
    columns: Vec<String>,
    json_columns: HashSet<String>,
}

impl TableMapping {
    /// An empty mapping: identity names, all columns.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `field` to `column` and appends the column to the projection.
    #[must_use]
    pub fn column(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        let (field, column) = (field.into(), column.into());
        self.field_to_column.insert(field.clone(), column.clone());
        self.column_to_field.insert(column.clone(), field);
        if !self.columns.contains(&column) {
            self.columns.push(column);
        }
        self
    }

    /// Like [`TableMapping::column`], for a column holding nested values
    /// as JSON text.
    #[must_use]
    pub fn json_column(self, field: impl Into<String>, column: impl Into<String>) -> Self {
        let column = column.into();
        let mut mapping = self.column(field, column.clone());
        mapping.json_columns.insert(column);
        mapping
    }

    /// Renames `field` without adding it to the projection.
    #[must_use]
    pub fn rename(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        let (field, column) = (field.into(), column.into());
        self.field_to_column.insert(field.clone(), column.clone());
        self.column_to_field.insert(column, field);
        self
    }

    /// Column name of `field`; identity when unmapped.
    #[must_use]
    pub fn to_column<'a>(&'a self, field: &'a str) -> &'a str {
        self.field_to_column.get(field).map_or(field, String::as_str)
    }

    /// Field name of `column`; identity when unmapped.
    #[must_use]
    pub fn to_field<'a>(&'a self, column: &'a str) -> &'a str {
        self.column_to_field.get(column).map_or(column, String::as_str)
    }

    /// The configured projection, in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns true if `column` stores JSON text.
    #[must_use]
    pub fn is_json_column(&self, column: &str) -> bool {
        self.json_columns.contains(column)
    }
}

/// Row mapper driven by per-storage [`TableMapping`]s.
///
/// Only top-level attributes are renamed; values pass through unchanged.
/// Storages without a mapping use identity names and [`Columns::All`].
/// Backend mappers wrap this type and adjust value encoding.
#[derive(Debug, Clone, Default)]
pub struct GenericRowMapper {
    tables: HashMap<String, TableMapping>,
}

impl GenericRowMapper {
    /// A mapper with no configured storages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the mapping of `storage_id`.
    #[must_use]
    pub fn with_table(mut self, storage_id: impl Into<String>, mapping: TableMapping) -> Self {
        self.tables.insert(storage_id.into(), mapping);
        self
    }

    /// Returns the mapping of `storage_id`, if configured.
    #[must_use]
    pub fn mapping(&self, storage_id: &str) -> Option<&TableMapping> {
        self.tables.get(storage_id)
    }

    /// Renames the top-level attributes of a business object to columns.
    ///
    /// # Errors
    ///
    /// Returns [`DaoError::Mapping`] if the object's root is not a map.
    pub fn rename_to_columns(&self, storage_id: &str, bo: &GenericBo) -> DaoResult<Row> {
        let fields = bo
            .to_map()
            .map_err(|e| DaoError::mapping(format!("cannot map into {storage_id}: {e}")))?;
        Ok(fields
            .into_iter()
            .map(|(field, value)| (self.to_db_col_name(storage_id, &field), value))
            .collect())
    }

    /// Renames the columns of a row to business-object fields.
    #[must_use]
    pub fn rename_to_fields(&self, storage_id: &str, row: Row) -> serde_json::Map<String, Value> {
        row.into_iter()
            .map(|(column, value)| (self.to_bo_field_name(storage_id, &column), value))
            .collect()
    }
}

impl RowMapper for GenericRowMapper {
    fn to_native_row(&self, storage_id: &str, bo: &GenericBo) -> DaoResult<Row> {
        self.rename_to_columns(storage_id, bo)
    }

    fn to_bo(&self, storage_id: &str, row: Option<Row>) -> DaoResult<Option<GenericBo>> {
        Ok(row.map(|row| GenericBo::from(self.rename_to_fields(storage_id, row))))
    }

    fn columns_list(&self, storage_id: &str) -> Columns {
        match self.mapping(storage_id) {
            Some(mapping) if !mapping.columns().is_empty() => {
                Columns::List(mapping.columns().to_vec())
            }
            _ => Columns::All,
        }
    }

    fn to_db_col_name(&self, storage_id: &str, field: &str) -> String {
        self.mapping(storage_id)
            .map_or(field, |m| m.to_column(field))
            .to_string()
    }

    fn to_bo_field_name(&self, storage_id: &str, column: &str) -> String {
        self.mapping(storage_id)
            .map_or(column, |m| m.to_field(column))
            .to_string()
    }
}
