//! Row mapping for key/value tables.

use anydal_bo::GenericBo;
use anydal_core::{Columns, DaoResult, GenericRowMapper, RowMapper, TableMapping};
use anydal_storage::Row;
use serde_json::Value;

/// Row mapper for key/value tables.
///
/// Top-level attributes are renamed through the table's [`TableMapping`].
/// Null attributes are left out of written items, so an absent attribute
/// and a null field mean the same thing.
#[derive(Debug, Clone, Default)]
pub struct KeyValueRowMapper {
    inner: GenericRowMapper,
}

impl KeyValueRowMapper {
    /// A mapper with identity names.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the mapping of `table`.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>, mapping: TableMapping) -> Self {
        self.inner = self.inner.with_table(table, mapping);
        self
    }
}

impl From<GenericRowMapper> for KeyValueRowMapper {
    fn from(inner: GenericRowMapper) -> Self {
        Self { inner }
    }
}

impl RowMapper for KeyValueRowMapper {
    fn to_native_row(&self, storage_id: &str, bo: &GenericBo) -> DaoResult<Row> {
        let mut item = self.inner.rename_to_columns(storage_id, bo)?;
        item.retain(|_, value| !value.is_null());
        Ok(item)
    }

    fn to_bo(&self, storage_id: &str, row: Option<Row>) -> DaoResult<Option<GenericBo>> {
        Ok(row.map(|row| GenericBo::from(self.inner.rename_to_fields(storage_id, row))))
    }

    fn columns_list(&self, _storage_id: &str) -> Columns {
        Columns::All
    }

    fn to_db_col_name(&self, storage_id: &str, field: &str) -> String {
        self.inner.to_db_col_name(storage_id, field)
    }

    fn to_bo_field_name(&self, storage_id: &str, column: &str) -> String {
        self.inner.to_bo_field_name(storage_id, column)
    }
}
