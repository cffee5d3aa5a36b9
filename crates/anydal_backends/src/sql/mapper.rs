//! Row mapping for relational tables.

use anydal_bo::GenericBo;
use anydal_core::{Columns, DaoError, DaoResult, GenericRowMapper, RowMapper, TableMapping};
use anydal_storage::Row;
use serde_json::Value;

/// Row mapper for relational tables.
///
/// - Maps and sequences are written as JSON text; columns declared with
///   [`TableMapping::json_column`] are parsed back into values on read.
/// - With a configured column list, every row written carries every column,
///   `NULL` for fields the object lacks, so an update replaces the whole
///   record. A field with no column is a mapping error.
/// - `NULL` columns are left out of decoded objects.
///
/// Decoding only knows what the store returns. A nested value written to a
/// column not declared with [`TableMapping::json_column`] reads back as its
/// JSON text, and SQLite returns booleans as `0`/`1`. Declare JSON columns
/// for every field holding maps or sequences, and read flags with
/// [`GenericBo::get_as`] (which coerces `0`/`1` to `bool`).
#[derive(Debug, Clone, Default)]
pub struct SqlRowMapper {
    inner: GenericRowMapper,
}

impl SqlRowMapper {
    /// A mapper with identity names and no configured tables.
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

    /// Returns the mapping of `table`, if configured.
    #[must_use]
    pub fn mapping(&self, table: &str) -> Option<&TableMapping> {
        self.inner.mapping(table)
    }
}

impl From<GenericRowMapper> for SqlRowMapper {
    fn from(inner: GenericRowMapper) -> Self {
        Self { inner }
    }
}

fn encode(value: Value) -> DaoResult<Value> {
    match value {
        container @ (Value::Array(_) | Value::Object(_)) => serde_json::to_string(&container)
            .map(Value::String)
            .map_err(|e| DaoError::mapping(format!("cannot encode nested value: {e}"))),
        scalar => Ok(scalar),
    }
}

impl RowMapper for SqlRowMapper {
    fn to_native_row(&self, storage_id: &str, bo: &GenericBo) -> DaoResult<Row> {
        let mut renamed = self.inner.rename_to_columns(storage_id, bo)?;
        match self.inner.columns_list(storage_id) {
            Columns::All => renamed
                .into_iter()
                .map(|(column, value)| Ok((column, encode(value)?)))
                .collect(),
            Columns::List(columns) => {
                let mut row = Row::new();
                for column in columns {
                    let value = renamed.remove(&column).unwrap_or(Value::Null);
                    row.insert(column, encode(value)?);
                }
                if let Some(extra) = renamed.keys().next() {
                    return Err(DaoError::mapping(format!(
                        "{storage_id} has no column for field {extra}"
                    )));
                }
                Ok(row)
            }
        }
    }

    fn to_bo(&self, storage_id: &str, row: Option<Row>) -> DaoResult<Option<GenericBo>> {
        let Some(row) = row else {
            return Ok(None);
        };
        let mapping = self.inner.mapping(storage_id);
        let mut fields = serde_json::Map::new();
        for (column, value) in row {
            let value = match value {
                Value::Null => continue,
                Value::String(text) if mapping.is_some_and(|m| m.is_json_column(&column)) => {
                    serde_json::from_str(&text).map_err(|e| {
                        DaoError::mapping(format!(
                            "column {column} of {storage_id} holds invalid JSON: {e}"
                        ))
                    })?
                }
                other => other,
            };
            fields.insert(self.inner.to_bo_field_name(storage_id, &column), value);
        }
        Ok(Some(GenericBo::from(fields)))
    }

    fn columns_list(&self, storage_id: &str) -> Columns {
        self.inner.columns_list(storage_id)
    }

    fn to_db_col_name(&self, storage_id: &str, field: &str) -> String {
        self.inner.to_db_col_name(storage_id, field)
    }

    fn to_bo_field_name(&self, storage_id: &str, column: &str) -> String {
        self.inner.to_bo_field_name(storage_id, column)
    }
}
