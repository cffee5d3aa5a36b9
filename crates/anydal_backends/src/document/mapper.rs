//! Row mapping for document collections.

use anydal_bo::GenericBo;
use anydal_core::{Columns, DaoResult, GenericRowMapper, RowMapper, TableMapping};
use anydal_storage::Row;

const ID_FIELD: &str = "_id";

/// Row mapper for document collections.
///
/// Top-level attributes are renamed through the collection's
/// [`TableMapping`]; nested values are stored as they are. The store's
/// `_id` is dropped from decoded objects unless the mapping renames a
/// field to `_id`. Collections are schemaless, so every attribute is
/// fetched.
#[derive(Debug, Clone, Default)]
pub struct DocumentRowMapper {
    inner: GenericRowMapper,
}

impl DocumentRowMapper {
    /// A mapper with identity names.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the mapping of `collection`.
    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>, mapping: TableMapping) -> Self {
        self.inner = self.inner.with_table(collection, mapping);
        self
    }

    fn keeps_id(&self, collection: &str) -> bool {
        self.inner
            .mapping(collection)
            .is_some_and(|m| m.to_field(ID_FIELD) != ID_FIELD)
    }
}

impl From<GenericRowMapper> for DocumentRowMapper {
    fn from(inner: GenericRowMapper) -> Self {
        Self { inner }
    }
}

impl RowMapper for DocumentRowMapper {
    fn to_native_row(&self, storage_id: &str, bo: &GenericBo) -> DaoResult<Row> {
        self.inner.rename_to_columns(storage_id, bo)
    }

    fn to_bo(&self, storage_id: &str, row: Option<Row>) -> DaoResult<Option<GenericBo>> {
        let Some(mut row) = row else {
            return Ok(None);
        };
        if !self.keeps_id(storage_id) {
            row.remove(ID_FIELD);
        }
        Ok(Some(GenericBo::from(self.inner.rename_to_fields(storage_id, row))))
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn nested_values_pass_verbatim() {
        let mapper = DocumentRowMapper::new()
            .with_collection("people", TableMapping::new().rename("name", "full_name"));
        let bo = GenericBo::from_value(json!({"name": "Ada", "address": {"city": "London"}}));
        let row = mapper.to_native_row("people", &bo).unwrap();
        assert_eq!(
            Value::Object(row),
            json!({"full_name": "Ada", "address": {"city": "London"}})
        );
    }

    #[test]
    fn store_id_is_dropped_unless_mapped() {
        let row = json!({"_id": "abc", "name": "Ada"}).as_object().cloned();
        let plain = DocumentRowMapper::new().to_bo("people", row.clone()).unwrap().unwrap();
        assert_eq!(plain.snapshot(), json!({"name": "Ada"}));

        let mapped = DocumentRowMapper::new()
            .with_collection("people", TableMapping::new().rename("id", "_id"))
            .to_bo("people", row)
            .unwrap()
            .unwrap();
        assert_eq!(mapped.snapshot(), json!({"id": "abc", "name": "Ada"}));
    }

    #[test]
    fn absent_row_is_none() {
        assert!(DocumentRowMapper::new().to_bo("people", None).unwrap().is_none());
        assert_eq!(DocumentRowMapper::new().columns_list("people"), Columns::All);
    }
}
