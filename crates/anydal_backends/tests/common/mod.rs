//! DAO constructors over the fixture stores.

#![allow(dead_code)]

use anydal_backends::document::{DocumentDao, DocumentRowMapper};
use anydal_backends::keyvalue::{KeyValueDao, KeyValueRowMapper};
use anydal_backends::sql::{SqlDao, SqlRowMapper};
use anydal_core::PrimaryKeyFilter;
use anydal_storage::SqliteConnection;
use anydal_testkit::{document_fixture, keyvalue_fixture, sqlite_fixture, FIXTURE_KEY};
use std::sync::Arc;

pub fn key_filter() -> PrimaryKeyFilter {
    PrimaryKeyFilter::new([FIXTURE_KEY])
}

/// A key filter on `name`, which no fixture store declares unique.
pub fn name_key_filter() -> PrimaryKeyFilter {
    PrimaryKeyFilter::new(["name"])
}

pub fn sql_dao_on(conn: SqliteConnection) -> SqlDao {
    SqlDao::new(Arc::new(conn), SqlRowMapper::new(), key_filter())
}

pub fn sql_dao() -> SqlDao {
    sql_dao_on(sqlite_fixture())
}

pub fn document_dao() -> DocumentDao {
    DocumentDao::new(Arc::new(document_fixture()), DocumentRowMapper::new(), key_filter())
}

pub fn keyvalue_dao() -> KeyValueDao {
    KeyValueDao::new(Arc::new(keyvalue_fixture()), KeyValueRowMapper::new(), key_filter())
}

pub fn sql_dao_keyed_by_name() -> SqlDao {
    SqlDao::new(Arc::new(sqlite_fixture()), SqlRowMapper::new(), name_key_filter())
}

pub fn document_dao_keyed_by_name() -> DocumentDao {
    DocumentDao::new(Arc::new(document_fixture()), DocumentRowMapper::new(), name_key_filter())
}

pub fn keyvalue_dao_keyed_by_name() -> KeyValueDao {
    KeyValueDao::new(Arc::new(keyvalue_fixture()), KeyValueRowMapper::new(), name_key_filter())
}
