//! The ten-record fixture and stores prepared for it.
//!
//! Records carry ids `"0"` to `"9"`. Record `i` has `rank = i`,
//! `score = 9 - i` and `name = "record-i"`; only even records have a `tag`.

use anydal_bo::GenericBo;
use anydal_core::GenericDao;
use anydal_storage::keyvalue::TableSpec;
use anydal_storage::{CallContext, MemoryDocumentStore, MemoryKeyValueStore, SqliteConnection};
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Storage identifier of the fixture table or collection.
pub const FIXTURE_STORAGE: &str = "records";

/// Key field of fixture records.
pub const FIXTURE_KEY: &str = "id";

/// SQLite schema of the fixture table.
pub const FIXTURE_SQL_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    rank INTEGER,
    score INTEGER,
    name TEXT,
    tag TEXT
)";

/// Returns fixture record `i`.
pub fn fixture_record(i: u8) -> GenericBo {
    let bo = GenericBo::from_value(json!({
        "id": i.to_string(),
        "rank": i,
        "score": 9 - i,
        "name": format!("record-{i}"),
    }));
    if i % 2 == 0 {
        bo.set_attribute("tag", "even").expect("fixture tag");
    }
    bo
}

/// Returns the ten fixture records in id order.
pub fn fixture_records() -> Vec<GenericBo> {
    (0..10).map(fixture_record).collect()
}

/// Creates every fixture record through `dao`.
pub fn seed(dao: &dyn GenericDao, ctx: &CallContext) {
    for record in fixture_records() {
        dao.create(ctx, FIXTURE_STORAGE, &record)
            .expect("Failed to seed fixture record");
    }
}

/// Returns the `id` of each record, in order.
pub fn ids(records: &[GenericBo]) -> Vec<String> {
    records
        .iter()
        .map(|bo| {
            bo.get_as::<String>(FIXTURE_KEY)
                .expect("Failed to read id")
                .unwrap_or_default()
        })
        .collect()
}

/// An in-memory SQLite database holding the empty fixture table.
pub fn sqlite_fixture() -> SqliteConnection {
    let conn = SqliteConnection::open_in_memory().expect("Failed to open SQLite database");
    conn.execute_batch(FIXTURE_SQL_SCHEMA)
        .expect("Failed to create fixture table");
    conn
}

/// An in-memory document store; the fixture collection is created on
/// first insert.
pub fn document_fixture() -> MemoryDocumentStore {
    MemoryDocumentStore::new()
}

/// An in-memory key/value store holding the empty fixture table, keyed by
/// `id`.
pub fn keyvalue_fixture() -> MemoryKeyValueStore {
    let store = MemoryKeyValueStore::new();
    store.create_table(FIXTURE_STORAGE, TableSpec::new(FIXTURE_KEY));
    store
}

/// A file-backed SQLite database with automatic cleanup.
///
/// Every [`TempSqlite::connect`] opens an independent connection to the
/// same file, for tests where connections race each other.
pub struct TempSqlite {
    path: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TempSqlite {
    /// Creates the database file and the fixture table.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("fixture.sqlite");
        let conn = SqliteConnection::open(&path).expect("Failed to create SQLite file");
        conn.execute_batch(FIXTURE_SQL_SCHEMA)
            .expect("Failed to create fixture table");
        Self {
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Opens another connection to the database file.
    pub fn connect(&self) -> SqliteConnection {
        SqliteConnection::open(&self.path).expect("Failed to open SQLite file")
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for TempSqlite {
    fn default() -> Self {
        Self::new()
    }
}
