//! DAO round-trip benchmarks.

use anydal_backends::document::{DocumentDao, DocumentRowMapper};
use anydal_backends::keyvalue::{KeyValueDao, KeyValueRowMapper};
use anydal_backends::sql::{SqlDao, SqlRowMapper};
use anydal_bench::record;
use anydal_bo::GenericBo;
use anydal_core::{FilterNode, GenericDao, PrimaryKeyFilter, SortingSpec};
use anydal_storage::keyvalue::TableSpec;
use anydal_storage::{CallContext, MemoryDocumentStore, MemoryKeyValueStore, SqliteConnection};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tempfile::TempDir;

const WIDTH: usize = 8;

fn schema() -> String {
    let columns: Vec<String> = (0..WIDTH).map(|i| format!("f{i} INTEGER")).collect();
    format!("CREATE TABLE t (id TEXT PRIMARY KEY, {})", columns.join(", "))
}

fn daos(dir: &TempDir) -> Vec<(&'static str, Box<dyn GenericDao>)> {
    let sqlite = SqliteConnection::open(dir.path().join("bench.sqlite")).unwrap();
    sqlite.execute_batch(&schema()).unwrap();
    let kv = MemoryKeyValueStore::new();
    kv.create_table("t", TableSpec::new("id"));

    let key = || PrimaryKeyFilter::new(["id"]);
    let sql: Box<dyn GenericDao> = Box::new(SqlDao::new(Arc::new(sqlite), SqlRowMapper::new(), key()));
    let document: Box<dyn GenericDao> = Box::new(DocumentDao::new(
        Arc::new(MemoryDocumentStore::new()),
        DocumentRowMapper::new(),
        key(),
    ));
    let keyvalue: Box<dyn GenericDao> =
        Box::new(KeyValueDao::new(Arc::new(kv), KeyValueRowMapper::new(), key()));
    vec![("sqlite", sql), ("document", document), ("keyvalue", keyvalue)]
}

/// Benchmark `create` of fresh records.
fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("create");
    group.sample_size(50);
    let dir = TempDir::new().unwrap();
    let ctx = CallContext::background();

    for (name, dao) in daos(&dir) {
        let mut next = 0usize;
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                let bo = GenericBo::from_value(record(next, WIDTH));
                next += 1;
                black_box(dao.create(&ctx, "t", &bo).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark a filtered, sorted page over 1000 records.
fn bench_fetch_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_page");
    let dir = TempDir::new().unwrap();
    let ctx = CallContext::background();
    let filter = FilterNode::And(vec![FilterNode::ge("f0", 100), FilterNode::lt("f0", 900)]);
    let sorting = SortingSpec::new().desc("id");

    for (name, dao) in daos(&dir) {
        for id in 0..1000 {
            dao.create(&ctx, "t", &GenericBo::from_value(record(id, WIDTH))).unwrap();
        }
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                let page = dao
                    .fetch_many(&ctx, "t", Some(black_box(&filter)), &sorting, 10, 20)
                    .unwrap();
                black_box(page);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_create, bench_fetch_page);
criterion_main!(benches);
