//! Filter compilation benchmarks.

use anydal_backends::document::DocumentFilterCompiler;
use anydal_backends::keyvalue::KeyValueFilterCompiler;
use anydal_backends::sql::SqlFilterCompiler;
use anydal_bench::wide_filter;
use anydal_core::{FilterCompiler, GenericRowMapper};
use anydal_storage::SqlFlavor;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Benchmark each backend compiler on conjunctions of growing width.
fn bench_compile(c: &mut Criterion) {
    let mapper = GenericRowMapper::new();
    let mut group = c.benchmark_group("compile");

    for width in [4, 32, 256].iter() {
        let filter = wide_filter(*width);

        group.bench_with_input(BenchmarkId::new("sql", width), &filter, |b, filter| {
            let compiler = SqlFilterCompiler::new(SqlFlavor::PostgreSql, &mapper);
            b.iter(|| black_box(compiler.compile("t", Some(black_box(filter))).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("document", width), &filter, |b, filter| {
            let compiler = DocumentFilterCompiler::new(&mapper);
            b.iter(|| black_box(compiler.compile("t", Some(black_box(filter))).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("keyvalue", width), &filter, |b, filter| {
            let compiler = KeyValueFilterCompiler::new(&mapper);
            b.iter(|| black_box(compiler.compile("t", Some(black_box(filter))).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
