//! Business object benchmarks.

use anydal_bench::{deep_path, nested_document};
use anydal_bo::GenericBo;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Benchmark path reads at increasing depth.
fn bench_get_attribute(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_attribute");

    for depth in [1, 4, 16].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            let bo = GenericBo::from_value(nested_document(depth, 8));
            let path = deep_path(depth);

            b.iter(|| {
                let value = bo.get_attribute(black_box(&path), None).unwrap();
                black_box(value);
            });
        });
    }

    group.finish();
}

/// Benchmark path writes creating intermediate containers.
fn bench_set_attribute(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_attribute");

    for depth in [1, 4, 16].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            let path = format!("{}.items[3]", deep_path(depth));

            b.iter(|| {
                let bo = GenericBo::new();
                bo.set_attribute(black_box(&path), 42).unwrap();
                black_box(bo);
            });
        });
    }

    group.finish();
}

/// Benchmark JSON projection of documents of growing size.
fn bench_to_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("to_json");

    for width in [4, 32, 256].iter() {
        let bo = GenericBo::from_value(nested_document(4, *width));
        let size = bo.to_json().unwrap().len();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &bo, |b, bo| {
            b.iter(|| black_box(bo.to_json().unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_get_attribute, bench_set_attribute, bench_to_json);
criterion_main!(benches);
