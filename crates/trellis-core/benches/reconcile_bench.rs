//! Benchmarks for the reconciling bulk-set.
//!
//! Run with: cargo bench -p trellis-core --bench reconcile_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use trellis_core::{Attrs, OrderedStore, attrs};

fn make_items(n: usize) -> Vec<Attrs> {
    (0..n)
        .map(|i| attrs! { "id": i, "title": format!("item {i}"), "rank": (i * 7) % 13 })
        .collect()
}

/// Target equal to the current sequence: every slot is an in-place no-op.
fn bench_identical(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/identical");
    for n in [16, 128, 1024] {
        group.throughput(Throughput::Elements(n as u64));
        let items = make_items(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &(), |b, ()| {
            b.iter(|| {
                let store = OrderedStore::from_items(items.clone());
                store.set_items(black_box(items.clone()));
                black_box(store.len())
            });
        });
    }
    group.finish();
}

/// Drop the head, append one at the tail: the typical incremental edit.
fn bench_shift(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/shift");
    for n in [16, 128, 1024] {
        group.throughput(Throughput::Elements(n as u64));
        let items = make_items(n);
        let mut target = items[1..].to_vec();
        target.push(attrs! { "id": n, "title": "fresh", "rank": 0 });
        group.bench_with_input(BenchmarkId::from_parameter(n), &(), |b, ()| {
            b.iter(|| {
                let store = OrderedStore::from_items(items.clone());
                store.set_items(black_box(target.clone()));
                black_box(store.len())
            });
        });
    }
    group.finish();
}

/// Reverse the sequence: worst case, every slot needs a remove+insert.
fn bench_reverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/reverse");
    for n in [16, 128, 1024] {
        group.throughput(Throughput::Elements(n as u64));
        let items = make_items(n);
        let target: Vec<Attrs> = items.iter().rev().cloned().collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &(), |b, ()| {
            b.iter(|| {
                let store = OrderedStore::from_items(items.clone());
                store.set_items(black_box(target.clone()));
                black_box(store.len())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_identical, bench_shift, bench_reverse);
criterion_main!(benches);
