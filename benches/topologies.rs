//! One benchmark per topology, keeping the vectorized/scalar dispatch
//! honest under regression (SPEC_FULL.md §4.15).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rbd_engine::orchestrator;

const T: usize = 200_000;

fn reliabilities_for(n: usize, t: usize) -> Vec<f64> {
    (0..n * t)
        .map(|i| 0.5 + 0.49 * ((i % 97) as f64 / 97.0))
        .collect()
}

fn bench_series(c: &mut Criterion) {
    let n = 8;
    let reliabilities = reliabilities_for(n, T);
    let mut output = vec![0.0; T];
    c.bench_with_input(BenchmarkId::new("series", T), &T, |b, _| {
        b.iter(|| orchestrator::series(&reliabilities, &mut output, n, T, false).unwrap())
    });
}

fn bench_parallel(c: &mut Criterion) {
    let n = 8;
    let reliabilities = reliabilities_for(n, T);
    let mut output = vec![0.0; T];
    c.bench_with_input(BenchmarkId::new("parallel", T), &T, |b, _| {
        b.iter(|| orchestrator::parallel(&reliabilities, &mut output, n, T, false).unwrap())
    });
}

fn bench_bridge(c: &mut Criterion) {
    let reliabilities = reliabilities_for(5, T);
    let mut output = vec![0.0; T];
    c.bench_with_input(BenchmarkId::new("bridge", T), &T, |b, _| {
        b.iter(|| orchestrator::bridge(&reliabilities, &mut output, T).unwrap())
    });
}

fn bench_koon_generic(c: &mut Criterion) {
    let n = 6;
    let k = 3;
    let reliabilities = reliabilities_for(n, T);
    let mut output = vec![0.0; T];
    c.bench_with_input(BenchmarkId::new("koon_generic", T), &T, |b, _| {
        b.iter(|| {
            orchestrator::koon(&reliabilities, &mut output, n, k, T, false, false, false, false)
                .unwrap()
        })
    });
}

fn bench_koon_recursive(c: &mut Criterion) {
    let n = 6;
    let k = 3;
    let reliabilities = reliabilities_for(n, T);
    let mut output = vec![0.0; T];
    c.bench_with_input(BenchmarkId::new("koon_recursive", T), &T, |b, _| {
        b.iter(|| {
            orchestrator::koon(&reliabilities, &mut output, n, k, T, false, true, false, false)
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_series,
    bench_parallel,
    bench_bridge,
    bench_koon_generic,
    bench_koon_recursive
);
criterion_main!(benches);
