//! Local slope and clustering benchmarks
//!
//! The local slope estimator is O(n²); these runs show how fast that grows.
//!
//! Run with: cargo bench --bench local_slope_bench -p happiness-atlas

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use happiness_atlas::analysis::{LocalSlopeEstimator, SpatialClusterer};
use happiness_atlas::CountryRecord;

/// Deterministic pseudo-random f64 in [0, 1).
fn pseudo_random(seed: u64, index: usize) -> f64 {
    let h = seed
        .wrapping_mul(index as u64 + 1)
        .wrapping_mul(0x5DEECE66D)
        .wrapping_add(0xB);
    ((h % 10000) as f64) / 10000.0
}

/// Synthetic countries scattered over the globe
fn generate_records(n: usize) -> Vec<CountryRecord> {
    (0..n)
        .map(|i| {
            let internet = pseudo_random(7, i * 4) * 100.0;
            CountryRecord::new(
                format!("C{}", i),
                internet,
                3.0 + internet * 0.04 + pseudo_random(7, i * 4 + 1),
                pseudo_random(7, i * 4 + 2) * 140.0 - 60.0,
                pseudo_random(7, i * 4 + 3) * 360.0 - 180.0,
            )
        })
        .collect()
}

fn bench_local_slopes(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_slopes");
    let estimator = LocalSlopeEstimator::default();

    for n in [50, 150, 500, 1000] {
        let records = generate_records(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &records, |b, records| {
            b.iter(|| estimator.estimate(black_box(records)))
        });
    }

    group.finish();
}

fn bench_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("clustering");
    let clusterer = SpatialClusterer::default();

    for n in [150, 1000] {
        let records = generate_records(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &records, |b, records| {
            b.iter(|| clusterer.cluster(black_box(records)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_local_slopes, bench_clustering);
criterion_main!(benches);
