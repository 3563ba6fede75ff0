use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use regime_rs::metrics::euclidean::pairwise_distances;
use regime_rs::metrics::validity::ClusterValidity;
use regime_rs::{distinct_labels, estimate_centers, Label, SegmentSmoother};

/// Noisy labels over `k` regimes of roughly 200 samples each, with a one or
/// two sample glitch every 13 samples.
fn synthetic(n: usize, k: usize, dim: usize) -> (Array2<f64>, Vec<Label>) {
    let labels: Vec<Label> = (0..n)
        .map(|i| {
            let regime = (i / 200) % k;
            if i % 13 == 0 || (i % 13 == 1 && i % 2 == 0) {
                ((regime + 1) % k) as Label
            } else {
                regime as Label
            }
        })
        .collect();
    let vectors = Array2::from_shape_fn((n, dim), |(i, j)| {
        labels[i] as f64 * 3.0 + ((i * 31 + j * 17) % 11) as f64 * 0.05
    });
    (vectors, labels)
}

fn bench_pairwise_distances(c: &mut Criterion) {
    let mut group = c.benchmark_group("pairwise_distances");
    for n in [1_000, 10_000, 50_000] {
        let (vectors, labels) = synthetic(n, 6, 8);
        let centroids = estimate_centers(vectors.view(), &labels, &distinct_labels(&labels), None)
            .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| pairwise_distances(black_box(vectors.view()), centroids.centers().view()))
        });
    }
    group.finish();
}

fn bench_smoothing(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_smoothing");
    group.sample_size(10);
    for n in [1_000, 5_000, 20_000] {
        let (vectors, labels) = synthetic(n, 6, 8);
        let centroids = estimate_centers(vectors.view(), &labels, &distinct_labels(&labels), None)
            .unwrap();
        let table = centroids.distance_table(vectors.view()).unwrap();
        for min_length in [3, 10] {
            group.bench_with_input(BenchmarkId::new(format!("min_{min_length}"), n), &n, |b, _| {
                let smoother = SegmentSmoother::new(min_length);
                b.iter(|| smoother.run(black_box(&labels), &table).unwrap())
            });
        }
    }
    group.finish();
}

fn bench_validity(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster_validity");
    group.sample_size(10);
    for n in [500, 2_000] {
        let (vectors, labels) = synthetic(n, 4, 8);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| ClusterValidity::compute(black_box(vectors.view()), &labels).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pairwise_distances, bench_smoothing, bench_validity);
criterion_main!(benches);
