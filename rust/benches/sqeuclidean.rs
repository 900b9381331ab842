use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use simsimd::SpatialSimilarity;


const DIMENSIONS: usize = 1536;

pub fn sqeuclidean_benchmark(c: &mut Criterion) {
    let inputs: (Vec<f32>, Vec<f32>) = (
        native::generate_random_vector(DIMENSIONS),
        native::generate_random_vector(DIMENSIONS),
    );
    let integers: (Vec<i8>, Vec<i8>) = (
        native::generate_random_i8_vector(DIMENSIONS),
        native::generate_random_i8_vector(DIMENSIONS),
    );

    let mut group = c.benchmark_group("SIMD SqEuclidean");

    for i in 0..=5 {
        group.bench_with_input(BenchmarkId::new("SimSIMD", i), &i, |b, _| {
            b.iter(|| f32::sqeuclidean(&inputs.0, &inputs.1))
        });
        group.bench_with_input(BenchmarkId::new("Rust Native", i), &i, |b, _| {
            b.iter(|| native::squared_euclidean_cpu(&inputs.0, &inputs.1))
        });
        group.bench_with_input(BenchmarkId::new("SimSIMD i8", i), &i, |b, _| {
            b.iter(|| i8::sqeuclidean(&integers.0, &integers.1))
        });
        group.bench_with_input(BenchmarkId::new("Rust Native i8", i), &i, |b, _| {
            b.iter(|| native::squared_euclidean_i8_cpu(&integers.0, &integers.1))
        });
    }
}

criterion_group!(benches, sqeuclidean_benchmark);
criterion_main!(benches);
