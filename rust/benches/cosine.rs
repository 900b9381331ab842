use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use simsimd::dispatch::{self, Dtype, Metric};
use simsimd::SpatialSimilarity;


const DIMENSIONS: usize = 1536;

pub fn cosine_benchmark(c: &mut Criterion) {
    let inputs: (Vec<f32>, Vec<f32>) = (
        native::generate_random_vector(DIMENSIONS),
        native::generate_random_vector(DIMENSIONS),
    );

    let mut group = c.benchmark_group("SIMD Cosine");

    for i in 0..=5 {
        group.bench_with_input(BenchmarkId::new("SimSIMD", i), &i, |b, _| {
            b.iter(|| f32::cosine(&inputs.0, &inputs.1))
        });
        group.bench_with_input(BenchmarkId::new("Rust Native", i), &i, |b, _| {
            b.iter(|| native::cos_distance_cpu(&inputs.0, &inputs.1))
        });
    }
    group.finish();

    // Cost of the table lookup alone, once population has happened.
    let _ = dispatch::initialize();
    c.bench_function("Dispatch Lookup", |b| {
        b.iter(|| dispatch::dispatch(Metric::Cosine, Dtype::F32))
    });
}

criterion_group!(benches, cosine_benchmark);
criterion_main!(benches);
