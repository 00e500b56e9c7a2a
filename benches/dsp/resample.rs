//! Benchmarks for the interpolation kernels.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use spatial_mix::dsp::Resampler;
use spatial_mix::FRAC_ONE;

use crate::BLOCK_SIZES;

pub fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/resample");

    // Downsampling by 1.25 keeps every kernel on its general path.
    let increment = (1.25 * FRAC_ONE as f32) as u32;
    let kernels = [
        ("point", Resampler::Point),
        ("linear", Resampler::Linear),
        ("cubic", Resampler::Cubic),
        ("bsinc12", Resampler::BSinc12),
        ("bsinc24", Resampler::BSinc24),
    ];

    for &size in BLOCK_SIZES {
        // A sine source line with enough padding and look-ahead for the
        // largest kernel at this step.
        let src: Vec<f32> = (0..size * 2 + 64)
            .map(|i| (i as f32 * 0.02).sin())
            .collect();
        let mut dst = vec![0.0f32; size];

        for (name, kernel) in kernels {
            let state = kernel.prepare(increment);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    state.run(black_box(&src), 0, increment, black_box(&mut dst));
                })
            });
        }
    }

    group.finish();
}
