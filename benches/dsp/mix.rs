//! Benchmarks for the gain-ramped accumulating mixer.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use spatial_mix::dsp::mix::mix_one;

use crate::BLOCK_SIZES;

pub fn bench_mix(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/mix");

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size)
            .map(|i| (i as f32 / size as f32) * 2.0 - 1.0)
            .collect();
        let mut output = vec![0.0f32; size];

        // Steady gain: the ramp is skipped entirely.
        group.bench_with_input(BenchmarkId::new("steady", size), &size, |b, _| {
            b.iter(|| {
                let mut gain = 0.7f32;
                output.fill(0.0);
                mix_one(black_box(&input), black_box(&mut output), &mut gain, 0.7, 0);
            })
        });

        // Ramping: the fade window covers the whole block.
        group.bench_with_input(BenchmarkId::new("ramped", size), &size, |b, _| {
            b.iter(|| {
                let mut gain = 0.0f32;
                output.fill(0.0);
                mix_one(black_box(&input), black_box(&mut output), &mut gain, 1.0, size);
            })
        });
    }

    group.finish();
}
