//! Benchmarks for the binaural convolution mixers.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use spatial_mix::dsp::hrtf::{
    mix, mix_blend, mix_direct, Hrir, HrtfChannelState, HrtfFilter, MixHrtfFilter, HRIR_LENGTH,
    HRTF_HISTORY_LENGTH,
};

use crate::BLOCK_SIZES;

fn dense_hrir() -> Hrir {
    let mut hrir = [[0.0f32; 2]; HRIR_LENGTH];
    for (i, tap) in hrir.iter_mut().enumerate() {
        let v = (-(i as f32) * 0.1).exp();
        *tap = [v, v * 0.8];
    }
    hrir
}

pub fn bench_hrtf(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/hrtf");
    let coeffs = dense_hrir();

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..HRTF_HISTORY_LENGTH + size)
            .map(|i| (i as f32 * 0.05).sin())
            .collect();
        let mut accum = vec![[0.0f32; 2]; size + HRIR_LENGTH];

        // Steady convolution of one voice.
        let filter =
            MixHrtfFilter { coeffs: &coeffs, delay: [3, 9], gain: 1.0, gain_step: 0.0 };
        group.bench_with_input(BenchmarkId::new("steady", size), &size, |b, _| {
            b.iter(|| {
                accum.fill([0.0; 2]);
                mix(black_box(&input), black_box(&mut accum), HRIR_LENGTH, &filter, size);
            })
        });

        // Crossfade between two filters, the worst case per voice.
        let old = HrtfFilter { coeffs, delay: [9, 3], gain: 1.0 };
        group.bench_with_input(BenchmarkId::new("blend", size), &size, |b, _| {
            b.iter(|| {
                accum.fill([0.0; 2]);
                mix_blend(black_box(&input), black_box(&mut accum), HRIR_LENGTH, &old, &filter,
                    size);
            })
        });

        // A stereo bed rendered binaurally.
        let mut channels = vec![
            HrtfChannelState {
                splitter: spatial_mix::dsp::filter::BandSplitter::new(400.0 / 48000.0),
                hf_scale: 0.9,
                coeffs,
            };
            2
        ];
        let beds: Vec<Vec<f32>> = vec![input[..size].to_vec(); 2];
        let mut temp = vec![0.0f32; size];
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];
        group.bench_with_input(BenchmarkId::new("direct_bed", size), &size, |b, _| {
            b.iter(|| {
                left.fill(0.0);
                right.fill(0.0);
                mix_direct(
                    black_box(&mut left),
                    black_box(&mut right),
                    &beds,
                    &mut accum,
                    &mut temp,
                    &mut channels,
                    HRIR_LENGTH,
                    size,
                );
            })
        });
    }

    group.finish();
}
