//! Benchmarks for the biquad filter and band splitter.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use spatial_mix::dsp::filter::{rcp_q_from_slope, BandSplitter, BiquadFilter, BiquadType};

use crate::BLOCK_SIZES;

pub fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size)
            .map(|i| (i as f32 / size as f32) * 2.0 - 1.0)
            .collect();
        let mut output = vec![0.0f32; size];

        // High shelf, the direct-path low-pass stage.
        let mut shelf = BiquadFilter::default();
        shelf.set_params(
            BiquadType::HighShelf,
            5000.0 / 48000.0,
            0.5f32.sqrt(),
            rcp_q_from_slope(0.5f32.sqrt(), 1.0),
        );
        group.bench_with_input(BenchmarkId::new("high_shelf", size), &size, |b, _| {
            b.iter(|| {
                shelf.process(black_box(&input), black_box(&mut output));
            })
        });

        // Both shelves in series, the band-pass path.
        let mut lowpass = BiquadFilter::default();
        lowpass.set_params_from_slope(BiquadType::HighShelf, 5000.0 / 48000.0, 0.7, 1.0);
        let mut highpass = BiquadFilter::default();
        highpass.set_params_from_slope(BiquadType::LowShelf, 250.0 / 48000.0, 0.7, 1.0);
        group.bench_with_input(BenchmarkId::new("dual_shelf", size), &size, |b, _| {
            b.iter(|| {
                lowpass.dual_process(&mut highpass, black_box(&input), black_box(&mut output));
            })
        });

        // Band splitter with high-frequency scaling, the binaural bed path.
        let mut splitter = BandSplitter::new(400.0 / 48000.0);
        group.bench_with_input(BenchmarkId::new("band_split", size), &size, |b, _| {
            b.iter(|| {
                splitter.process_hf_scale(black_box(&input), black_box(&mut output), 0.8);
            })
        });
    }

    group.finish();
}
