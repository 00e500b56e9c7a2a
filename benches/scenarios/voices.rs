//! Benchmarks for complete voice mixes through the render path.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion};
use spatial_mix::dsp::hrtf::{Hrir, HRIR_LENGTH};
use spatial_mix::dsp::Resampler;
use spatial_mix::engine::{
    engine, BedChannelConfig, BinauralConfig, Controller, EngineConfig, OutputMode, Renderer,
};
use spatial_mix::voice::params::{HrtfTarget, VoiceProps};
use spatial_mix::voice::queue::BufferItem;

use crate::BLOCK_SIZES;

const VOICES: usize = 16;

fn tone() -> Arc<[f32]> {
    (0..4800)
        .map(|i| (i as f32 * 220.0 * std::f32::consts::TAU / 48000.0).sin() * 0.1)
        .collect::<Vec<_>>()
        .into()
}

fn start_voices(controller: &mut Controller, renderer: &mut Renderer, count: usize,
    mut props: impl FnMut(usize) -> VoiceProps)
{
    let tone = tone();
    for i in 0..count {
        controller
            .start(vec![BufferItem::from_f32(Arc::clone(&tone))], true, props(i))
            .ok();
    }
    // Settle the start messages before measuring.
    let mut warmup = vec![0.0f32; 2 * 64];
    renderer.render_quantum(&mut warmup);
}

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voices");

    for &size in BLOCK_SIZES {
        let mut out = vec![0.0f32; size * 2];

        // Sixteen pitched voices into a stereo bed, the common case.
        let (mut controller, mut renderer) = engine(EngineConfig {
            max_voices: VOICES,
            ..EngineConfig::default()
        });
        start_voices(&mut controller, &mut renderer, VOICES, |i| {
            let mut props = VoiceProps::default();
            props.pitch = 1.0 + i as f32 * 0.03;
            props.direct_gains[0] = 0.2;
            props.direct_gains[1] = 0.2;
            props
        });
        group.bench_with_input(BenchmarkId::new("stereo_16", size), &size, |b, _| {
            b.iter(|| {
                renderer.render_quantum(black_box(&mut out));
            })
        });

        // The same mix with the high-quality sinc kernel and a shelving
        // filter on every voice.
        let (mut controller, mut renderer) = engine(EngineConfig {
            max_voices: VOICES,
            ..EngineConfig::default()
        });
        start_voices(&mut controller, &mut renderer, VOICES, |i| {
            let mut props = VoiceProps::default();
            props.pitch = 1.0 + i as f32 * 0.03;
            props.resampler = Resampler::BSinc24;
            props.direct_gains[0] = 0.2;
            props.direct_gains[1] = 0.2;
            props.direct_filter.gain_hf = 0.5;
            props
        });
        group.bench_with_input(BenchmarkId::new("bsinc_filtered_16", size), &size, |b, _| {
            b.iter(|| {
                renderer.render_quantum(black_box(&mut out));
            })
        });

        // Sixteen voices rendered binaurally with per-voice responses.
        let mut hrir: Hrir = [[0.0; 2]; HRIR_LENGTH];
        for (i, tap) in hrir.iter_mut().enumerate() {
            let v = (-(i as f32) * 0.15).exp();
            *tap = [v, v * 0.7];
        }
        let hrir = Arc::new(hrir);
        let (mut controller, mut renderer) = engine(EngineConfig {
            max_voices: VOICES,
            output: OutputMode::Binaural(BinauralConfig {
                channels: vec![
                    BedChannelConfig { coeffs: Arc::clone(&hrir), hf_scale: 1.0 };
                    2
                ],
                ir_size: HRIR_LENGTH,
                crossover_norm: 400.0 / 48000.0,
            }),
            ..EngineConfig::default()
        });
        start_voices(&mut controller, &mut renderer, VOICES, |i| {
            let mut props = VoiceProps::default();
            props.pitch = 1.0 + i as f32 * 0.03;
            props.hrtf = Some(HrtfTarget {
                coeffs: Arc::clone(&hrir),
                delay: [i % 16, (i * 3) % 16],
                gain: 0.2,
            });
            props
        });
        group.bench_with_input(BenchmarkId::new("binaural_16", size), &size, |b, _| {
            b.iter(|| {
                renderer.render_quantum(black_box(&mut out));
            })
        });
    }

    group.finish();
}
