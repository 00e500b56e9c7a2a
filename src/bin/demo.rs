//! spatial-demo - plays a looping tone and pans it across the output.
//!
//! Run with: cargo run --bin spatial-demo

use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use spatial_mix::dsp::Resampler;
use spatial_mix::engine::{engine, EngineConfig, OutputMode};
use spatial_mix::voice::params::VoiceProps;
use spatial_mix::voice::queue::BufferItem;

const STREAM_BLOCK: usize = 4096;

fn main() -> EyreResult<()> {
    color_eyre::install()?;

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no default output device available"))?;
    let config = device
        .default_output_config()
        .wrap_err("failed to fetch default output config")?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    if channels < 2 {
        return Err(eyre!("demo needs at least a stereo output"));
    }

    println!("=== spatial-demo ===");
    println!("Sample rate: {sample_rate} Hz");
    println!("Channels: {channels}");
    println!("Playing a panning tone for 10 seconds...");

    let (mut controller, mut renderer) = engine(EngineConfig {
        sample_rate,
        max_voices: 8,
        output: OutputMode::Channels(2),
        ..EngineConfig::default()
    });

    // One second of a 220 Hz tone, looped by the voice.
    let tone: Arc<[f32]> = (0..sample_rate as usize)
        .map(|i| (i as f32 * 220.0 * std::f32::consts::TAU / sample_rate as f32).sin() * 0.25)
        .collect::<Vec<_>>()
        .into();

    let mut props = VoiceProps {
        pitch: 1.0,
        resampler: Resampler::Cubic,
        ..VoiceProps::default()
    };
    props.direct_gains[0] = 0.7;
    props.direct_gains[1] = 0.7;

    let id = controller
        .start(vec![BufferItem::from_f32(tone)], true, props.clone())
        .wrap_err("failed to start voice")?;

    let mut stereo = vec![0.0f32; 2 * STREAM_BLOCK];
    let stream = device
        .build_output_stream(
            &config.into(),
            move |data: &mut [f32], _| {
                // The engine renders stereo; fold it into however many
                // channels the device interleaves.
                for chunk in data.chunks_mut(channels * STREAM_BLOCK) {
                    let frames = chunk.len() / channels;
                    let block = &mut stereo[..frames * 2];
                    renderer.render_quantum(block);
                    for (frame, out) in chunk.chunks_exact_mut(channels).enumerate() {
                        out[0] = block[frame * 2];
                        out[1] = block[frame * 2 + 1];
                        for extra in &mut out[2..] {
                            *extra = 0.0;
                        }
                    }
                }
            },
            |err| eprintln!("stream error: {err}"),
            None,
        )
        .wrap_err("failed to build output stream")?;
    stream.play().wrap_err("failed to start stream")?;

    // Sweep the pan from the control thread; each update ramps in the mixer.
    for step in 0..40 {
        let phase = step as f32 / 40.0 * std::f32::consts::TAU;
        let pan = phase.sin() * 0.5 + 0.5;
        let mut update = props.clone();
        update.direct_gains[0] = 0.7 * (1.0 - pan).sqrt();
        update.direct_gains[1] = 0.7 * pan.sqrt();
        controller.update(id, update)?;
        controller.collect();
        std::thread::sleep(Duration::from_millis(250));
    }

    controller.stop(id, false)?;
    std::thread::sleep(Duration::from_millis(200));
    controller.collect();
    Ok(())
}
