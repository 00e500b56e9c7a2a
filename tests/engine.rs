#![cfg(feature = "rtrb")]

use std::sync::Arc;
use std::time::Duration;

use spatial_mix::engine::{
    engine, BedChannelConfig, BinauralConfig, EngineConfig, EngineError, OutputMode,
};
use spatial_mix::voice::params::{HrtfTarget, VoiceProps};
use spatial_mix::voice::queue::BufferItem;
use spatial_mix::voice::{VoiceState, RESAMPLE_LINE_LEN};

const QUANTUM: usize = 128;

fn stereo_config() -> EngineConfig {
    EngineConfig {
        sample_rate: 48000,
        max_voices: 4,
        output: OutputMode::Channels(2),
        ..EngineConfig::default()
    }
}

fn left_props(gain: f32) -> VoiceProps {
    let mut props = VoiceProps::default();
    props.direct_gains[0] = gain;
    props
}

fn constant_buffer(value: f32, len: usize) -> BufferItem {
    BufferItem::from_f32(vec![value; len].into())
}

#[test]
fn renders_silence_with_no_voices() {
    let (_controller, mut renderer) = engine(stereo_config());
    assert_eq!(renderer.output_channels(), 2);

    let mut out = vec![1.0f32; QUANTUM * 2];
    renderer.render_quantum(&mut out);
    assert!(out.iter().all(|&s| s == 0.0));
}

#[test]
fn voice_plays_through_the_engine() {
    let (mut controller, mut renderer) = engine(stereo_config());

    let id = controller
        .start(vec![constant_buffer(0.5, 100)], false, left_props(1.0))
        .unwrap();
    assert_eq!(controller.active_voices(), 1);

    let mut out = vec![0.0f32; QUANTUM * 2];
    renderer.render_quantum(&mut out);
    // Source data on the left, nothing on the right.
    assert_eq!(out[0], 0.5);
    assert_eq!(out[1], 0.0);
    assert_eq!(out[2 * 99], 0.5);

    // The queue ran out inside the first quantum, so the second one fades
    // out and finishes the voice.
    assert_eq!(controller.state(id).unwrap(), VoiceState::Stopping);
    renderer.render_quantum(&mut out);
    assert_eq!(controller.state(id).unwrap(), VoiceState::Stopped);

    controller.collect();
    assert_eq!(controller.active_voices(), 0);
    assert!(matches!(controller.state(id), Err(EngineError::StaleVoice)));
}

#[test]
fn voice_pool_exhausts_and_recycles() {
    let mut config = stereo_config();
    config.max_voices = 2;
    let (mut controller, mut renderer) = engine(config);

    let a = controller
        .start(vec![constant_buffer(0.1, 48000)], true, left_props(1.0))
        .unwrap();
    let _b = controller
        .start(vec![constant_buffer(0.1, 48000)], true, left_props(1.0))
        .unwrap();
    assert!(matches!(
        controller.start(vec![constant_buffer(0.1, 48000)], true, left_props(1.0)),
        Err(EngineError::NoFreeVoice)
    ));

    // A hard stop frees its slot once the renderer has acknowledged it.
    controller.stop(a, true).unwrap();
    let mut out = vec![0.0f32; QUANTUM * 2];
    renderer.render_quantum(&mut out);
    controller.collect();

    assert_eq!(controller.active_voices(), 1);
    controller
        .start(vec![constant_buffer(0.1, 48000)], true, left_props(1.0))
        .unwrap();
}

#[test]
fn updates_ramp_over_the_fade_window() {
    let (mut controller, mut renderer) = engine(stereo_config());
    let id = controller
        .start(vec![constant_buffer(1.0, 48000)], true, left_props(1.0))
        .unwrap();

    let mut out = vec![0.0f32; QUANTUM * 2];
    renderer.render_quantum(&mut out);
    assert_eq!(out[0], 1.0);

    controller.update(id, left_props(0.25)).unwrap();
    renderer.render_quantum(&mut out);

    // Old gain at the start, new gain past the fade window, monotone between.
    assert!((out[0] - 1.0).abs() < 0.02);
    assert!((out[2 * 100] - 0.25).abs() < 1.0e-6);
    for frame in 1..64 {
        assert!(out[2 * frame] <= out[2 * (frame - 1)] + 1.0e-6, "frame {frame}");
    }
}

#[test]
fn stale_handles_are_rejected() {
    let (mut controller, mut renderer) = engine(stereo_config());
    let id = controller
        .start(vec![constant_buffer(0.5, 48000)], true, left_props(1.0))
        .unwrap();

    controller.stop(id, true).unwrap();
    let mut out = vec![0.0f32; QUANTUM * 2];
    renderer.render_quantum(&mut out);
    controller.collect();

    assert!(matches!(controller.update(id, left_props(0.5)), Err(EngineError::StaleVoice)));
    assert!(matches!(controller.set_looping(id, false), Err(EngineError::StaleVoice)));
    assert!(matches!(controller.stop(id, false), Err(EngineError::StaleVoice)));
}

#[test]
fn playback_position_reports_progress_and_latency() {
    let mut config = stereo_config();
    config.output_latency = 128;
    let (mut controller, mut renderer) = engine(config);

    let id = controller
        .start(vec![constant_buffer(0.5, 48000)], true, left_props(1.0))
        .unwrap();

    let mut out = vec![0.0f32; QUANTUM * 2];
    renderer.render_quantum(&mut out);
    renderer.render_quantum(&mut out);

    let pos = controller.playback_position(id).unwrap();
    assert_eq!(pos.samples, 2 * QUANTUM as u64);
    assert_eq!(pos.latency, Duration::from_secs_f64(128.0 / 48000.0));
}

#[test]
fn enqueued_items_play_back_to_back() {
    let (mut controller, mut renderer) = engine(stereo_config());
    let id = controller
        .start(vec![constant_buffer(0.25, 100)], false, left_props(1.0))
        .unwrap();
    controller.enqueue(id, constant_buffer(0.5, 100)).unwrap();

    let mut out = vec![0.0f32; QUANTUM * 2];
    renderer.render_quantum(&mut out);
    assert_eq!(out[2 * 50], 0.25);
    assert_eq!(out[2 * 110], 0.5);
}

#[test]
fn recycled_slot_plays_enqueued_items() {
    let mut config = stereo_config();
    config.max_voices = 1;
    let (mut controller, mut renderer) = engine(config);

    // Run a voice to completion so its slot goes through retirement.
    let first = controller
        .start(vec![constant_buffer(0.1, 50)], false, left_props(1.0))
        .unwrap();
    let mut out = vec![0.0f32; QUANTUM * 2];
    renderer.render_quantum(&mut out);
    renderer.render_quantum(&mut out);
    controller.collect();
    assert!(matches!(controller.state(first), Err(EngineError::StaleVoice)));

    // The recycled slot must accept appended items just like a fresh one.
    let id = controller
        .start(vec![constant_buffer(0.25, 100)], false, left_props(1.0))
        .unwrap();
    controller.enqueue(id, constant_buffer(0.5, 100)).unwrap();
    renderer.render_quantum(&mut out);
    assert_eq!(out[2 * 50], 0.25);
    assert_eq!(out[2 * 110], 0.5);
}

#[test]
fn full_control_ring_rejects_start_and_recovers() {
    let mut config = stereo_config();
    config.queue_len = 1;
    let (mut controller, mut renderer) = engine(config);

    let a = controller
        .start(vec![constant_buffer(0.5, 48000)], true, left_props(1.0))
        .unwrap();
    assert!(matches!(
        controller.start(vec![constant_buffer(0.5, 48000)], true, left_props(1.0)),
        Err(EngineError::ControlQueueFull)
    ));
    assert_eq!(controller.active_voices(), 1);

    // Draining the ring makes room; the first voice is untouched.
    let mut out = vec![0.0f32; QUANTUM * 2];
    renderer.render_quantum(&mut out);
    assert_eq!(controller.state(a).unwrap(), VoiceState::Playing);
    controller
        .start(vec![constant_buffer(0.5, 48000)], true, left_props(1.0))
        .unwrap();
    assert_eq!(controller.active_voices(), 2);
}

#[test]
fn send_bed_carries_the_send_mix() {
    let mut config = stereo_config();
    config.sends = 1;
    let (mut controller, mut renderer) = engine(config);

    let mut props = left_props(1.0);
    props.sends[0].gain = 0.5;
    controller
        .start(vec![constant_buffer(1.0, 48000)], true, props)
        .unwrap();

    let mut out = vec![0.0f32; QUANTUM * 2];
    renderer.render_quantum(&mut out);
    assert_eq!(out[0], 1.0);
    assert_eq!(renderer.send_bed(0)[10], 0.5);
}

#[test]
fn binaural_output_renders_both_ears() {
    let mut coeffs = [[0.0f32; 2]; 64];
    coeffs[0] = [1.0, 1.0];
    let config = EngineConfig {
        output: OutputMode::Binaural(BinauralConfig {
            channels: vec![BedChannelConfig { coeffs: Arc::new(coeffs), hf_scale: 1.0 }],
            ir_size: 8,
            crossover_norm: 400.0 / 48000.0,
        }),
        ..stereo_config()
    };
    let (mut controller, mut renderer) = engine(config);
    assert_eq!(renderer.output_channels(), 2);

    controller
        .start(vec![constant_buffer(0.5, 48000)], true, left_props(1.0))
        .unwrap();

    let mut out = vec![0.0f32; QUANTUM * 2];
    renderer.render_quantum(&mut out);
    assert!(out.iter().any(|&s| s.abs() > 0.01));
    assert!(out.iter().all(|&s| s.abs() <= 1.0));
}

#[test]
fn direct_hrtf_target_pans_a_voice() {
    let mut bed = [[0.0f32; 2]; 64];
    bed[0] = [1.0, 1.0];
    let config = EngineConfig {
        output: OutputMode::Binaural(BinauralConfig {
            channels: vec![BedChannelConfig { coeffs: Arc::new(bed), hf_scale: 1.0 }],
            ir_size: 32,
            crossover_norm: 400.0 / 48000.0,
        }),
        ..stereo_config()
    };
    let (mut controller, mut renderer) = engine(config);

    // A response that only reaches the left ear.
    let mut hrir = [[0.0f32; 2]; 64];
    hrir[0] = [1.0, 0.0];
    let mut props = VoiceProps::default();
    props.hrtf = Some(HrtfTarget { coeffs: Arc::new(hrir), delay: [0, 0], gain: 1.0 });

    controller
        .start(vec![constant_buffer(0.5, 48000)], true, props)
        .unwrap();

    let mut out = vec![0.0f32; QUANTUM * 2];
    renderer.render_quantum(&mut out);

    let left: f32 = out.iter().step_by(2).map(|s| s.abs()).sum();
    let right: f32 = out.iter().skip(1).step_by(2).map(|s| s.abs()).sum();
    assert!(left > 1.0, "left ear is silent: {left}");
    assert_eq!(right, 0.0);
}

#[test]
fn invalid_requests_are_rejected_up_front() {
    let (mut controller, _renderer) = engine(stereo_config());

    let mut bad_pitch = left_props(1.0);
    bad_pitch.pitch = 0.0;
    assert!(matches!(
        controller.start(vec![constant_buffer(0.5, 100)], false, bad_pitch),
        Err(EngineError::BadPitch)
    ));

    let bad_loop = constant_buffer(0.5, 100).with_loop(60, 40);
    assert!(matches!(
        controller.start(vec![bad_loop], true, left_props(1.0)),
        Err(EngineError::BadLoopPoints)
    ));

    let tiny = BufferItem::from_callback(Box::new(|_dst| 0), 64);
    assert!(matches!(
        controller.start(vec![tiny], false, left_props(1.0)),
        Err(EngineError::StagingTooSmall)
    ));

    let stream = BufferItem::from_callback(Box::new(|_dst| 0), RESAMPLE_LINE_LEN);
    assert!(matches!(
        controller.start(
            vec![stream, constant_buffer(0.5, 100)],
            false,
            left_props(1.0)
        ),
        Err(EngineError::MixedCallbackQueue)
    ));

    let id = controller
        .start(vec![constant_buffer(0.5, 48000)], true, left_props(1.0))
        .unwrap();
    let stream = BufferItem::from_callback(Box::new(|_dst| 0), RESAMPLE_LINE_LEN);
    assert!(matches!(
        controller.enqueue(id, stream),
        Err(EngineError::MixedCallbackQueue)
    ));
}
