//! Benchmarks for DSP primitives and full voice scenarios.
//!
//! Run with: cargo bench
//!
//! These measure the cost of one mixing quantum to ensure the render path
//! stays well within real-time deadlines.
//!
//! Reference timing at 48kHz sample rate:
//!   - 64 samples  = 1.33ms deadline
//!   - 128 samples = 2.67ms deadline
//!   - 256 samples = 5.33ms deadline
//!   - 512 samples = 10.67ms deadline
//!
//! Benchmark groups:
//!   - dsp/*        Low-level primitives (resample, mix, filter, hrtf)
//!   - scenarios/*  Complete voices mixed through the engine path

use criterion::{criterion_group, criterion_main};

mod dsp;
mod scenarios;

/// Common render quantum sizes.
pub const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512];

criterion_group!(
    benches,
    // Low-level DSP primitives
    dsp::bench_resample,
    dsp::bench_mix,
    dsp::bench_filter,
    dsp::bench_hrtf,
    // Full voice scenarios
    scenarios::bench_voices,
);
criterion_main!(benches);
