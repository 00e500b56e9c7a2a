//! Low-level DSP primitives used by the voice mixing pipeline.
//!
//! These components are allocation-free and realtime-safe, making them safe to
//! call from a non-blocking render thread. They intentionally stay focused on
//! the signal-processing math so the voice and engine layers can handle
//! orchestration and parameter handoff.

/// Biquad filters and the band splitter used by the per-path filter stages.
pub mod filter;
/// Head-related transfer function convolution (binaural rendering).
pub mod hrtf;
/// Gain-ramped accumulating mixers.
pub mod mix;
/// Fixed-point phase resampling with selectable interpolation kernels.
pub mod resample;
/// Precomputed cubic-spline and band-limited sinc coefficient tables.
pub mod tables;

pub use resample::{InterpState, Resampler};
