//! Benchmarks for low-level DSP primitives.

mod filter;
mod hrtf;
mod mix;
mod resample;

pub use filter::bench_filter;
pub use hrtf::bench_hrtf;
pub use mix::bench_mix;
pub use resample::bench_resample;
