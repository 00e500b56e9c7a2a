//! Full-pipeline scenario benchmarks.
//!
//! These drive complete voices through the engine's render path, the way an
//! audio callback would.

mod voices;

pub use voices::bench_voices;
