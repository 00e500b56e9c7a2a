pub mod dsp;
#[cfg(feature = "rtrb")]
pub mod engine; // Cross-thread control plane and the render entry point
pub mod voice; // Playback cursor, buffer queue, per-voice mixing

/// Largest number of output samples produced per render callback.
pub const MAX_QUANTUM: usize = 1024;

/// Number of fractional bits in the fixed-point sub-sample phase.
pub const FRAC_BITS: u32 = 16;
/// One full sample step in fixed-point phase units.
pub const FRAC_ONE: u32 = 1 << FRAC_BITS;
pub const FRAC_MASK: u32 = FRAC_ONE - 1;

/// Most output channels a voice can mix into directly.
pub const MAX_OUTPUT_CHANNELS: usize = 8;
/// Number of auxiliary effect sends per voice.
pub const MAX_SENDS: usize = 4;
/// Highest allowed pitch ratio (source samples per output sample).
pub const MAX_PITCH: u32 = 10;

/// Gains at or below this are treated as silence once a ramp has finished.
/// Roughly -100 dB.
pub(crate) const GAIN_SILENCE_THRESHOLD: f32 = 1.0e-5;
