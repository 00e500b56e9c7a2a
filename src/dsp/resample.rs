//! Fixed-point phase resampling.
//!
//! The resampler walks a source line at a fixed-point step rate: each output
//! sample adds `increment` to a 16.16 phase accumulator, advances the source
//! position by the integer carry, and keeps the fractional remainder as the
//! sub-sample phase handed to the interpolation kernel. Integer phase
//! accumulation makes the walk deterministic and drift-free regardless of the
//! pitch ratio.
//!
//! Kernels that look behind/ahead of the current position (cubic, bsinc) read
//! into a padding region at the front of the source line. Callers keep that
//! pad filled with the trailing samples of the previous run (zeros at stream
//! start), so a kernel never sees a discontinuity across call boundaries.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::tables::{
    BSincTable, CubicCoefficients, BSINC12, BSINC24, BSINC_PHASE_BITS, BSINC_PHASE_COUNT,
    BSINC_SCALE_COUNT, CUBIC_PHASE_BITS, CUBIC_PHASE_COUNT, CUBIC_SPLINE,
};
use crate::{FRAC_BITS, FRAC_MASK, FRAC_ONE};

/// Look-behind/look-ahead pad kept around the current source position. Sized
/// for the widest bsinc filter.
pub const MAX_RESAMPLER_PADDING: usize = 48;
/// Half the padding: history on one side, look-ahead on the other.
pub const MAX_RESAMPLER_EDGE: usize = MAX_RESAMPLER_PADDING / 2;

const BSINC_PHASE_DIFF_BITS: u32 = FRAC_BITS - BSINC_PHASE_BITS;
const BSINC_PHASE_DIFF_ONE: u32 = 1 << BSINC_PHASE_DIFF_BITS;
const BSINC_PHASE_DIFF_MASK: u32 = BSINC_PHASE_DIFF_ONE - 1;

const CUBIC_PHASE_DIFF_BITS: u32 = FRAC_BITS - CUBIC_PHASE_BITS;
const CUBIC_PHASE_DIFF_ONE: u32 = 1 << CUBIC_PHASE_DIFF_BITS;
const CUBIC_PHASE_DIFF_MASK: u32 = CUBIC_PHASE_DIFF_ONE - 1;

/// Interpolation kernel selection. Fixed for a voice's lifetime unless a new
/// parameter snapshot changes it.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resampler {
    Point,
    Linear,
    #[default]
    Cubic,
    /// 12-point band-limited sinc that skips scale interpolation.
    FastBSinc12,
    /// 12-point band-limited sinc, widening to 24 points when downsampling.
    BSinc12,
    /// 24-point band-limited sinc that skips scale interpolation.
    FastBSinc24,
    /// 24-point band-limited sinc, widening to 48 points when downsampling.
    BSinc24,
}

/// Kernel state for the cubic resampler: a handle to the phase-quantized
/// spline table.
#[derive(Clone, Copy)]
pub struct CubicState {
    filter: &'static [CubicCoefficients; CUBIC_PHASE_COUNT],
}

/// Kernel state for the bsinc resamplers. The kernel itself is stateless;
/// this just keeps it from re-deriving scale-related mappings per sample.
#[derive(Clone, Copy)]
pub struct BsincState {
    /// Scale interpolation factor.
    sf: f32,
    /// Coefficient count.
    m: usize,
    /// Left coefficient offset (look-behind taps).
    l: usize,
    /// Whether to apply the scale delta terms (full-quality variant).
    scale_interp: bool,
    /// Base coefficients followed by phase, scale, and scale-phase deltas,
    /// phase index 0 first.
    filter: &'static [f32],
}

/// Per-voice interpolation state: exactly one kernel's payload is active.
#[derive(Clone, Copy, Default)]
pub enum InterpState {
    #[default]
    Point,
    Linear,
    Cubic(CubicState),
    Bsinc(BsincState),
}

fn bsinc_prepare(increment: u32, table: &'static BSincTable, scale_interp: bool) -> BsincState {
    let mut si = BSINC_SCALE_COUNT - 1;
    let mut sf = 0.0f32;

    if increment > FRAC_ONE {
        sf = FRAC_ONE as f32 / increment as f32;
        sf = ((BSINC_SCALE_COUNT - 1) as f32 * (sf - table.scale_base) * table.scale_range)
            .max(0.0);
        si = sf as usize;
        // The interpolation factor is fit to this diagonally-symmetric curve
        // to reduce the transition ripple caused by interpolating different
        // scales of the sinc function.
        sf = 1.0 - (sf - si as f32).asin().cos();
    }

    let m = table.m[si];
    BsincState {
        sf,
        m,
        l: m / 2 - 1,
        scale_interp,
        filter: &table.tab[table.filter_offset[si]..],
    }
}

impl Resampler {
    /// Builds the interpolation state for this kernel at the given step
    /// increment. The full bsinc variants fall back to the fast path when
    /// not downsampling, where the scale deltas contribute nothing.
    pub fn prepare(self, increment: u32) -> InterpState {
        match self {
            Resampler::Point => InterpState::Point,
            Resampler::Linear => InterpState::Linear,
            Resampler::Cubic => InterpState::Cubic(CubicState { filter: &CUBIC_SPLINE }),
            Resampler::FastBSinc12 => InterpState::Bsinc(bsinc_prepare(increment, &BSINC12, false)),
            Resampler::BSinc12 => {
                InterpState::Bsinc(bsinc_prepare(increment, &BSINC12, increment > FRAC_ONE))
            }
            Resampler::FastBSinc24 => InterpState::Bsinc(bsinc_prepare(increment, &BSINC24, false)),
            Resampler::BSinc24 => {
                InterpState::Bsinc(bsinc_prepare(increment, &BSINC24, increment > FRAC_ONE))
            }
        }
    }
}

#[inline]
fn do_resample<F>(src: &[f32], mut frac: u32, increment: u32, dst: &mut [f32], mut sampler: F)
where
    F: FnMut(&[f32], usize, u32) -> f32,
{
    debug_assert!(frac < FRAC_ONE);
    let mut pos = 0usize;
    for out in dst.iter_mut() {
        *out = sampler(src, pos, frac);
        frac += increment;
        pos += (frac >> FRAC_BITS) as usize;
        frac &= FRAC_MASK;
    }
}

#[inline]
fn do_cubic(state: &CubicState, vals: &[f32], pos: usize, frac: u32) -> f32 {
    // Phase index and the factor between adjacent table entries.
    let pi = (frac >> CUBIC_PHASE_DIFF_BITS) as usize;
    let pf = (frac & CUBIC_PHASE_DIFF_MASK) as f32 * (1.0 / CUBIC_PHASE_DIFF_ONE as f32);

    let fil = &state.filter[pi].coeffs;
    let phd = &state.filter[pi].deltas;

    (fil[0] + pf * phd[0]) * vals[pos]
        + (fil[1] + pf * phd[1]) * vals[pos + 1]
        + (fil[2] + pf * phd[2]) * vals[pos + 2]
        + (fil[3] + pf * phd[3]) * vals[pos + 3]
}

#[inline]
fn do_bsinc(state: &BsincState, vals: &[f32], pos: usize, frac: u32) -> f32 {
    let m = state.m;

    // Phase index and the factor between adjacent table entries.
    let pi = (frac >> BSINC_PHASE_DIFF_BITS) as usize;
    let pf = (frac & BSINC_PHASE_DIFF_MASK) as f32 * (1.0 / BSINC_PHASE_DIFF_ONE as f32);

    let fil = &state.filter[2 * pi * m..];
    let phd = &fil[m..];

    let mut r = 0.0f32;
    if state.scale_interp {
        let scd = &state.filter[(BSINC_PHASE_COUNT * 2 * m + 2 * pi * m)..];
        let spd = &scd[m..];
        let sf = state.sf;
        for j in 0..m {
            r += (fil[j] + sf * scd[j] + pf * (phd[j] + sf * spd[j])) * vals[pos + j];
        }
    } else {
        for j in 0..m {
            r += (fil[j] + pf * phd[j]) * vals[pos + j];
        }
    }
    r
}

impl InterpState {
    /// Resamples `dst.len()` samples out of a padded source line.
    ///
    /// `src` must start `MAX_RESAMPLER_EDGE` samples *before* the nominal
    /// source position, with enough samples after it to satisfy the walk
    /// (`(dst.len()*increment + frac) >> FRAC_BITS` plus the kernel's
    /// look-ahead). `frac` must be below `FRAC_ONE`.
    pub fn run(&self, src: &[f32], frac: u32, increment: u32, dst: &mut [f32]) {
        match self {
            InterpState::Point => {
                do_resample(&src[MAX_RESAMPLER_EDGE..], frac, increment, dst, |v, pos, _| v[pos]);
            }
            InterpState::Linear => {
                do_resample(&src[MAX_RESAMPLER_EDGE..], frac, increment, dst, |v, pos, frac| {
                    let mu = frac as f32 * (1.0 / FRAC_ONE as f32);
                    v[pos] + (v[pos + 1] - v[pos]) * mu
                });
            }
            InterpState::Cubic(state) => {
                do_resample(&src[MAX_RESAMPLER_EDGE - 1..], frac, increment, dst, |v, pos, frac| {
                    do_cubic(state, v, pos, frac)
                });
            }
            InterpState::Bsinc(state) => {
                debug_assert!(state.l <= MAX_RESAMPLER_EDGE);
                do_resample(
                    &src[MAX_RESAMPLER_EDGE - state.l..],
                    frac,
                    increment,
                    dst,
                    |v, pos, frac| do_bsinc(state, v, pos, frac),
                );
            }
        }
    }
}
