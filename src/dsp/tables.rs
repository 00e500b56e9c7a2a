//! Coefficient tables for the cubic and band-limited sinc kernels.
//!
//! Both kernels interpolate between precomputed table entries rather than
//! deriving coefficients per sample. Each table cell therefore stores the base
//! coefficients plus delta vectors, so the kernel can reconstruct an
//! arbitrary-phase (and, for bsinc, arbitrary-scale) filter with a handful of
//! multiply-adds:
//!
//!   coeff = base + sf * scale_delta + pf * (phase_delta + sf * scale_phase_delta)
//!
//! where `pf` is the fractional phase between adjacent phase entries and `sf`
//! the fractional position between adjacent downsampling scales. The tables
//! are built once, on first use.

use once_cell::sync::Lazy;

/// Number of quantized phase entries in the cubic table.
pub const CUBIC_PHASE_BITS: u32 = 5;
pub const CUBIC_PHASE_COUNT: usize = 1 << CUBIC_PHASE_BITS;

/// Phase and scale quantization of the bsinc tables.
pub const BSINC_PHASE_BITS: u32 = 5;
pub const BSINC_PHASE_COUNT: usize = 1 << BSINC_PHASE_BITS;
pub const BSINC_SCALE_BITS: u32 = 4;
pub const BSINC_SCALE_COUNT: usize = 1 << BSINC_SCALE_BITS;

/// One cubic table entry: a 4-tap filter and its deltas toward the next phase.
#[derive(Clone, Copy, Default)]
pub struct CubicCoefficients {
    pub coeffs: [f32; 4],
    pub deltas: [f32; 4],
}

fn spline_coeffs(mu: f64) -> [f64; 4] {
    let mu2 = mu * mu;
    let mu3 = mu2 * mu;
    [
        -0.5 * mu3 + mu2 - 0.5 * mu,
        1.5 * mu3 - 2.5 * mu2 + 1.0,
        -1.5 * mu3 + 2.0 * mu2 + 0.5 * mu,
        0.5 * mu3 - 0.5 * mu2,
    ]
}

/// Catmull-Rom spline filter at each quantized phase.
pub static CUBIC_SPLINE: Lazy<[CubicCoefficients; CUBIC_PHASE_COUNT]> = Lazy::new(|| {
    let mut raw = [[0.0f64; 4]; CUBIC_PHASE_COUNT];
    for (pi, entry) in raw.iter_mut().enumerate() {
        *entry = spline_coeffs(pi as f64 / CUBIC_PHASE_COUNT as f64);
    }

    let mut table = [CubicCoefficients::default(); CUBIC_PHASE_COUNT];
    for pi in 0..CUBIC_PHASE_COUNT {
        for i in 0..4 {
            table[pi].coeffs[i] = raw[pi][i] as f32;
        }
        if pi < CUBIC_PHASE_COUNT - 1 {
            for i in 0..4 {
                table[pi].deltas[i] = (raw[pi + 1][i] - raw[pi][i]) as f32;
            }
        } else {
            // The delta target for the last phase is the first phase with the
            // coefficients shifted by one sample. The first delta targets 0,
            // as it represents a tap that falls out of the filter.
            table[pi].deltas[0] = (0.0 - raw[pi][0]) as f32;
            for i in 1..4 {
                table[pi].deltas[i] = (raw[0][i - 1] - raw[pi][i]) as f32;
            }
        }
    }
    table
});

/// The zero-order modified Bessel function of the first kind, used for the
/// Kaiser window:
///
///   I_0(x) = sum_{k=0}^inf ((x / 2)^k / k!)^2
fn bessel_i0(x: f64) -> f64 {
    let x2 = x / 2.0;
    let mut term = 1.0f64;
    let mut sum = 1.0f64;
    let mut k = 1;
    loop {
        let y = x2 / f64::from(k);
        k += 1;
        term *= y * y;
        let last_sum = sum;
        sum += term;
        if sum == last_sum {
            return sum;
        }
    }
}

/// Normalized cardinal sine.
fn sinc(x: f64) -> f64 {
    if x.abs() <= f64::EPSILON {
        return 1.0;
    }
    (std::f64::consts::PI * x).sin() / (std::f64::consts::PI * x)
}

/// Kaiser window for beta and a normalized position k in [-1, 1].
fn kaiser(beta: f64, k: f64, bessel_i0_beta: f64) -> f64 {
    if !(-1.0..=1.0).contains(&k) {
        return 0.0;
    }
    bessel_i0(beta * (1.0 - k * k).sqrt()) / bessel_i0_beta
}

/// Normalized transition width of the Kaiser window. Rejection is in dB.
fn kaiser_width(rejection: f64, order: u32) -> f64 {
    if rejection > 21.19 {
        return (rejection - 7.95) / (2.285 * std::f64::consts::TAU * f64::from(order));
    }
    // Enforces a minimum rejection of just above 21.18 dB.
    5.79 / (std::f64::consts::TAU * f64::from(order))
}

/// Beta value of the Kaiser window. Rejection is in dB.
fn kaiser_beta(rejection: f64) -> f64 {
    if rejection > 50.0 {
        return 0.1102 * (rejection - 8.7);
    }
    if rejection >= 21.0 {
        return 0.5842 * (rejection - 21.0).powf(0.4) + 0.07886 * (rejection - 21.0);
    }
    0.0
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

struct BSincHeader {
    beta: f64,
    scale_base: f64,
    scale_limit: f64,
    a: [f64; BSINC_SCALE_COUNT],
    m: [usize; BSINC_SCALE_COUNT],
    total_size: usize,
}

impl BSincHeader {
    fn new(rejection: u32, order: u32, max_scale: u32) -> Self {
        let beta = kaiser_beta(f64::from(rejection));
        let scale_base = kaiser_width(f64::from(rejection), order) / 2.0;
        let scale_limit = 1.0 / f64::from(max_scale);

        let mut a = [0.0; BSINC_SCALE_COUNT];
        let mut m = [0; BSINC_SCALE_COUNT];
        let mut total_size = 0;
        let base_a = f64::from(order + 1) / 2.0;
        for si in 0..BSINC_SCALE_COUNT {
            let scale = lerp(scale_base, 1.0, (si + 1) as f64 / BSINC_SCALE_COUNT as f64);
            a[si] = (base_a / scale).min(base_a * f64::from(max_scale));
            m[si] = a[si].ceil() as usize * 2;
            total_size += 4 * BSINC_PHASE_COUNT * ((m[si] + 3) & !3);
        }
        Self { beta, scale_base, scale_limit, a, m, total_size }
    }
}

/// A flattened bsinc coefficient table plus the per-scale layout needed to
/// index it. `tab` holds, per scale then per phase, the base coefficients
/// followed by the phase deltas, then the scale and scale-phase deltas.
pub struct BSincTable {
    pub scale_base: f32,
    pub scale_range: f32,
    pub m: [usize; BSINC_SCALE_COUNT],
    pub filter_offset: [usize; BSINC_SCALE_COUNT],
    pub tab: Vec<f32>,
}

fn build_bsinc_table(hdr: &BSincHeader) -> BSincTable {
    let points_max = (hdr.m[0] + 3) & !3;
    debug_assert!(points_max <= super::resample::MAX_RESAMPLER_PADDING);

    // Kaiser-windowed sinc coefficients for each scale and phase index, in
    // double precision until the final write-out.
    let mut filter = vec![vec![vec![0.0f64; points_max]; BSINC_PHASE_COUNT]; BSINC_SCALE_COUNT];

    let bessel_i0_beta = bessel_i0(hdr.beta);
    for si in 0..BSINC_SCALE_COUNT {
        let a = hdr.a[si];
        let m = hdr.m[si];
        let l = (m as f64 * 0.5).floor() - 1.0;
        let o = (points_max - m) / 2;
        let scale = lerp(hdr.scale_base, 1.0, (si + 1) as f64 / BSINC_SCALE_COUNT as f64);

        // The cutoff is allowed to keep the transition band wrapped around
        // the nyquist frequency at extreme downsampling scales, trading a
        // little masked aliasing for less attenuation of high frequencies.
        let max_cutoff = (0.5 - hdr.scale_base) * scale;
        let width = hdr.scale_base * hdr.scale_limit.max(scale);
        let cutoff2 = max_cutoff.min((scale - width) * 0.5) * 2.0;

        for pi in 0..BSINC_PHASE_COUNT {
            let phase = l + pi as f64 / BSINC_PHASE_COUNT as f64;
            for i in 0..m {
                let x = i as f64 - phase;
                filter[si][pi][o + i] =
                    kaiser(hdr.beta, x / a, bessel_i0_beta) * cutoff2 * sinc(cutoff2 * x);
            }
        }
    }

    let mut tab = vec![0.0f32; hdr.total_size];
    let mut idx = 0;
    for si in 0..BSINC_SCALE_COUNT {
        let m = (hdr.m[si] + 3) & !3;
        let o = (points_max - m) / 2;

        // Each phase index's filter and phase delta for this quality scale.
        for pi in 0..BSINC_PHASE_COUNT {
            for i in 0..m {
                tab[idx] = filter[si][pi][o + i] as f32;
                idx += 1;
            }

            // Linear interpolation between phases is simplified by storing
            // the delta (b - a) in: x = a + f (b - a).
            if pi < BSINC_PHASE_COUNT - 1 {
                for i in 0..m {
                    tab[idx] = (filter[si][pi + 1][o + i] - filter[si][pi][o + i]) as f32;
                    idx += 1;
                }
            } else {
                // The delta target for the last phase index is the first
                // phase index with the coefficients offset by one. The first
                // delta targets 0, as it represents a coefficient for a
                // sample that won't be part of the filter.
                tab[idx] = (0.0 - filter[si][pi][o]) as f32;
                idx += 1;
                for i in 1..m {
                    tab[idx] = (filter[si][0][o + i - 1] - filter[si][pi][o + i]) as f32;
                    idx += 1;
                }
            }
        }

        // Each phase index's scale and scale-phase deltas, completing the
        // bilinear equation for the combination of phase and scale.
        if si < BSINC_SCALE_COUNT - 1 {
            for pi in 0..BSINC_PHASE_COUNT {
                for i in 0..m {
                    tab[idx] = (filter[si + 1][pi][o + i] - filter[si][pi][o + i]) as f32;
                    idx += 1;
                }

                if pi < BSINC_PHASE_COUNT - 1 {
                    for i in 0..m {
                        let sp_delta = (filter[si + 1][pi + 1][o + i] - filter[si + 1][pi][o + i])
                            - (filter[si][pi + 1][o + i] - filter[si][pi][o + i]);
                        tab[idx] = sp_delta as f32;
                        idx += 1;
                    }
                } else {
                    tab[idx] =
                        ((0.0 - filter[si + 1][pi][o]) - (0.0 - filter[si][pi][o])) as f32;
                    idx += 1;
                    for i in 1..m {
                        let sp_delta = (filter[si + 1][0][o + i - 1] - filter[si + 1][pi][o + i])
                            - (filter[si][0][o + i - 1] - filter[si][pi][o + i]);
                        tab[idx] = sp_delta as f32;
                        idx += 1;
                    }
                }
            }
        } else {
            // The last scale index doesn't have scale-related deltas.
            idx += BSINC_PHASE_COUNT * m * 2;
        }
    }
    debug_assert_eq!(idx, hdr.total_size);

    let mut table = BSincTable {
        scale_base: hdr.scale_base as f32,
        scale_range: (1.0 / (1.0 - hdr.scale_base)) as f32,
        m: [0; BSINC_SCALE_COUNT],
        filter_offset: [0; BSINC_SCALE_COUNT],
        tab,
    };
    for si in 0..BSINC_SCALE_COUNT {
        table.m[si] = (hdr.m[si] + 3) & !3;
    }
    for si in 1..BSINC_SCALE_COUNT {
        table.filter_offset[si] =
            table.filter_offset[si - 1] + table.m[si - 1] * 4 * BSINC_PHASE_COUNT;
    }
    table
}

/// 11th order (12-point) filter with a 60 dB drop at nyquist, scaling up to
/// 24 points when downsampling.
pub static BSINC12: Lazy<BSincTable> = Lazy::new(|| build_bsinc_table(&BSincHeader::new(60, 11, 2)));
/// 23rd order (24-point) filter with a 60 dB drop at nyquist, scaling up to
/// 48 points when downsampling.
pub static BSINC24: Lazy<BSincTable> = Lazy::new(|| build_bsinc_table(&BSincHeader::new(60, 23, 2)));
