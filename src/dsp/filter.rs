//! Biquad filters and the low/high band splitter.
//!
//! Coefficients follow the "Cookbook formulae for audio EQ biquad filter
//! coefficients" by Robert Bristow-Johnson. For the shelf types the specified
//! gain applies at the centerpoint of the transition band, so a caller that
//! wants the shelf itself at a given gain should pass its square root.

use std::f32::consts::TAU;

/// Shape of the response produced by [`BiquadFilter::set_params`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiquadType {
    /// Shelving cut above the reference frequency.
    HighShelf,
    /// Shelving cut below the reference frequency.
    LowShelf,
    /// Boost or cut centered on the reference frequency.
    Peaking,
    /// Cut-off above the reference frequency.
    LowPass,
    /// Cut-off below the reference frequency.
    HighPass,
    /// Pass band centered on the reference frequency.
    BandPass,
}

#[derive(Debug, Clone, Copy)]
struct Coefficients {
    // Numerator "b" terms; denominator "a" terms with a0 pre-applied.
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Default for Coefficients {
    fn default() -> Self {
        Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 }
    }
}

/// A single second-order IIR section in transposed direct form II.
#[derive(Debug, Clone, Default)]
pub struct BiquadFilter {
    z1: f32,
    z2: f32,
    coeffs: Coefficients,
}

/// 1/Q for a shelving filter with the given reference gain and slope
/// steepness (0 < slope <= 1).
pub fn rcp_q_from_slope(gain: f32, slope: f32) -> f32 {
    ((gain + 1.0 / gain) * (1.0 / slope - 1.0) + 2.0).sqrt()
}

/// 1/Q for the given normalized reference frequency (0 < f0norm < 0.5) and
/// bandwidth in octaves.
pub fn rcp_q_from_bandwidth(f0norm: f32, bandwidth: f32) -> f32 {
    let w0 = TAU * f0norm;
    2.0 * (std::f32::consts::LN_2 / 2.0 * bandwidth * w0 / w0.sin()).sinh()
}

impl BiquadFilter {
    /// Zeroes the delay history without touching the coefficients.
    pub fn clear(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    /// Computes coefficients for `ty` at the normalized reference frequency
    /// `f0norm` (ref / sample_rate). `gain` only affects the shelf and
    /// peaking types.
    pub fn set_params(&mut self, ty: BiquadType, f0norm: f32, gain: f32, rcp_q: f32) {
        // Keep the gain above -100dB so the shelf math stays finite.
        let gain = gain.max(0.00001);

        let w0 = TAU * f0norm;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / 2.0 * rcp_q;

        let (b, a): ([f32; 3], [f32; 3]) = match ty {
            BiquadType::HighShelf => {
                let sqrtgain_alpha_2 = 2.0 * gain.sqrt() * alpha;
                (
                    [
                        gain * ((gain + 1.0) + (gain - 1.0) * cos_w0 + sqrtgain_alpha_2),
                        -2.0 * gain * ((gain - 1.0) + (gain + 1.0) * cos_w0),
                        gain * ((gain + 1.0) + (gain - 1.0) * cos_w0 - sqrtgain_alpha_2),
                    ],
                    [
                        (gain + 1.0) - (gain - 1.0) * cos_w0 + sqrtgain_alpha_2,
                        2.0 * ((gain - 1.0) - (gain + 1.0) * cos_w0),
                        (gain + 1.0) - (gain - 1.0) * cos_w0 - sqrtgain_alpha_2,
                    ],
                )
            }
            BiquadType::LowShelf => {
                let sqrtgain_alpha_2 = 2.0 * gain.sqrt() * alpha;
                (
                    [
                        gain * ((gain + 1.0) - (gain - 1.0) * cos_w0 + sqrtgain_alpha_2),
                        2.0 * gain * ((gain - 1.0) - (gain + 1.0) * cos_w0),
                        gain * ((gain + 1.0) - (gain - 1.0) * cos_w0 - sqrtgain_alpha_2),
                    ],
                    [
                        (gain + 1.0) + (gain - 1.0) * cos_w0 + sqrtgain_alpha_2,
                        -2.0 * ((gain - 1.0) + (gain + 1.0) * cos_w0),
                        (gain + 1.0) + (gain - 1.0) * cos_w0 - sqrtgain_alpha_2,
                    ],
                )
            }
            BiquadType::Peaking => (
                [1.0 + alpha * gain, -2.0 * cos_w0, 1.0 - alpha * gain],
                [1.0 + alpha / gain, -2.0 * cos_w0, 1.0 - alpha / gain],
            ),
            BiquadType::LowPass => (
                [(1.0 - cos_w0) / 2.0, 1.0 - cos_w0, (1.0 - cos_w0) / 2.0],
                [1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha],
            ),
            BiquadType::HighPass => (
                [(1.0 + cos_w0) / 2.0, -(1.0 + cos_w0), (1.0 + cos_w0) / 2.0],
                [1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha],
            ),
            BiquadType::BandPass => {
                ([alpha, 0.0, -alpha], [1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha])
            }
        };

        self.coeffs = Coefficients {
            b0: b[0] / a[0],
            b1: b[1] / a[0],
            b2: b[2] / a[0],
            a1: a[1] / a[0],
            a2: a[2] / a[0],
        };
    }

    /// Like [`set_params`](Self::set_params) with 1/Q derived from a shelf
    /// slope, clamping the gain to -60dB.
    pub fn set_params_from_slope(&mut self, ty: BiquadType, f0norm: f32, gain: f32, slope: f32) {
        let gain = gain.max(0.001);
        self.set_params(ty, f0norm, gain, rcp_q_from_slope(gain, slope));
    }

    pub fn copy_params_from(&mut self, other: &BiquadFilter) {
        self.coeffs = other.coeffs;
    }

    /// Runs the filter over `src` into `dst`. The transposed direct form II
    /// update keeps only two delay components and sums similarly-sized values,
    /// which behaves well in floating point.
    pub fn process(&mut self, src: &[f32], dst: &mut [f32]) {
        let c = self.coeffs;
        let mut z1 = self.z1;
        let mut z2 = self.z2;

        for (&x, out) in src.iter().zip(dst.iter_mut()) {
            let y = x * c.b0 + z1;
            z1 = x * c.b1 - y * c.a1 + z2;
            z2 = x * c.b2 - y * c.a2;
            *out = y;
        }

        self.z1 = z1;
        self.z2 = z2;
    }

    /// Runs this filter and `other` in series over `src` into `dst`.
    pub fn dual_process(&mut self, other: &mut BiquadFilter, src: &[f32], dst: &mut [f32]) {
        let c0 = self.coeffs;
        let c1 = other.coeffs;
        let mut z01 = self.z1;
        let mut z02 = self.z2;
        let mut z11 = other.z1;
        let mut z12 = other.z2;

        for (&x, out) in src.iter().zip(dst.iter_mut()) {
            let y = x * c0.b0 + z01;
            z01 = x * c0.b1 - y * c0.a1 + z02;
            z02 = x * c0.b2 - y * c0.a2;

            let x = y;
            let y = x * c1.b0 + z11;
            z11 = x * c1.b1 - y * c1.a1 + z12;
            z12 = x * c1.b2 - y * c1.a2;
            *out = y;
        }

        self.z1 = z01;
        self.z2 = z02;
        other.z1 = z11;
        other.z2 = z12;
    }
}

/// Which of a path's filter sections are active this quantum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    None,
    LowPass,
    HighPass,
    BandPass,
}

/// Applies the active filter sections of a path, returning the line the
/// downstream mixer should read. Inactive sections have their history cleared
/// so a later activation starts from silence instead of stale state.
pub fn process_pair<'a>(
    lowpass: &mut BiquadFilter,
    highpass: &mut BiquadFilter,
    scratch: &'a mut [f32],
    src: &'a [f32],
    mode: FilterMode,
) -> &'a [f32] {
    match mode {
        FilterMode::None => {
            lowpass.clear();
            highpass.clear();
            src
        }
        FilterMode::LowPass => {
            highpass.clear();
            lowpass.process(src, scratch);
            &scratch[..src.len()]
        }
        FilterMode::HighPass => {
            lowpass.clear();
            highpass.process(src, scratch);
            &scratch[..src.len()]
        }
        FilterMode::BandPass => {
            lowpass.dual_process(highpass, src, scratch);
            &scratch[..src.len()]
        }
    }
}

/// First-order crossover that splits a signal into low and high bands which
/// sum back to an allpass version of the input. Used to apply a separate
/// high-frequency scale per channel before binaural filtering.
#[derive(Debug, Clone, Default)]
pub struct BandSplitter {
    coeff: f32,
    lp_z1: f32,
    lp_z2: f32,
    ap_z1: f32,
}

impl BandSplitter {
    /// Creates a splitter with its crossover at the normalized frequency
    /// `f0norm` (crossover / sample_rate).
    pub fn new(f0norm: f32) -> Self {
        let w = f0norm * TAU;
        let cw = w.cos();
        let coeff = if cw.abs() > f32::EPSILON { (w.sin() - 1.0) / cw } else { cw * -0.5 };
        Self { coeff, lp_z1: 0.0, lp_z2: 0.0, ap_z1: 0.0 }
    }

    pub fn clear(&mut self) {
        self.lp_z1 = 0.0;
        self.lp_z2 = 0.0;
        self.ap_z1 = 0.0;
    }

    /// Scales the high band of `src` by `hf_scale` and writes the recombined
    /// signal to `dst`, preserving the low band.
    pub fn process_hf_scale(&mut self, src: &[f32], dst: &mut [f32], hf_scale: f32) {
        let ap_coeff = self.coeff;
        let lp_coeff = self.coeff * 0.5 + 0.5;
        let mut lp_z1 = self.lp_z1;
        let mut lp_z2 = self.lp_z2;
        let mut ap_z1 = self.ap_z1;

        for (&x, out) in src.iter().zip(dst.iter_mut()) {
            // Two cascaded one-pole low-pass stages.
            let d = (x - lp_z1) * lp_coeff;
            let lp_y = lp_z1 + d;
            lp_z1 = lp_y + d;
            let d = (lp_y - lp_z2) * lp_coeff;
            let lp_y = lp_z2 + d;
            lp_z2 = lp_y + d;

            // All-pass stage; high band is allpass minus low.
            let ap_y = x * ap_coeff + ap_z1;
            ap_z1 = x - ap_y * ap_coeff;

            *out = (ap_y - lp_y) * hf_scale + lp_y;
        }

        self.lp_z1 = lp_z1;
        self.lp_z2 = lp_z2;
        self.ap_z1 = ap_z1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dc_response(filter: &mut BiquadFilter) -> f32 {
        // Run enough DC through the filter for it to settle.
        let src = [1.0f32; 512];
        let mut dst = [0.0f32; 512];
        filter.process(&src, &mut dst);
        dst[511]
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut filter = BiquadFilter::default();
        filter.set_params(BiquadType::LowPass, 0.1, 1.0, std::f32::consts::SQRT_2);
        assert!((dc_response(&mut filter) - 1.0).abs() < 1.0e-3);
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut filter = BiquadFilter::default();
        filter.set_params(BiquadType::HighPass, 0.25, 1.0, std::f32::consts::SQRT_2);
        assert!(dc_response(&mut filter).abs() < 1.0e-3);
    }

    #[test]
    fn high_shelf_attenuates_nyquist() {
        let mut filter = BiquadFilter::default();
        // -12dB above the shelf; pass sqrt(gain) so the shelf lands at gain.
        let gain: f32 = 0.25;
        filter.set_params_from_slope(BiquadType::HighShelf, 0.125, gain.sqrt(), 1.0);

        let src: Vec<f32> = (0..512).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let mut dst = vec![0.0f32; 512];
        filter.process(&src, &mut dst);

        let tail = &dst[256..];
        let peak = tail.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        assert!((peak - gain).abs() < 0.05, "shelf gain was {peak}");
    }

    #[test]
    fn default_coefficients_are_identity() {
        let mut filter = BiquadFilter::default();
        let src = [0.5f32, -0.25, 0.125, 1.0];
        let mut dst = [0.0f32; 4];
        filter.process(&src, &mut dst);
        assert_eq!(dst, src);
    }

    #[test]
    fn process_pair_none_returns_input() {
        let mut lp = BiquadFilter::default();
        let mut hp = BiquadFilter::default();
        let src = [0.25f32; 8];
        let mut scratch = [0.0f32; 8];
        let out = process_pair(&mut lp, &mut hp, &mut scratch, &src, FilterMode::None);
        assert_eq!(out, &src);
    }

    #[test]
    fn process_pair_bandpass_runs_both_sections() {
        let mut lp = BiquadFilter::default();
        let mut hp = BiquadFilter::default();
        lp.set_params(BiquadType::HighShelf, 0.2, 0.5, 1.0);
        hp.set_params(BiquadType::LowShelf, 0.05, 0.5, 1.0);

        let src = [1.0f32; 64];
        let mut scratch = [0.0f32; 64];
        let out = process_pair(&mut lp, &mut hp, &mut scratch, &src, FilterMode::BandPass);
        assert_eq!(out.len(), src.len());
        // DC through the low shelf settles toward its -6dB-ish gain, so the
        // output cannot still be the unfiltered line.
        assert!((out[63] - 1.0).abs() > 0.05);
    }

    #[test]
    fn splitter_unity_scale_is_allpass_at_dc() {
        let mut splitter = BandSplitter::new(0.02);
        let src = [1.0f32; 256];
        let mut dst = [0.0f32; 256];
        splitter.process_hf_scale(&src, &mut dst, 1.0);
        assert!((dst[255] - 1.0).abs() < 1.0e-3);
    }

    #[test]
    fn splitter_hf_scale_keeps_low_band() {
        // DC sits entirely in the low band, so scaling the high band to zero
        // must leave a settled DC input intact.
        let mut splitter = BandSplitter::new(0.05);
        let src = [1.0f32; 1024];
        let mut dst = [0.0f32; 1024];
        splitter.process_hf_scale(&src, &mut dst, 0.0);
        assert!((dst[1023] - 1.0).abs() < 1.0e-2);

        // A Nyquist-rate alternation is all high band; zero scale removes it.
        splitter.clear();
        let nyq: Vec<f32> = (0..1024).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let mut dst = vec![0.0f32; 1024];
        splitter.process_hf_scale(&nyq, &mut dst, 0.0);
        let peak = dst[512..].iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        assert!(peak < 0.05, "high band leaked through: {peak}");
    }
}
