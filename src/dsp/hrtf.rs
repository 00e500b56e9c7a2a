//! Binaural convolution with head-related impulse responses.
//!
//! An HRIR pair positions a sound by filtering it differently for each ear.
//! The mixers here convolve a mono line with a stereo impulse response into a
//! shared accumulation buffer, with per-ear onset delays taken from a history
//! of past input so a delay never reads before the start of the current run.

/// Samples in a head-related impulse response, per ear.
pub const HRIR_LENGTH: usize = 64;
/// Past input samples kept ahead of each mixing run, bounding the largest
/// representable onset delay.
pub const HRTF_HISTORY_LENGTH: usize = 64;
/// Shortest impulse response length worth convolving.
pub const MIN_IR_LENGTH: usize = 8;

/// A stereo impulse response, `[left, right]` per tap.
pub type Hrir = [[f32; 2]; HRIR_LENGTH];

/// A positioned binaural filter: response, per-ear onset delays in whole
/// samples, and an overall gain.
#[derive(Debug, Clone)]
pub struct HrtfFilter {
    pub coeffs: Hrir,
    pub delay: [usize; 2],
    pub gain: f32,
}

impl Default for HrtfFilter {
    fn default() -> Self {
        Self { coeffs: [[0.0; 2]; HRIR_LENGTH], delay: [0; 2], gain: 0.0 }
    }
}

/// Filter parameters for one ramped mixing run.
pub struct MixHrtfFilter<'a> {
    pub coeffs: &'a Hrir,
    pub delay: [usize; 2],
    /// Gain applied at the first sample of the run.
    pub gain: f32,
    /// Per-sample gain increment over the run.
    pub gain_step: f32,
}

/// Accumulates one input sample, scaled per ear, into the stereo accumulation
/// buffer starting at the sample's own output position.
#[inline]
fn apply_coeffs(accum: &mut [[f32; 2]], ir_size: usize, coeffs: &Hrir, left: f32, right: f32) {
    for (values, c) in accum[..ir_size].iter_mut().zip(coeffs.iter()) {
        values[0] += c[0] * left;
        values[1] += c[1] * right;
    }
}

/// Convolves `input` through `filter` into `accum`, ramping the gain by
/// `gain_step` per sample.
///
/// `input` holds [`HRTF_HISTORY_LENGTH`] past samples followed by the run;
/// `accum` must cover the run plus [`HRIR_LENGTH`] trailing samples. `todo`
/// is the run length.
pub fn mix(
    input: &[f32],
    accum: &mut [[f32; 2]],
    ir_size: usize,
    filter: &MixHrtfFilter,
    todo: usize,
) {
    debug_assert!(todo > 0);
    debug_assert!(ir_size <= HRIR_LENGTH);
    debug_assert!(input.len() >= HRTF_HISTORY_LENGTH + todo);

    let mut ldelay = HRTF_HISTORY_LENGTH - filter.delay[0];
    let mut rdelay = HRTF_HISTORY_LENGTH - filter.delay[1];
    let mut stepcount = 0.0f32;
    for i in 0..todo {
        let g = filter.gain + filter.gain_step * stepcount;
        let left = input[ldelay] * g;
        let right = input[rdelay] * g;
        ldelay += 1;
        rdelay += 1;
        apply_coeffs(&mut accum[i..], ir_size, filter.coeffs, left, right);

        stepcount += 1.0;
    }
}

/// Crossfades between two binaural filters over one run: `old` fades out from
/// its current gain while `new` fades in via its own gain step. Both
/// convolutions accumulate into the same buffer so the transition is a single
/// continuous signal.
pub fn mix_blend(
    input: &[f32],
    accum: &mut [[f32; 2]],
    ir_size: usize,
    old: &HrtfFilter,
    new: &MixHrtfFilter,
    todo: usize,
) {
    debug_assert!(todo > 0);
    debug_assert!(ir_size <= HRIR_LENGTH);
    debug_assert!(input.len() >= HRTF_HISTORY_LENGTH + todo);

    let old_gain_step = old.gain / todo as f32;

    if old.gain > crate::GAIN_SILENCE_THRESHOLD {
        let mut ldelay = HRTF_HISTORY_LENGTH - old.delay[0];
        let mut rdelay = HRTF_HISTORY_LENGTH - old.delay[1];
        let mut stepcount = todo as f32;
        for i in 0..todo {
            let g = old_gain_step * stepcount;
            let left = input[ldelay] * g;
            let right = input[rdelay] * g;
            ldelay += 1;
            rdelay += 1;
            apply_coeffs(&mut accum[i..], ir_size, &old.coeffs, left, right);

            stepcount -= 1.0;
        }
    }

    if new.gain_step * todo as f32 > crate::GAIN_SILENCE_THRESHOLD {
        // The new filter starts one sample in, where the old has begun
        // stepping down.
        let mut ldelay = HRTF_HISTORY_LENGTH + 1 - new.delay[0];
        let mut rdelay = HRTF_HISTORY_LENGTH + 1 - new.delay[1];
        let mut stepcount = 1.0f32;
        for i in 1..todo {
            let g = new.gain_step * stepcount;
            let left = input[ldelay] * g;
            let right = input[rdelay] * g;
            ldelay += 1;
            rdelay += 1;
            apply_coeffs(&mut accum[i..], ir_size, new.coeffs, left, right);

            stepcount += 1.0;
        }
    }
}

/// Per-channel state for mixing a fixed speaker bed through HRTF.
#[derive(Debug, Clone)]
pub struct HrtfChannelState {
    pub splitter: crate::dsp::filter::BandSplitter,
    pub hf_scale: f32,
    pub coeffs: Hrir,
}

impl Default for HrtfChannelState {
    fn default() -> Self {
        Self {
            splitter: crate::dsp::filter::BandSplitter::default(),
            hf_scale: 0.0,
            coeffs: [[0.0; 2]; HRIR_LENGTH],
        }
    }
}

/// Convolves a set of channel lines through their bed responses and adds the
/// result onto the left/right output lines.
///
/// Each channel is band-split first so its high-frequency response can be
/// scaled with a consistent phase shift. After the outputs are written, the
/// in-progress tail of `accum` is rolled to the front for the next quantum.
pub fn mix_direct<L: AsRef<[f32]>>(
    left_out: &mut [f32],
    right_out: &mut [f32],
    inputs: &[L],
    accum: &mut [[f32; 2]],
    temp: &mut [f32],
    channels: &mut [HrtfChannelState],
    ir_size: usize,
    todo: usize,
) {
    debug_assert!(todo > 0);
    debug_assert!(ir_size <= HRIR_LENGTH);
    debug_assert_eq!(inputs.len(), channels.len());
    debug_assert!(accum.len() >= todo + HRIR_LENGTH);

    for (input, chan) in inputs.iter().zip(channels.iter_mut()) {
        let input = input.as_ref();
        chan.splitter.process_hf_scale(&input[..todo], &mut temp[..todo], chan.hf_scale);

        for i in 0..todo {
            let insample = temp[i];
            apply_coeffs(&mut accum[i..], ir_size, &chan.coeffs, insample, insample);
        }
    }

    for (out, values) in left_out[..todo].iter_mut().zip(accum.iter()) {
        *out += values[0];
    }
    for (out, values) in right_out[..todo].iter_mut().zip(accum.iter()) {
        *out += values[1];
    }

    // Roll the in-progress accumulation to the front and clear the samples
    // the next quantum will write.
    accum.copy_within(todo..todo + HRIR_LENGTH, 0);
    accum[HRIR_LENGTH..HRIR_LENGTH + todo].fill([0.0; 2]);
}
