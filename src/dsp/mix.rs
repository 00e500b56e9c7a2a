//! Gain-ramped accumulating mixers.

/*
Gain Ramping
============

Mixing here means ACCUMULATING a source run into an output line, scaled by a
per-sample gain:

    dst[i] += src[i] * gain(i)

A gain that jumps between two values produces a step in the output waveform,
heard as a click. Every parameter change that reaches the sample domain
(volume, panning, distance attenuation) therefore travels through a linear
ramp instead:

  counter       The number of samples over which a ramp completes. A voice
                picks one fade window per quantum; every path it mixes that
                quantum ramps over the same counter.

  current       The gain actually applied at the start of the run. Owned by
                the mixer: after a call it holds the gain reached, which is
                exactly `target` once the ramp has completed.

  target        The gain requested by the latest parameter snapshot.

    gain
  target ┤           ╭────────────
         │         ╱
         │       ╱
 current ┤ ────╱
         └────┬───────┬──────────→ samples
              0    counter

When the run is shorter than the counter, the ramp is left part-way and
`current` records where it stopped; the next quantum continues from there.

Silence skipping: a target gain at or below the silence threshold lets the
constant tail of the run be skipped entirely, but only AFTER the ramp portion
has been mixed. Skipping the ramp itself would be the very click the ramp
exists to avoid.
*/

use crate::GAIN_SILENCE_THRESHOLD;

/// Accumulate `input` into `output` with a gain ramping from `*current_gain`
/// to `target_gain` over `counter` samples, holding at target afterwards.
///
/// `output` must be at least as long as `input`. After the call,
/// `*current_gain` is the gain actually reached.
pub fn mix_one(
    input: &[f32],
    output: &mut [f32],
    current_gain: &mut f32,
    target_gain: f32,
    counter: usize,
) {
    debug_assert!(output.len() >= input.len());

    let delta = if counter > 0 { 1.0 / counter as f32 } else { 0.0 };
    let fade_len = counter.min(input.len());
    let step = (target_gain - *current_gain) * delta;

    let mut pos = 0;
    if step.abs() > f32::EPSILON {
        let gain = *current_gain;
        let mut step_count = 0.0f32;
        for (&smp, out) in input[..fade_len].iter().zip(output.iter_mut()) {
            *out += smp * (gain + step * step_count);
            step_count += 1.0;
        }
        pos = fade_len;

        if fade_len < counter {
            // Ramp continues into the next run.
            *current_gain = gain + step * step_count;
            return;
        }
    }
    *current_gain = target_gain;

    if target_gain.abs() <= GAIN_SILENCE_THRESHOLD {
        return;
    }
    for (&smp, out) in input[pos..].iter().zip(output[pos..].iter_mut()) {
        *out += smp * target_gain;
    }
}

/// Mix one source line into several output channel lines, each with its own
/// current/target gain pair but a shared ramp counter. `out_pos` offsets the
/// write position into every output line.
pub fn mix_multi(
    input: &[f32],
    outputs: &mut [Vec<f32>],
    current_gains: &mut [f32],
    target_gains: &[f32],
    counter: usize,
    out_pos: usize,
) {
    debug_assert!(current_gains.len() >= outputs.len());
    debug_assert!(target_gains.len() >= outputs.len());

    for (chan, output) in outputs.iter_mut().enumerate() {
        mix_one(
            input,
            &mut output[out_pos..],
            &mut current_gains[chan],
            target_gains[chan],
            counter,
        );
    }
}
