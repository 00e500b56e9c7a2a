//! Per-voice playback: the buffer queue cursor, resampling, filtering, and
//! mixing into the output beds.
//!
//! A voice owns no output buffers and performs no allocation while mixing;
//! everything it writes goes through the scratch lines and beds lent to it in
//! a [`MixContext`]. One call to [`Voice::mix`] produces one quantum.

pub mod params;
pub mod queue;

use crate::dsp::filter::{process_pair, BiquadFilter, BiquadType, FilterMode};
use crate::dsp::hrtf::{self, HrtfFilter, MixHrtfFilter, HRTF_HISTORY_LENGTH};
use crate::dsp::mix;
use crate::dsp::resample::{InterpState, MAX_RESAMPLER_EDGE, MAX_RESAMPLER_PADDING};
use crate::{FRAC_BITS, FRAC_MASK, FRAC_ONE, MAX_OUTPUT_CHANNELS, MAX_PITCH, MAX_QUANTUM,
    MAX_SENDS};

use params::VoiceProps;
use queue::{BufferData, BufferItem, SampleData};

/// Length of the gain fade window when parameters changed mid-playback.
pub const FADE_SAMPLES: usize = 64;
/// Most queue items a voice holds at once.
pub const MAX_QUEUE_ITEMS: usize = 64;
/// Required length of [`MixContext::resample_line`]: the history pad plus the
/// worst-case source read for a full quantum at the highest pitch.
pub const RESAMPLE_LINE_LEN: usize =
    MAX_RESAMPLER_PADDING + MAX_QUANTUM * MAX_PITCH as usize + 1;

/// Voice playback states. Stored in a per-slot atomic so the control thread
/// can observe them without locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VoiceState {
    Stopped = 0,
    Playing = 1,
    /// Mixing one fade-out quantum before going silent.
    Stopping = 2,
    /// Start requested, promoted to Playing at the next quantum boundary.
    Pending = 3,
}

impl VoiceState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => VoiceState::Playing,
            2 => VoiceState::Stopping,
            3 => VoiceState::Pending,
            _ => VoiceState::Stopped,
        }
    }
}

/// Direct-path working state: filter sections and the current/target gain
/// pairs the ramp mixer advances, or the binaural filter pair when the voice
/// renders through HRTF.
#[derive(Debug, Default)]
pub struct DirectParams {
    pub lowpass: BiquadFilter,
    pub highpass: BiquadFilter,
    pub current_gains: [f32; MAX_OUTPUT_CHANNELS],
    pub target_gains: [f32; MAX_OUTPUT_CHANNELS],
    pub hrtf: HrtfState,
}

/// Old and target binaural filters plus the input history their delays read.
#[derive(Debug, Clone)]
pub struct HrtfState {
    pub old: HrtfFilter,
    pub target: HrtfFilter,
    pub history: [f32; HRTF_HISTORY_LENGTH],
}

impl Default for HrtfState {
    fn default() -> Self {
        Self {
            old: HrtfFilter::default(),
            target: HrtfFilter::default(),
            history: [0.0; HRTF_HISTORY_LENGTH],
        }
    }
}

#[derive(Debug, Default)]
pub struct SendParams {
    pub lowpass: BiquadFilter,
    pub highpass: BiquadFilter,
    pub current_gain: f32,
    pub target_gain: f32,
}

/// Scratch lines and output beds a voice mixes through. All owned by the
/// renderer and sized once at engine construction.
pub struct MixContext<'a> {
    /// Padded source line, at least [`RESAMPLE_LINE_LEN`] long.
    pub resample_line: &'a mut [f32],
    /// Resampled mono line for this voice, `MAX_QUANTUM` long.
    pub voice_line: &'a mut [f32],
    /// Filter output line, `MAX_QUANTUM` long.
    pub filter_line: &'a mut [f32],
    /// HRTF input line: history pad plus quantum.
    pub hrtf_line: &'a mut [f32],
    /// Shared stereo HRTF accumulator, `MAX_QUANTUM + HRIR_LENGTH` long.
    pub hrtf_accum: &'a mut [[f32; 2]],
    /// Direct output bed, one line per output channel.
    pub direct_bed: &'a mut [Vec<f32>],
    /// Auxiliary send beds, one mono line per active send.
    pub send_beds: &'a mut [Vec<f32>],
    /// Taps of the binaural responses actually convolved.
    pub ir_size: usize,
    /// Samples to produce this quantum.
    pub todo: usize,
}

/// One voice of the mixing pipeline.
pub struct Voice {
    queue: Vec<BufferItem>,
    /// Index of the item the play cursor is in; `queue.len()` when exhausted.
    current: usize,
    looping: bool,

    pos: usize,
    frac: u32,
    step: u32,
    interp: InterpState,
    prev_samples: [f32; MAX_RESAMPLER_PADDING],

    direct: DirectParams,
    direct_mode: FilterMode,
    sends: [SendParams; MAX_SENDS],
    send_modes: [FilterMode; MAX_SENDS],
    has_hrtf: bool,
    /// Whether gain changes this quantum ramp instead of snapping. Cleared on
    /// start so the first quantum applies its targets directly.
    fading: bool,

    samples_played: u64,
}

impl Default for Voice {
    fn default() -> Self {
        Self::new()
    }
}

impl Voice {
    pub fn new() -> Self {
        Self {
            queue: Vec::with_capacity(MAX_QUEUE_ITEMS),
            current: 0,
            looping: false,
            pos: 0,
            frac: 0,
            step: FRAC_ONE,
            interp: InterpState::default(),
            prev_samples: [0.0; MAX_RESAMPLER_PADDING],
            direct: DirectParams::default(),
            direct_mode: FilterMode::None,
            sends: Default::default(),
            send_modes: [FilterMode::None; MAX_SENDS],
            has_hrtf: false,
            fading: false,
            samples_played: 0,
        }
    }

    /// Folds a published parameter snapshot into the working state. Gains and
    /// filters become ramp targets; pitch and kernel selection apply from the
    /// next quantum.
    pub fn adopt_props(&mut self, props: &VoiceProps) {
        let step = (props.pitch * FRAC_ONE as f32).round() as u32;
        self.step = step.clamp(1, MAX_PITCH << FRAC_BITS);
        self.interp = props.resampler.prepare(self.step);

        self.direct.target_gains = props.direct_gains;
        self.direct_mode = props.direct_filter.mode();
        set_path_filters(&mut self.direct.lowpass, &mut self.direct.highpass,
            &props.direct_filter);

        self.has_hrtf = props.hrtf.is_some();
        if let Some(target) = &props.hrtf {
            self.direct.hrtf.target =
                HrtfFilter { coeffs: *target.coeffs, delay: target.delay, gain: target.gain };
        }

        for (i, send) in props.sends.iter().enumerate() {
            let parms = &mut self.sends[i];
            parms.target_gain = send.gain;
            self.send_modes[i] = send.filter.mode();
            set_path_filters(&mut parms.lowpass, &mut parms.highpass, &send.filter);
        }
    }

    /// Rewinds the voice onto a fresh queue, returning the previous queue for
    /// retirement off the render thread.
    pub fn start(&mut self, queue: Vec<BufferItem>, looping: bool) -> Vec<BufferItem> {
        let old = std::mem::replace(&mut self.queue, queue);
        self.current = 0;
        self.looping = looping;
        self.pos = 0;
        self.frac = 0;
        self.prev_samples = [0.0; MAX_RESAMPLER_PADDING];
        self.direct.lowpass.clear();
        self.direct.highpass.clear();
        self.direct.hrtf.history = [0.0; HRTF_HISTORY_LENGTH];
        self.direct.hrtf.old = self.direct.hrtf.target.clone();
        for send in &mut self.sends {
            send.lowpass.clear();
            send.highpass.clear();
        }
        self.fading = false;
        self.samples_played = 0;
        old
    }

    /// Appends an item without allocating. Hands the item back when the queue
    /// is at capacity so the caller can retire it.
    pub fn enqueue(&mut self, item: BufferItem) -> Result<(), BufferItem> {
        if self.queue.len() == self.queue.capacity() {
            return Err(item);
        }
        self.queue.push(item);
        Ok(())
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Takes the queue for retirement when the voice has stopped. The voice
    /// is left with an empty, capacity-less queue; the next start installs a
    /// controller-built one, so nothing allocates here.
    pub fn take_queue(&mut self) -> Vec<BufferItem> {
        self.current = 0;
        std::mem::take(&mut self.queue)
    }

    pub fn samples_played(&self) -> u64 {
        self.samples_played
    }

    /// Source sample position of the play cursor within the current item.
    pub fn source_position(&self) -> usize {
        self.pos
    }

    /// Mixes one quantum, returning the state the voice is in afterwards.
    ///
    /// `Playing` mixes normally; `Stopping` mixes one quantum toward silent
    /// targets and returns `Stopped` without advancing the play cursor.
    pub fn mix(&mut self, vstate: VoiceState, ctx: &mut MixContext) -> VoiceState {
        let todo = ctx.todo;
        debug_assert!(todo > 0 && todo <= MAX_QUANTUM);
        debug_assert!(ctx.resample_line.len() >= RESAMPLE_LINE_LEN);

        let increment = self.step;
        let is_playing = vstate == VoiceState::Playing;

        // Source samples the resampler walk will read. When not downsampling
        // the last output reads one source sample past the truncated count.
        let ext = u64::from(increment <= FRAC_ONE);
        let src_needed = ((((todo as u64 - ext) * u64::from(increment) + u64::from(self.frac))
            >> FRAC_BITS)
            + ext) as usize
            + MAX_RESAMPLER_EDGE;

        // Whether this quantum loops inside one item's loop region, decided
        // once on the pre-advance cursor so loading and advancing agree.
        let static_looping = self.static_loop_active();

        ctx.resample_line[..MAX_RESAMPLER_PADDING].copy_from_slice(&self.prev_samples);
        self.load_source(ctx.resample_line, src_needed, static_looping);

        if increment == FRAC_ONE && self.frac == 0 {
            ctx.voice_line[..todo].copy_from_slice(
                &ctx.resample_line[MAX_RESAMPLER_EDGE..MAX_RESAMPLER_EDGE + todo]);
        } else {
            self.interp.run(ctx.resample_line, self.frac, increment,
                &mut ctx.voice_line[..todo]);
        }

        if is_playing {
            // Keep the trailing source window for the next quantum's pad.
            let consumed =
                ((todo as u64 * u64::from(increment) + u64::from(self.frac)) >> FRAC_BITS)
                    as usize;
            self.prev_samples
                .copy_from_slice(&ctx.resample_line[consumed..consumed + MAX_RESAMPLER_PADDING]);
        }

        let counter = if self.fading { todo.min(FADE_SAMPLES) } else { 0 };
        if counter == 0 {
            // Not fading: snap to targets instead of ramping.
            if self.has_hrtf {
                self.direct.hrtf.old = self.direct.hrtf.target.clone();
            } else {
                self.direct.current_gains = self.direct.target_gains;
            }
            for send in &mut self.sends[..ctx.send_beds.len()] {
                send.current_gain = send.target_gain;
            }
        }

        // Direct path.
        {
            let samples = process_pair(&mut self.direct.lowpass, &mut self.direct.highpass,
                ctx.filter_line, &ctx.voice_line[..todo], self.direct_mode);

            if self.has_hrtf {
                let target_gain =
                    if is_playing { self.direct.hrtf.target.gain } else { 0.0 };
                do_hrtf_mix(&mut self.direct.hrtf, samples, target_gain, counter, is_playing,
                    ctx.hrtf_line, ctx.hrtf_accum, ctx.ir_size);
            } else {
                let silent = [0.0f32; MAX_OUTPUT_CHANNELS];
                let targets =
                    if is_playing { &self.direct.target_gains } else { &silent };
                mix::mix_multi(samples, ctx.direct_bed, &mut self.direct.current_gains,
                    targets, counter, 0);
            }
        }

        // Auxiliary sends.
        for (i, bed) in ctx.send_beds.iter_mut().enumerate() {
            let parms = &mut self.sends[i];
            let samples = process_pair(&mut parms.lowpass, &mut parms.highpass,
                ctx.filter_line, &ctx.voice_line[..todo], self.send_modes[i]);
            let target = if is_playing { parms.target_gain } else { 0.0 };
            mix::mix_one(samples, bed, &mut parms.current_gain, target, counter);
        }

        self.fading = true;

        if vstate == VoiceState::Stopping {
            return VoiceState::Stopped;
        }

        // Advance the play cursor.
        self.frac += increment * todo as u32;
        self.pos += (self.frac >> FRAC_BITS) as usize;
        self.frac &= FRAC_MASK;
        self.samples_played += todo as u64;
        self.advance_queue(static_looping);

        if self.current >= self.queue.len() {
            // Out of data: one more quantum fades out on the trailing samples.
            VoiceState::Stopping
        } else {
            vstate
        }
    }

    /// Fills `line[MAX_RESAMPLER_EDGE..][..src_needed]` with source samples
    /// starting at the play cursor.
    fn load_source(&mut self, line: &mut [f32], src_needed: usize, static_looping: bool) {
        let dst_full = &mut line[MAX_RESAMPLER_EDGE..];

        if self.current >= self.queue.len() {
            // The queue ended earlier. Extend from whichever look-ahead
            // sample is closest to zero amplitude, which fades residual
            // output toward silence.
            let avail = src_needed.min(MAX_RESAMPLER_EDGE);
            let tofill = src_needed.max(MAX_RESAMPLER_EDGE);
            let buf = &mut dst_full[..tofill];
            let mut quietest = 0usize;
            for (i, smp) in buf[..avail].iter().enumerate() {
                if smp.abs() < buf[quietest].abs() {
                    quietest = i;
                }
            }
            let fill = buf[quietest];
            buf[quietest + 1..].fill(fill);
            return;
        }

        let dst = &mut dst_full[..src_needed];
        let pos = self.pos;

        if static_looping {
            let item = &self.queue[self.current];
            let BufferData::Static(data) = &item.data else { unreachable!() };
            load_static_loop(data, pos, item.loop_start, item.loop_end, dst);
        } else if let BufferData::Callback(source) = &mut self.queue[self.current].data {
            load_callback(source, pos, dst);
        } else {
            load_queue(&self.queue, self.current, pos, self.looping, dst);
        }
    }

    /// Looping within one static item's loop region, rather than wrapping
    /// the queue.
    fn static_loop_active(&self) -> bool {
        self.looping
            && self.queue.len() == 1
            && self.queue[0].sample_len != usize::MAX
            && self.queue[0].loop_end > self.queue[0].loop_start
            && self.pos < self.queue[0].loop_end
    }

    fn advance_queue(&mut self, static_looping: bool) {
        if self.current >= self.queue.len() {
            return;
        }

        if static_looping {
            let loop_start = self.queue[0].loop_start;
            let loop_end = self.queue[0].loop_end;
            if self.pos >= loop_end {
                self.pos = (self.pos - loop_start) % (loop_end - loop_start) + loop_start;
            }
            return;
        }

        if let BufferData::Callback(source) = &mut self.queue[self.current].data {
            if source.stopped() && self.pos >= source.available() {
                self.current = self.queue.len();
            } else {
                source.discard_to(self.pos);
            }
            return;
        }

        let any_playable = self.queue.iter().any(|item| item.sample_len > 0);
        while self.current < self.queue.len()
            && self.pos >= self.queue[self.current].sample_len
        {
            self.pos -= self.queue[self.current].sample_len;
            self.current += 1;
            if self.current >= self.queue.len() && self.looping && any_playable {
                self.current = 0;
            }
        }
    }
}

fn set_path_filters(lowpass: &mut BiquadFilter, highpass: &mut BiquadFilter,
    filter: &params::FilterParams)
{
    // The shelf reference sits at the centerpoint of the transition band, so
    // the shelf itself reaches the requested gain at sqrt.
    lowpass.set_params_from_slope(BiquadType::HighShelf, filter.hf_norm, filter.gain_hf.sqrt(),
        1.0);
    highpass.set_params_from_slope(BiquadType::LowShelf, filter.lf_norm, filter.gain_lf.sqrt(),
        1.0);
}

fn load_static_loop(data: &SampleData, pos: usize, loop_start: usize, loop_end: usize,
    mut dst: &mut [f32])
{
    debug_assert!(loop_end > loop_start);
    debug_assert!(pos < loop_end);

    // Rest of this loop iteration, then whole repeats.
    let remaining = dst.len().min(loop_end - pos);
    let got = data.read(pos, &mut dst[..remaining]);
    debug_assert_eq!(got, remaining);
    dst = &mut dst[remaining..];

    let loop_size = loop_end - loop_start;
    while !dst.is_empty() {
        let tofill = dst.len().min(loop_size);
        data.read(loop_start, &mut dst[..tofill]);
        dst = &mut dst[tofill..];
    }
}

fn load_callback(source: &mut queue::CallbackSource, pos: usize, dst: &mut [f32]) {
    source.produce_to(pos + dst.len());

    let mut last = 0.0f32;
    let mut filled = 0usize;
    if source.available() > pos {
        filled = source.read(pos, dst);
        last = dst[filled - 1];
    }
    dst[filled..].fill(last);
}

fn load_queue(items: &[BufferItem], mut index: usize, mut pos: usize, looping: bool,
    mut dst: &mut [f32])
{
    let any_playable = items.iter().any(|item| item.sample_len > 0);
    let mut last = 0.0f32;
    while index < items.len() && !dst.is_empty() {
        let item = &items[index];
        if pos >= item.sample_len {
            // Skips exhausted and zero-length items alike.
            pos -= item.sample_len;
            index += 1;
            if index >= items.len() && looping && any_playable {
                index = 0;
            }
            continue;
        }

        let BufferData::Static(data) = &item.data else {
            debug_assert!(false, "callback items cannot share a queue");
            break;
        };
        let remaining = dst.len().min(item.sample_len - pos);
        data.read(pos, &mut dst[..remaining]);
        last = dst[remaining - 1];
        dst = &mut dst[remaining..];
        if dst.is_empty() {
            break;
        }

        pos = 0;
        index += 1;
        if index >= items.len() && looping && any_playable {
            index = 0;
        }
    }
    // Ran out of data: hold the last sample so the resampler sees no step.
    if !dst.is_empty() {
        dst.fill(last);
    }
}

fn do_hrtf_mix(state: &mut HrtfState, samples: &[f32], target_gain: f32, counter: usize,
    is_playing: bool, hrtf_line: &mut [f32], accum: &mut [[f32; 2]], ir_size: usize)
{
    let todo = samples.len();

    // History then fresh input, so delayed taps always have data behind them.
    hrtf_line[..HRTF_HISTORY_LENGTH].copy_from_slice(&state.history);
    hrtf_line[HRTF_HISTORY_LENGTH..HRTF_HISTORY_LENGTH + todo].copy_from_slice(samples);
    if is_playing {
        state.history.copy_from_slice(&hrtf_line[todo..todo + HRTF_HISTORY_LENGTH]);
    }

    // If the filter changed, crossfade the old one out over the fade window.
    let mut fademix = 0usize;
    if counter > 0 {
        fademix = todo.min(counter);

        // The new response fades in from zero; when the fade window extends
        // past this quantum, interpolate the gain it should land on so the
        // overall fade stays consistent.
        let mut gain = target_gain;
        if counter > fademix {
            let a = fademix as f32 / counter as f32;
            gain = state.old.gain + (target_gain - state.old.gain) * a;
        }

        let new = MixHrtfFilter {
            coeffs: &state.target.coeffs,
            delay: state.target.delay,
            gain: 0.0,
            gain_step: gain / fademix as f32,
        };
        hrtf::mix_blend(hrtf_line, accum, ir_size, &state.old, &new, fademix);

        state.old = state.target.clone();
        state.old.gain = gain;
    }

    if fademix < todo {
        let remain = todo - fademix;
        let mut gain = target_gain;
        if counter > todo {
            let a = remain as f32 / (counter - fademix) as f32;
            gain = state.old.gain + (target_gain - state.old.gain) * a;
        }

        let filter = MixHrtfFilter {
            coeffs: &state.target.coeffs,
            delay: state.target.delay,
            gain: state.old.gain,
            gain_step: (gain - state.old.gain) / remain as f32,
        };
        hrtf::mix(&hrtf_line[fademix..], &mut accum[fademix..], ir_size, &filter, remain);
        state.old.gain = gain;
    }
}
