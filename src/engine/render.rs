//! The audio-side half of the engine.
//!
//! [`Renderer::render_quantum`] runs once per backend period: drain control
//! messages, mix the active voices into the beds, run the output stage, and
//! publish positions and retirement events. Nothing on this path allocates,
//! frees, or blocks.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use rtrb::{Consumer, Producer};

use super::message::{ControlMessage, RenderEvent};
use super::{EngineConfig, SharedSlot};
use crate::dsp::filter::BandSplitter;
use crate::dsp::hrtf::{self, Hrir, HrtfChannelState, HRIR_LENGTH, HRTF_HISTORY_LENGTH,
    MIN_IR_LENGTH};
use crate::voice::{MixContext, Voice, VoiceState, RESAMPLE_LINE_LEN};
use crate::{MAX_OUTPUT_CHANNELS, MAX_QUANTUM, MAX_SENDS};

/// One bed channel of a binaural output: its head-related response and the
/// high-frequency scale applied before convolution.
#[derive(Debug, Clone)]
pub struct BedChannelConfig {
    pub coeffs: Arc<Hrir>,
    pub hf_scale: f32,
}

/// Stereo output through a per-channel response bank. Voices carrying their
/// own binaural target skip the bank and convolve directly.
#[derive(Debug, Clone)]
pub struct BinauralConfig {
    pub channels: Vec<BedChannelConfig>,
    /// Response taps to convolve, clamped to `[MIN_IR_LENGTH, HRIR_LENGTH]`.
    pub ir_size: usize,
    /// Band-splitter crossover frequency, normalized to the sample rate.
    pub crossover_norm: f32,
}

#[derive(Debug, Clone)]
pub enum OutputMode {
    /// Plain multichannel: each bed line becomes one output channel.
    Channels(usize),
    Binaural(BinauralConfig),
}

enum OutputStage {
    Channels(usize),
    Binaural { states: Vec<HrtfChannelState>, left: Vec<f32>, right: Vec<f32> },
}

pub struct Renderer {
    voices: Vec<Voice>,
    states: Vec<VoiceState>,
    generations: Vec<u64>,
    slots: Arc<[SharedSlot]>,
    rx: Consumer<ControlMessage>,
    events: Producer<RenderEvent>,

    resample_line: Vec<f32>,
    voice_line: Vec<f32>,
    filter_line: Vec<f32>,
    hrtf_line: Vec<f32>,
    hrtf_accum: Vec<[f32; 2]>,
    temp_line: Vec<f32>,
    direct_bed: Vec<Vec<f32>>,
    send_beds: Vec<Vec<f32>>,

    stage: OutputStage,
    ir_size: usize,
    /// Finished notifications that did not fit the event ring, retried each
    /// quantum so a full ring cannot leak a slot.
    pending_finished: Vec<bool>,
}

impl Renderer {
    pub(super) fn new(
        config: &EngineConfig,
        slots: Arc<[SharedSlot]>,
        rx: Consumer<ControlMessage>,
        events: Producer<RenderEvent>,
    ) -> Self {
        let (stage, bed_channels, ir_size) = match &config.output {
            OutputMode::Channels(n) => {
                let n = (*n).clamp(1, MAX_OUTPUT_CHANNELS);
                (OutputStage::Channels(n), n, HRIR_LENGTH)
            }
            OutputMode::Binaural(binaural) => {
                let ir_size = binaural.ir_size.clamp(MIN_IR_LENGTH, HRIR_LENGTH);
                if ir_size != binaural.ir_size {
                    log::warn!("binaural ir_size {} clamped to {}", binaural.ir_size, ir_size);
                }
                let states: Vec<HrtfChannelState> = binaural
                    .channels
                    .iter()
                    .take(MAX_OUTPUT_CHANNELS)
                    .map(|chan| HrtfChannelState {
                        splitter: BandSplitter::new(binaural.crossover_norm),
                        hf_scale: chan.hf_scale,
                        coeffs: *chan.coeffs,
                    })
                    .collect();
                let bed_channels = states.len();
                (
                    OutputStage::Binaural {
                        states,
                        left: vec![0.0; MAX_QUANTUM],
                        right: vec![0.0; MAX_QUANTUM],
                    },
                    bed_channels,
                    ir_size,
                )
            }
        };

        let sends = config.sends.min(MAX_SENDS);
        Self {
            voices: (0..config.max_voices).map(|_| Voice::new()).collect(),
            states: vec![VoiceState::Stopped; config.max_voices],
            generations: vec![0; config.max_voices],
            slots,
            rx,
            events,
            resample_line: vec![0.0; RESAMPLE_LINE_LEN],
            voice_line: vec![0.0; MAX_QUANTUM],
            filter_line: vec![0.0; MAX_QUANTUM],
            hrtf_line: vec![0.0; HRTF_HISTORY_LENGTH + MAX_QUANTUM],
            hrtf_accum: vec![[0.0; 2]; MAX_QUANTUM + HRIR_LENGTH],
            temp_line: vec![0.0; MAX_QUANTUM],
            direct_bed: vec![vec![0.0; MAX_QUANTUM]; bed_channels],
            send_beds: vec![vec![0.0; MAX_QUANTUM]; sends],
            stage,
            ir_size,
            pending_finished: vec![false; config.max_voices],
        }
    }

    /// Interleaved channels the output expects.
    pub fn output_channels(&self) -> usize {
        match &self.stage {
            OutputStage::Channels(n) => *n,
            OutputStage::Binaural { .. } => 2,
        }
    }

    /// The mono line mixed for an auxiliary send during the last quantum,
    /// for an external effect processor to consume.
    pub fn send_bed(&self, send: usize) -> &[f32] {
        &self.send_beds[send]
    }

    /// Renders interleaved output for one period. `out.len()` must be a
    /// multiple of [`output_channels`](Self::output_channels); periods longer
    /// than `MAX_QUANTUM` frames are processed in quantum-sized chunks.
    pub fn render_quantum(&mut self, out: &mut [f32]) {
        let channels = self.output_channels();
        debug_assert_eq!(out.len() % channels, 0);

        for index in 0..self.pending_finished.len() {
            if self.pending_finished[index] {
                let generation = self.generations[index];
                if self.events.push(RenderEvent::Finished { index, generation }).is_ok() {
                    self.pending_finished[index] = false;
                }
            }
        }
        self.process_messages();

        let total = out.len() / channels;
        let mut done = 0;
        while done < total {
            let todo = (total - done).min(MAX_QUANTUM);
            self.render_chunk(&mut out[done * channels..(done + todo) * channels], todo);
            done += todo;
        }
    }

    fn process_messages(&mut self) {
        while let Ok(msg) = self.rx.pop() {
            match msg {
                ControlMessage::Start { index, generation, queue, looping, props } => {
                    let voice = &mut self.voices[index];
                    voice.adopt_props(&props);
                    let old = voice.start(queue, looping);
                    self.generations[index] = generation;
                    self.states[index] = VoiceState::Playing;
                    self.slots[index]
                        .state
                        .store(VoiceState::Playing as u8, Ordering::Release);
                    self.slots[index].position.store(0, Ordering::Relaxed);
                    self.retire(RenderEvent::RetiredProps(props));
                    self.retire(RenderEvent::RetiredQueue(old));
                }
                ControlMessage::Update { index, generation, props } => {
                    if self.live(index, generation) {
                        self.voices[index].adopt_props(&props);
                    }
                    self.retire(RenderEvent::RetiredProps(props));
                }
                ControlMessage::Enqueue { index, generation, item } => {
                    if self.live(index, generation) {
                        if let Err(item) = self.voices[index].enqueue(item) {
                            self.retire(RenderEvent::RetiredItem(item));
                        }
                    } else {
                        self.retire(RenderEvent::RetiredItem(item));
                    }
                }
                ControlMessage::SetLoop { index, generation, looping } => {
                    if self.live(index, generation) {
                        self.voices[index].set_looping(looping);
                    }
                }
                ControlMessage::Stop { index, generation, hard } => {
                    if self.live(index, generation) {
                        if hard {
                            self.finish_voice(index);
                        } else if self.states[index] == VoiceState::Playing {
                            self.states[index] = VoiceState::Stopping;
                            self.slots[index]
                                .state
                                .store(VoiceState::Stopping as u8, Ordering::Release);
                        }
                    }
                }
            }
        }
    }

    fn render_chunk(&mut self, out: &mut [f32], todo: usize) {
        for line in self.direct_bed.iter_mut().chain(self.send_beds.iter_mut()) {
            line[..todo].fill(0.0);
        }

        for i in 0..self.voices.len() {
            let state = self.states[i];
            if !matches!(state, VoiceState::Playing | VoiceState::Stopping) {
                continue;
            }

            let voice = &mut self.voices[i];
            let mut ctx = MixContext {
                resample_line: &mut self.resample_line,
                voice_line: &mut self.voice_line,
                filter_line: &mut self.filter_line,
                hrtf_line: &mut self.hrtf_line,
                hrtf_accum: &mut self.hrtf_accum,
                direct_bed: &mut self.direct_bed,
                send_beds: &mut self.send_beds,
                ir_size: self.ir_size,
                todo,
            };
            let next = voice.mix(state, &mut ctx);

            if state == VoiceState::Playing {
                self.slots[i].position.store(voice.samples_played(), Ordering::Relaxed);
            }
            if next != state {
                match next {
                    VoiceState::Stopped => self.finish_voice(i),
                    _ => {
                        self.states[i] = next;
                        self.slots[i].state.store(next as u8, Ordering::Release);
                    }
                }
            }
        }

        match &mut self.stage {
            OutputStage::Channels(n) => {
                let n = *n;
                for (frame, frame_out) in out.chunks_exact_mut(n).enumerate() {
                    for (c, sample) in frame_out.iter_mut().enumerate() {
                        *sample = self.direct_bed[c][frame].clamp(-1.0, 1.0);
                    }
                }
            }
            OutputStage::Binaural { states, left, right } => {
                left[..todo].fill(0.0);
                right[..todo].fill(0.0);
                hrtf::mix_direct(
                    &mut left[..todo],
                    &mut right[..todo],
                    &self.direct_bed[..states.len()],
                    &mut self.hrtf_accum,
                    &mut self.temp_line,
                    states,
                    self.ir_size,
                    todo,
                );
                for (frame, frame_out) in out.chunks_exact_mut(2).enumerate() {
                    frame_out[0] = left[frame].clamp(-1.0, 1.0);
                    frame_out[1] = right[frame].clamp(-1.0, 1.0);
                }
            }
        }
    }

    fn live(&self, index: usize, generation: u64) -> bool {
        self.generations[index] == generation
            && matches!(self.states[index], VoiceState::Playing | VoiceState::Stopping)
    }

    fn finish_voice(&mut self, index: usize) {
        self.states[index] = VoiceState::Stopped;
        self.slots[index].state.store(VoiceState::Stopped as u8, Ordering::Release);
        let queue = self.voices[index].take_queue();
        self.retire(RenderEvent::RetiredQueue(queue));
        self.retire(RenderEvent::Finished { index, generation: self.generations[index] });
    }

    /// Hands an allocation back to the control thread. When the event ring
    /// is full, allocations drop here as a last resort; a Finished
    /// notification is kept and retried instead, since losing one would
    /// strand its slot.
    fn retire(&mut self, event: RenderEvent) {
        if let Err(rtrb::PushError::Full(event)) = self.events.push(event) {
            if let RenderEvent::Finished { index, .. } = event {
                self.pending_finished[index] = true;
            }
        }
    }
}
