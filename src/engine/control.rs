//! The application-side half of the engine.
//!
//! All validation happens here, before anything is sent to the render thread.
//! The renderer trusts what it receives, so a message that would make it
//! allocate, block, or index out of range must never be sent.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rtrb::{Consumer, Producer};

use super::message::{ControlMessage, RenderEvent};
use super::{EngineConfig, OutputMode, SharedSlot};
use crate::voice::params::VoiceProps;
use crate::voice::queue::{BufferData, BufferItem};
use crate::voice::{VoiceState, MAX_QUEUE_ITEMS, RESAMPLE_LINE_LEN};
use crate::MAX_PITCH;

/// Handle to a started voice. Slot index plus a generation counter, so a
/// handle kept after its voice stopped and the slot was reused is detected
/// rather than controlling the wrong voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId {
    index: usize,
    generation: u64,
}

impl VoiceId {
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no free voice slot")]
    NoFreeVoice,
    #[error("voice handle does not refer to a live voice")]
    StaleVoice,
    #[error("control queue is full")]
    ControlQueueFull,
    #[error("voice buffer queue is full")]
    BufferQueueFull,
    #[error("loop points are reversed or out of range")]
    BadLoopPoints,
    #[error("pitch ratio must be positive and at most {}", MAX_PITCH)]
    BadPitch,
    #[error("a callback item must be the only item in a queue")]
    MixedCallbackQueue,
    #[error("callback staging is smaller than one quantum can consume")]
    StagingTooSmall,
}

/// Playback progress of a voice, plus the configured backend latency between
/// the mixer writing a sample and it becoming audible.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackPosition {
    /// Output samples the voice has mixed.
    pub samples: u64,
    pub latency: Duration,
}

pub struct Controller {
    tx: Producer<ControlMessage>,
    events: Consumer<RenderEvent>,
    slots: Arc<[SharedSlot]>,
    generations: Vec<u64>,
    /// Allocated from the controller's point of view: set on start, cleared
    /// when the renderer reports the voice finished.
    busy: Vec<bool>,
    queue_lens: Vec<usize>,
    sample_rate: u32,
    output_latency: u32,
    binaural: bool,
}

impl Controller {
    pub(super) fn new(
        config: &EngineConfig,
        slots: Arc<[SharedSlot]>,
        tx: Producer<ControlMessage>,
        events: Consumer<RenderEvent>,
    ) -> Self {
        let max_voices = config.max_voices;
        Self {
            tx,
            events,
            slots,
            generations: vec![0; max_voices],
            busy: vec![false; max_voices],
            queue_lens: vec![0; max_voices],
            sample_rate: config.sample_rate,
            output_latency: config.output_latency,
            binaural: matches!(config.output, OutputMode::Binaural(_)),
        }
    }

    /// Starts a voice on a free slot with the given queue and parameters.
    pub fn start(
        &mut self,
        mut queue: Vec<BufferItem>,
        looping: bool,
        mut props: VoiceProps,
    ) -> Result<VoiceId, EngineError> {
        self.collect();
        self.validate_props(&mut props)?;

        if queue.len() > MAX_QUEUE_ITEMS {
            return Err(EngineError::BufferQueueFull);
        }
        let callbacks =
            queue.iter().filter(|i| matches!(i.data, BufferData::Callback(_))).count();
        if callbacks > 0 && queue.len() > 1 {
            return Err(EngineError::MixedCallbackQueue);
        }
        for item in &queue {
            validate_item(item)?;
        }
        // The renderer appends in place and never allocates, so the queue
        // must arrive with room for every item it may ever hold.
        queue.reserve(MAX_QUEUE_ITEMS.saturating_sub(queue.len()));

        let index = match self.busy.iter().position(|&b| !b) {
            Some(index) => index,
            None => {
                log::warn!("voice pool exhausted ({} slots)", self.busy.len());
                return Err(EngineError::NoFreeVoice);
            }
        };

        self.generations[index] += 1;
        let generation = self.generations[index];
        let queue_len = queue.len();

        // Publish the slot state before the message: once the renderer picks
        // the start up it owns the atomics, and a store from this side must
        // not race its Playing transition.
        self.slots[index].state.store(VoiceState::Pending as u8, Ordering::Release);
        self.slots[index].position.store(0, Ordering::Relaxed);

        let msg = ControlMessage::Start { index, generation, queue, looping,
            props: Box::new(props) };
        if self.tx.push(msg).is_err() {
            log::warn!("control queue full, start rejected");
            self.slots[index].state.store(VoiceState::Stopped as u8, Ordering::Release);
            return Err(EngineError::ControlQueueFull);
        }

        self.busy[index] = true;
        self.queue_lens[index] = queue_len;
        Ok(VoiceId { index, generation })
    }

    /// Publishes a new parameter snapshot. Audible changes ramp over the fade
    /// window starting at the next quantum.
    pub fn update(&mut self, id: VoiceId, mut props: VoiceProps) -> Result<(), EngineError> {
        self.check(id)?;
        self.validate_props(&mut props)?;
        let msg = ControlMessage::Update {
            index: id.index,
            generation: id.generation,
            props: Box::new(props),
        };
        self.push(msg)
    }

    /// Appends an item to a playing voice's queue.
    pub fn enqueue(&mut self, id: VoiceId, item: BufferItem) -> Result<(), EngineError> {
        self.check(id)?;
        if matches!(item.data, BufferData::Callback(_)) {
            return Err(EngineError::MixedCallbackQueue);
        }
        validate_item(&item)?;
        if self.queue_lens[id.index] >= MAX_QUEUE_ITEMS {
            return Err(EngineError::BufferQueueFull);
        }
        self.push(ControlMessage::Enqueue { index: id.index, generation: id.generation, item })?;
        self.queue_lens[id.index] += 1;
        Ok(())
    }

    pub fn set_looping(&mut self, id: VoiceId, looping: bool) -> Result<(), EngineError> {
        self.check(id)?;
        self.push(ControlMessage::SetLoop { index: id.index, generation: id.generation, looping })
    }

    /// Stops a voice. Soft stops fade out over one quantum; hard stops cut
    /// immediately.
    pub fn stop(&mut self, id: VoiceId, hard: bool) -> Result<(), EngineError> {
        self.check(id)?;
        self.push(ControlMessage::Stop { index: id.index, generation: id.generation, hard })
    }

    /// Current state as last published by the renderer.
    pub fn state(&self, id: VoiceId) -> Result<VoiceState, EngineError> {
        self.check(id)?;
        Ok(VoiceState::from_u8(self.slots[id.index].state.load(Ordering::Acquire)))
    }

    /// Playback progress of a live voice.
    pub fn playback_position(&self, id: VoiceId) -> Result<PlaybackPosition, EngineError> {
        self.check(id)?;
        let samples = self.slots[id.index].position.load(Ordering::Relaxed);
        let latency =
            Duration::from_secs_f64(f64::from(self.output_latency) / f64::from(self.sample_rate));
        Ok(PlaybackPosition { samples, latency })
    }

    /// Drains retirement events, freeing render-side allocations here and
    /// releasing slots of finished voices. Call periodically; `start` also
    /// calls it.
    pub fn collect(&mut self) {
        while let Ok(event) = self.events.pop() {
            match event {
                RenderEvent::Finished { index, generation } => {
                    if self.generations[index] == generation {
                        self.busy[index] = false;
                        self.queue_lens[index] = 0;
                    }
                }
                // Retired allocations drop here, off the render thread.
                RenderEvent::RetiredProps(_)
                | RenderEvent::RetiredQueue(_)
                | RenderEvent::RetiredItem(_) => {}
            }
        }
    }

    /// Voices currently allocated.
    pub fn active_voices(&self) -> usize {
        self.busy.iter().filter(|&&b| b).count()
    }

    fn check(&self, id: VoiceId) -> Result<(), EngineError> {
        if id.index >= self.busy.len()
            || !self.busy[id.index]
            || self.generations[id.index] != id.generation
        {
            return Err(EngineError::StaleVoice);
        }
        Ok(())
    }

    fn validate_props(&self, props: &mut VoiceProps) -> Result<(), EngineError> {
        if !(props.pitch > 0.0 && props.pitch <= MAX_PITCH as f32) {
            return Err(EngineError::BadPitch);
        }
        if props.hrtf.is_some() && !self.binaural {
            log::warn!("dropping hrtf target: output is not binaural");
            props.hrtf = None;
        }
        Ok(())
    }

    fn push(&mut self, msg: ControlMessage) -> Result<(), EngineError> {
        if self.tx.push(msg).is_err() {
            log::warn!("control queue full, message dropped");
            return Err(EngineError::ControlQueueFull);
        }
        Ok(())
    }
}

fn validate_item(item: &BufferItem) -> Result<(), EngineError> {
    match &item.data {
        BufferData::Static(_) => {
            if item.loop_start > item.loop_end || item.loop_end > item.sample_len {
                return Err(EngineError::BadLoopPoints);
            }
        }
        BufferData::Callback(source) => {
            if source.capacity() < RESAMPLE_LINE_LEN {
                return Err(EngineError::StagingTooSmall);
            }
        }
    }
    Ok(())
}
