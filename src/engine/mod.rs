//! The engine's two halves: a [`Controller`] for the application thread and a
//! [`Renderer`] for the audio thread, joined by a pair of lock-free SPSC
//! rings. The controller validates and allocates; the renderer mixes and
//! never blocks.

pub mod message;

mod control;
mod render;

pub use control::{Controller, EngineError, PlaybackPosition, VoiceId};
pub use render::{BedChannelConfig, BinauralConfig, OutputMode, Renderer};

use std::sync::atomic::{AtomicU64, AtomicU8};
use std::sync::Arc;

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Fixed voice pool size.
    pub max_voices: usize,
    /// Number of auxiliary send beds, up to [`crate::MAX_SENDS`].
    pub sends: usize,
    pub output: OutputMode,
    /// Backend latency in samples, reported through position queries.
    pub output_latency: u32,
    /// Capacity of each control/event ring.
    pub queue_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            max_voices: 64,
            sends: 0,
            output: OutputMode::Channels(2),
            output_latency: 0,
            queue_len: 256,
        }
    }
}

/// Per-slot state shared between the halves. The renderer publishes here so
/// the controller can answer queries without a round trip.
pub(crate) struct SharedSlot {
    pub state: AtomicU8,
    pub position: AtomicU64,
}

impl SharedSlot {
    fn new() -> Self {
        Self { state: AtomicU8::new(0), position: AtomicU64::new(0) }
    }
}

/// Builds a connected controller/renderer pair. The renderer is `Send`; move
/// it into the audio callback and call
/// [`render_quantum`](Renderer::render_quantum) once per period.
pub fn engine(config: EngineConfig) -> (Controller, Renderer) {
    let slots: Arc<[SharedSlot]> =
        (0..config.max_voices).map(|_| SharedSlot::new()).collect();

    let (cmd_tx, cmd_rx) = rtrb::RingBuffer::new(config.queue_len);
    let (evt_tx, evt_rx) = rtrb::RingBuffer::new(config.queue_len);

    let controller = Controller::new(&config, Arc::clone(&slots), cmd_tx, evt_rx);
    let renderer = Renderer::new(&config, slots, cmd_rx, evt_tx);
    (controller, renderer)
}
