//! Messages crossing between the control and render threads.
//!
//! Everything heap-owned travels by move: the control side allocates, the
//! render side uses the allocation and sends it back as a retirement event so
//! it is freed off the audio thread. The render thread itself never allocates
//! or frees.

use crate::voice::params::VoiceProps;
use crate::voice::queue::BufferItem;

/// Control to render. Slot index plus generation, so a message aimed at a
/// voice that has since been recycled is ignored (its payload still retires).
pub enum ControlMessage {
    Start {
        index: usize,
        generation: u64,
        queue: Vec<BufferItem>,
        looping: bool,
        props: Box<VoiceProps>,
    },
    Update {
        index: usize,
        generation: u64,
        props: Box<VoiceProps>,
    },
    Enqueue {
        index: usize,
        generation: u64,
        item: BufferItem,
    },
    SetLoop {
        index: usize,
        generation: u64,
        looping: bool,
    },
    Stop {
        index: usize,
        generation: u64,
        /// Hard stops cut the voice immediately; soft stops fade one quantum.
        hard: bool,
    },
}

/// Render to control.
pub enum RenderEvent {
    /// A parameter snapshot the render thread is done with.
    RetiredProps(Box<VoiceProps>),
    /// A buffer queue from a stopped or restarted voice.
    RetiredQueue(Vec<BufferItem>),
    /// A single item that could not be accepted.
    RetiredItem(BufferItem),
    /// The voice in `index` reached Stopped; its slot can be reused.
    Finished { index: usize, generation: u64 },
}
