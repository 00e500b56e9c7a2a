//! Buffer queue items and their sample sources.

use std::sync::Arc;

/// Pre-decoded sample storage, shared read-only so many voices can play the
/// same buffer without copying it.
#[derive(Clone)]
pub enum SampleData {
    F32(Arc<[f32]>),
    I16(Arc<[i16]>),
}

impl SampleData {
    pub fn len(&self) -> usize {
        match self {
            SampleData::F32(data) => data.len(),
            SampleData::I16(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies samples starting at `offset` into `dst`, converting to float.
    /// Returns how many were copied, short when the data runs out.
    pub fn read(&self, offset: usize, dst: &mut [f32]) -> usize {
        match self {
            SampleData::F32(data) => {
                let avail = data.get(offset..).unwrap_or(&[]);
                let n = avail.len().min(dst.len());
                dst[..n].copy_from_slice(&avail[..n]);
                n
            }
            SampleData::I16(data) => {
                let avail = data.get(offset..).unwrap_or(&[]);
                let n = avail.len().min(dst.len());
                for (out, &smp) in dst[..n].iter_mut().zip(&avail[..n]) {
                    *out = f32::from(smp) / 32768.0;
                }
                n
            }
        }
    }
}

impl std::fmt::Debug for SampleData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleData::F32(data) => f.debug_tuple("F32").field(&data.len()).finish(),
            SampleData::I16(data) => f.debug_tuple("I16").field(&data.len()).finish(),
        }
    }
}

/// A streaming source that produces samples on demand.
///
/// The callback is pulled from the render thread, so it must not block or
/// allocate. A short or zero-length read means the stream has ended; it is
/// never treated as an error. Produced samples are staged in a pre-allocated
/// line because resampling can re-read a region across quantum boundaries,
/// and the callback can only be asked for any sample once.
pub struct CallbackSource {
    callback: Box<dyn FnMut(&mut [f32]) -> usize + Send>,
    staging: Vec<f32>,
    /// Absolute position of `staging[0]`.
    base: usize,
    /// Valid samples currently staged.
    filled: usize,
    stopped: bool,
}

impl CallbackSource {
    pub fn new(callback: Box<dyn FnMut(&mut [f32]) -> usize + Send>, capacity: usize) -> Self {
        Self { callback, staging: vec![0.0; capacity], base: 0, filled: 0, stopped: false }
    }

    /// Absolute position one past the last produced sample.
    pub fn available(&self) -> usize {
        self.base + self.filled
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Size of the staging line, the most this source can hold at once.
    pub fn capacity(&self) -> usize {
        self.staging.len()
    }

    /// Pulls from the callback until samples up to the absolute position
    /// `end` are staged, or the stream ends.
    pub fn produce_to(&mut self, end: usize) {
        while !self.stopped && self.available() < end {
            let space = &mut self.staging[self.filled..];
            if space.is_empty() {
                // Staging is sized for the worst-case quantum, so running out
                // means the caller asked beyond what one quantum can consume.
                debug_assert!(false, "callback staging exhausted");
                return;
            }
            let want = space.len().min(end - self.base - self.filled);
            let got = (self.callback)(&mut space[..want]);
            self.filled += got;
            if got < want {
                self.stopped = true;
            }
        }
    }

    /// Copies staged samples starting at absolute position `offset` into
    /// `dst`, returning how many were copied.
    pub fn read(&self, offset: usize, dst: &mut [f32]) -> usize {
        if offset < self.base {
            debug_assert!(false, "reading discarded callback samples");
            return 0;
        }
        let start = offset - self.base;
        let avail = self.filled.saturating_sub(start);
        let n = avail.min(dst.len());
        dst[..n].copy_from_slice(&self.staging[start..start + n]);
        n
    }

    /// Discards staged samples before the absolute position `pos`. Future
    /// reads must be at or after it.
    pub fn discard_to(&mut self, pos: usize) {
        if pos <= self.base {
            return;
        }
        let drop = (pos - self.base).min(self.filled);
        self.staging.copy_within(drop..self.filled, 0);
        self.filled -= drop;
        self.base = pos;
    }
}

impl std::fmt::Debug for CallbackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSource")
            .field("base", &self.base)
            .field("filled", &self.filled)
            .field("stopped", &self.stopped)
            .finish()
    }
}

#[derive(Debug)]
pub enum BufferData {
    Static(SampleData),
    Callback(CallbackSource),
}

/// One entry in a voice's buffer queue.
#[derive(Debug)]
pub struct BufferItem {
    pub data: BufferData,
    /// Playable length in samples. Callback items report an unbounded length
    /// until the stream ends.
    pub sample_len: usize,
    /// Loop region, used when the voice loops within a single static item.
    pub loop_start: usize,
    pub loop_end: usize,
}

impl BufferItem {
    pub fn from_f32(data: Arc<[f32]>) -> Self {
        let sample_len = data.len();
        Self {
            data: BufferData::Static(SampleData::F32(data)),
            sample_len,
            loop_start: 0,
            loop_end: sample_len,
        }
    }

    pub fn from_i16(data: Arc<[i16]>) -> Self {
        let sample_len = data.len();
        Self {
            data: BufferData::Static(SampleData::I16(data)),
            sample_len,
            loop_start: 0,
            loop_end: sample_len,
        }
    }

    pub fn with_loop(mut self, loop_start: usize, loop_end: usize) -> Self {
        self.loop_start = loop_start;
        self.loop_end = loop_end;
        self
    }

    /// A streaming item. `staging_capacity` bounds how many samples one
    /// quantum can consume from it.
    pub fn from_callback(
        callback: Box<dyn FnMut(&mut [f32]) -> usize + Send>,
        staging_capacity: usize,
    ) -> Self {
        Self {
            data: BufferData::Callback(CallbackSource::new(callback, staging_capacity)),
            sample_len: usize::MAX,
            loop_start: 0,
            loop_end: 0,
        }
    }
}
