//! Parameter snapshots published from the control thread.
//!
//! A [`VoiceProps`] is built and boxed on the control side, handed to the
//! render thread whole, and never mutated afterwards. The render thread folds
//! it into the voice's working state at the top of a quantum, so every sample
//! of a quantum sees one consistent set of targets.

use std::sync::Arc;

use crate::dsp::filter::FilterMode;
use crate::dsp::hrtf::Hrir;
use crate::dsp::Resampler;
use crate::{MAX_OUTPUT_CHANNELS, MAX_SENDS};

/// Shelving filter targets for one mixing path.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FilterParams {
    /// Gain applied above `hf_norm` by the low-pass shelf.
    pub gain_hf: f32,
    /// Normalized reference frequency of the high shelf (ref / sample_rate).
    pub hf_norm: f32,
    /// Gain applied below `lf_norm` by the high-pass shelf.
    pub gain_lf: f32,
    /// Normalized reference frequency of the low shelf.
    pub lf_norm: f32,
}

impl Default for FilterParams {
    fn default() -> Self {
        // Reference frequencies match 5kHz and 250Hz at 48kHz output.
        Self { gain_hf: 1.0, hf_norm: 5000.0 / 48000.0, gain_lf: 1.0, lf_norm: 250.0 / 48000.0 }
    }
}

impl FilterParams {
    /// Which filter sections the gains make active.
    pub fn mode(&self) -> FilterMode {
        match (self.gain_hf < 1.0, self.gain_lf < 1.0) {
            (true, true) => FilterMode::BandPass,
            (true, false) => FilterMode::LowPass,
            (false, true) => FilterMode::HighPass,
            (false, false) => FilterMode::None,
        }
    }
}

/// Binaural placement for the direct path. The response is shared read-only;
/// voices copy it into their working filter when adopting the snapshot.
#[derive(Debug, Clone)]
pub struct HrtfTarget {
    pub coeffs: Arc<Hrir>,
    pub delay: [usize; 2],
    pub gain: f32,
}

/// Per-send targets.
#[derive(Debug, Clone, Default)]
pub struct SendProps {
    pub gain: f32,
    pub filter: FilterParams,
}

/// One complete parameter snapshot for a voice.
#[derive(Debug, Clone)]
pub struct VoiceProps {
    /// Source samples consumed per output sample. 1.0 plays at native rate.
    pub pitch: f32,
    pub resampler: Resampler,
    /// Direct-path target gains, one per output channel.
    pub direct_gains: [f32; MAX_OUTPUT_CHANNELS],
    pub direct_filter: FilterParams,
    /// When set, the direct path renders binaurally instead of through the
    /// channel gains.
    pub hrtf: Option<HrtfTarget>,
    pub sends: [SendProps; MAX_SENDS],
}

impl Default for VoiceProps {
    fn default() -> Self {
        Self {
            pitch: 1.0,
            resampler: Resampler::default(),
            direct_gains: [0.0; MAX_OUTPUT_CHANNELS],
            direct_filter: FilterParams::default(),
            hrtf: None,
            sends: Default::default(),
        }
    }
}
