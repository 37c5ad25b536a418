//! Dynamics compressor with an RMS sidechain and dB-domain gain.
//!
//! The sidechain is a 128-sample RMS window, max-combined across channels
//! so all channels receive identical (linked) gain reduction. The level
//! detector smooths the sidechain in dB with separate exponential attack
//! and decay factors `exp(−1 / (time_ms × samplerate / 1000))`, and while
//! the smoothed level sits above the threshold the applied gain is
//!
//! ```text
//! gain_dB = (1 − 1/ratio) × (threshold − level)
//! ```
//!
//! A negative ratio acts as an explicit over-compression factor (slope
//! `−ratio`), which allows upward-pumping special effects.

use cadena_core::{
    BufferViewMut, Meters, Plugin, PluginHeader, ProcessFlags, Result, SideBuffer, amp_to_db,
    db_to_amp,
};
use libm::expf;

use crate::rms::{CombineOp, RmsWindow};

/// Sidechain window length in samples.
const RMS_WINDOW_SAMPLES: usize = 128;

/// Configuration for [`Compressor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorConfig {
    /// Level in dB above which compression engages.
    pub threshold: f32,
    /// Compression ratio (>1). Values below 0 select over-compression
    /// with slope `−ratio`; values in `[0, 1]` disable gain reduction.
    pub ratio: f32,
    /// Attack time constant in ms.
    pub attack_ms: f32,
    /// Decay (release) time constant in ms.
    pub decay_ms: f32,
    /// Input gain in dB, applied to the sidechain and folded into the
    /// output gain.
    pub gain_input: f32,
    /// Output (makeup) gain in dB.
    pub gain_output: f32,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            threshold: -12.0,
            ratio: 10.0,
            attack_ms: 50.0,
            decay_ms: 200.0,
            gain_input: 0.0,
            gain_output: 0.0,
        }
    }
}

/// RMS-sidechain compressor.
#[derive(Debug)]
pub struct Compressor {
    header: PluginHeader,
    config: CompressorConfig,
    rms: RmsWindow,
    /// Smoothed sidechain level in dB.
    attenuation: f32,
    /// Deepest gain reduction seen since reset, in dB (≤ 0).
    min_gain: f32,
    /// Deepest gain reduction in the current block, in dB (≤ 0).
    min_gain_short: f32,
    meters_input: Meters,
    meters_output: Meters,
}

impl Compressor {
    /// Create with the given configuration.
    pub fn new(config: CompressorConfig) -> Self {
        Self {
            header: PluginHeader::new("Compressor"),
            config,
            rms: RmsWindow::new(RMS_WINDOW_SAMPLES, CombineOp::Max),
            attenuation: -120.0,
            min_gain: 0.0,
            min_gain_short: 0.0,
            meters_input: Meters::new(),
            meters_output: Meters::new(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: CompressorConfig) {
        self.config = config;
    }

    /// Deepest gain reduction in dB since reset (≤ 0).
    pub fn min_gain(&self) -> f32 {
        self.min_gain
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(CompressorConfig::default())
    }
}

impl Plugin for Compressor {
    fn header(&self) -> &PluginHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut PluginHeader {
        &mut self.header
    }

    fn process(&mut self, mut buffer: BufferViewMut<'_>, flags: ProcessFlags) -> Result<()> {
        if flags.contains(ProcessFlags::CUT) {
            self.reset();
        }
        if let Some((first, count)) = self.header.track_channels(buffer.channels()) {
            self.reset_channels(first, count);
        }
        let amount_input = db_to_amp(self.config.gain_input);
        if self.header.selected != 0 {
            self.meters_input.update(&buffer.as_view(), amount_input);
        }

        let mut sidechain = SideBuffer::zeroed(buffer.frames(), 0, 0, 1, buffer.samplerate());
        self.rms
            .process_into(sidechain.body_mut(), &buffer.as_view());

        let t = buffer.samplerate() as f32 / 1000.0;
        let attack_factor = expf(-1.0 / (self.config.attack_ms * t));
        let decay_factor = expf(-1.0 / (self.config.decay_ms * t));
        let overgain_factor = if self.config.ratio > 1.0 {
            1.0 - 1.0 / self.config.ratio
        } else if self.config.ratio < 0.0 {
            -self.config.ratio
        } else {
            0.0
        };
        let total_gain = self.config.gain_output + self.config.gain_input;

        self.min_gain_short = 0.0;
        let channels = buffer.channels();
        for f in 0..buffer.frames() {
            let rms = (amp_to_db(sidechain.body()[f]) + self.config.gain_input).max(-120.0);
            let factor = if rms > self.attenuation {
                attack_factor
            } else {
                decay_factor
            };
            self.attenuation = rms + factor * (self.attenuation - rms);
            let gain = if self.attenuation > self.config.threshold {
                overgain_factor * (self.config.threshold - self.attenuation)
            } else {
                0.0
            };
            self.min_gain_short = self.min_gain_short.min(gain);
            let amp = db_to_amp(gain + total_gain);
            for c in 0..channels {
                let sample = buffer.sample(f as isize, c);
                buffer.set_sample(f as isize, c, sample * amp);
            }
        }
        self.min_gain = self.min_gain.min(self.min_gain_short);

        if self.header.selected != 0 {
            self.meters_output.update(&buffer.as_view(), 1.0);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.rms.reset();
        self.attenuation = -120.0;
        self.min_gain = 0.0;
        self.min_gain_short = 0.0;
        self.meters_input.reset();
        self.meters_output.reset();
    }

    fn reset_channels(&mut self, first: usize, count: usize) {
        self.rms.reset_channels(first, count);
        self.meters_input.reset_channels(first, count);
        self.meters_output.reset_channels(first, count);
    }
}
