//! Noise gate — the compressor's mirror image.
//!
//! The same RMS sidechain and exponential ballistics as the compressor,
//! but acting below the threshold: while the smoothed level sits under it,
//! the gain falls off steeply at `−10 dB` per dB of shortfall, closing the
//! gate on silence and leaks.
//!
//! An optional *activation chain* filters a copy of the input before level
//! detection (classic trick: high-pass the sidechain so rumble doesn't
//! hold the gate open) without touching the audible path.

use cadena_core::{
    BufferViewMut, Chain, Meters, Plugin, PluginHeader, ProcessFlags, Result, SideBuffer,
    amp_to_db, db_to_amp,
};
use libm::expf;

use crate::rms::{CombineOp, RmsWindow};

/// Sidechain window length in samples.
const RMS_WINDOW_SAMPLES: usize = 128;

/// Configuration for [`Gate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    /// Level in dB below which the gate closes.
    pub threshold: f32,
    /// Attack time constant in ms (how fast the gate opens).
    pub attack_ms: f32,
    /// Decay time constant in ms (how fast it closes).
    pub decay_ms: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            threshold: -18.0,
            attack_ms: 5.0,
            decay_ms: 100.0,
        }
    }
}

/// RMS-sidechain noise gate.
pub struct Gate {
    header: PluginHeader,
    config: GateConfig,
    rms: RmsWindow,
    /// Smoothed sidechain level in dB.
    attenuation: f32,
    /// Gain applied to the last processed frame, in dB (for UI).
    gain: f32,
    /// Optional effects applied to the sidechain copy before detection.
    activation: Option<Chain>,
    meters_input: Meters,
    meters_output: Meters,
}

impl Gate {
    /// Create with the given configuration.
    pub fn new(config: GateConfig) -> Self {
        Self {
            header: PluginHeader::new("Gate"),
            config,
            rms: RmsWindow::new(RMS_WINDOW_SAMPLES, CombineOp::Max),
            attenuation: -120.0,
            gain: 0.0,
            activation: None,
            meters_input: Meters::new(),
            meters_output: Meters::new(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: GateConfig) {
        self.config = config;
    }

    /// Install (or clear) the sidechain activation chain.
    pub fn set_activation_effects(&mut self, chain: Option<Chain>) {
        self.activation = chain;
    }

    /// Gain applied to the most recent frame, in dB.
    pub fn gain_db(&self) -> f32 {
        self.gain
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new(GateConfig::default())
    }
}

impl Plugin for Gate {
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
        if self.header.selected != 0 {
            self.meters_input.update(&buffer.as_view(), 1.0);
        }

        let mut sidechain = SideBuffer::zeroed(buffer.frames(), 0, 0, 1, buffer.samplerate());
        if let Some(activation) = self.activation.as_mut() {
            let mut detector_input = SideBuffer::copy_of(&buffer.as_view());
            activation.process_in_place(&mut detector_input, flags)?;
            self.rms
                .process_into(sidechain.body_mut(), &detector_input.view());
        } else {
            self.rms
                .process_into(sidechain.body_mut(), &buffer.as_view());
        }

        let t = buffer.samplerate() as f32 / 1000.0;
        let attack_factor = expf(-1.0 / (self.config.attack_ms * t));
        let decay_factor = expf(-1.0 / (self.config.decay_ms * t));
        let channels = buffer.channels();
        for f in 0..buffer.frames() {
            let rms = amp_to_db(sidechain.body()[f]).max(-120.0);
            let factor = if rms > self.config.threshold {
                attack_factor
            } else {
                decay_factor
            };
            self.attenuation = rms + factor * (self.attenuation - rms);
            let gain = if self.attenuation > self.config.threshold {
                0.0
            } else {
                -10.0 * (self.config.threshold - self.attenuation)
            };
            self.gain = gain;
            let amp = db_to_amp(gain);
            for c in 0..channels {
                let sample = buffer.sample(f as isize, c);
                buffer.set_sample(f as isize, c, sample * amp);
            }
        }

        if self.header.selected != 0 {
            self.meters_output.update(&buffer.as_view(), 1.0);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.rms.reset();
        self.attenuation = -120.0;
        self.gain = 0.0;
        self.meters_input.reset();
        self.meters_output.reset();
    }

    fn reset_channels(&mut self, first: usize, count: usize) {
        self.rms.reset_channels(first, count);
        self.meters_input.reset_channels(first, count);
        self.meters_output.reset_channels(first, count);
    }
}
