//! Multi-pole IIR filter (low-pass, high-pass, band-pass).
//!
//! A cascade of identical one-pole sections, 6 dB/octave each, up to
//! [`MAX_POLES`]. High-pass is formed per section as input minus the
//! low-pass state; band-pass cascades the low-pass bank into the
//! high-pass bank. Cutoff changes ramp through a linear follower over
//! `frequency_follow_time_ms`, and each channel may override the cutoff
//! independently (used by the spatializer for distance filtering).
//!
//! As an IIR the phase response depends on frequency, so the filter
//! reports zero latency.

use cadena_core::{
    BufferViewMut, LinearFollower, Meters, Plugin, PluginHeader, ProcessFlags, Result,
    ms_to_samples,
};
use libm::expf;

/// Maximum cascade depth.
pub const MAX_POLES: usize = 16;

/// Filter response kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    /// Attenuate above the cutoff.
    #[default]
    LowPass,
    /// Attenuate below the cutoff.
    HighPass,
    /// Attenuate away from the cutoff on both sides.
    BandPass,
}

/// Configuration for [`Filter`].
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// Response kind.
    pub kind: FilterKind,
    /// Number of one-pole sections (1 to [`MAX_POLES`]), 6 dB/octave
    /// each.
    pub poles: usize,
    /// Cutoff frequency in Hz.
    pub frequency: f32,
    /// Blend with the dry signal: 1 is fully dry, 0 fully wet.
    pub dry_mix: f32,
    /// Additional wet gain in dB.
    pub gain_wet: f32,
    /// How long a cutoff change takes to ramp in, in ms.
    pub frequency_follow_time_ms: f32,
    /// Per-channel cutoff overrides in Hz; zero means "use
    /// [`frequency`](Self::frequency)".
    pub channel_frequency: Vec<f32>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            kind: FilterKind::LowPass,
            poles: 1,
            frequency: 4000.0,
            dry_mix: 0.0,
            gain_wet: 0.0,
            frequency_follow_time_ms: 50.0,
            channel_frequency: Vec::new(),
        }
    }
}

/// Per-channel filter state.
#[derive(Debug, Clone, Default)]
struct ChannelState {
    /// Cutoff follower, used when this channel has an override.
    frequency: LinearFollower,
    /// Low-pass section states.
    lowpass: [f32; MAX_POLES],
    /// High-pass section states (band-pass uses both banks).
    highpass: [f32; MAX_POLES],
}

/// Cascaded one-pole IIR filter.
pub struct Filter {
    header: PluginHeader,
    config: FilterConfig,
    frequency: LinearFollower,
    channels: Vec<ChannelState>,
    meters_input: Meters,
    meters_output: Meters,
}

impl Filter {
    /// Create with the given configuration.
    pub fn new(config: FilterConfig) -> Self {
        let mut frequency = LinearFollower::default();
        frequency.jump(config.frequency);
        Self {
            header: PluginHeader::new("Filter"),
            config,
            frequency,
            channels: Vec::new(),
            meters_input: Meters::new(),
            meters_output: Meters::new(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: FilterConfig) {
        self.config = config;
    }

    fn ensure_channels(&mut self, channels: usize) {
        while self.channels.len() < channels {
            self.channels.push(ChannelState::default());
        }
    }

    /// One-pole coefficient for a cutoff at the given sample rate.
    #[inline]
    fn coefficient(frequency: f32, samplerate: f32) -> f32 {
        let clamped = frequency.clamp(1.0, samplerate * 0.5);
        1.0 - expf(-2.0 * core::f32::consts::PI * clamped / samplerate)
    }

    /// Run one sample through the pole cascade for one channel.
    #[inline]
    fn tick(kind: FilterKind, poles: usize, state: &mut ChannelState, c: f32, input: f32) -> f32 {
        match kind {
            FilterKind::LowPass => {
                let mut x = input;
                for s in state.lowpass.iter_mut().take(poles) {
                    *s += c * (x - *s);
                    x = *s;
                }
                x
            }
            FilterKind::HighPass => {
                let mut x = input;
                for s in state.lowpass.iter_mut().take(poles) {
                    *s += c * (x - *s);
                    x -= *s;
                }
                x
            }
            FilterKind::BandPass => {
                let mut x = input;
                for s in state.lowpass.iter_mut().take(poles) {
                    *s += c * (x - *s);
                    x = *s;
                }
                for s in state.highpass.iter_mut().take(poles) {
                    *s += c * (x - *s);
                    x -= *s;
                }
                x
            }
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

impl Plugin for Filter {
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
            self.ensure_channels(buffer.channels());
            self.reset_channels(first, count);
        }
        self.ensure_channels(buffer.channels());

        if self.header.selected != 0 {
            self.meters_input.update(&buffer.as_view(), 1.0);
        }

        let samplerate = buffer.samplerate() as f32;
        let frames = buffer.frames();
        let channels = buffer.channels();
        let poles = self.config.poles.clamp(1, MAX_POLES);
        let wet_amp = cadena_core::db_to_amp(self.config.gain_wet);
        let dry_mix = self.config.dry_mix.clamp(0.0, 1.0);

        // One follower step per frame: the fraction of the follow time one
        // frame covers.
        let follow_samples = ms_to_samples(self.config.frequency_follow_time_ms, samplerate);
        let delta_t = if follow_samples > 0.0 {
            1.0 / follow_samples
        } else {
            1.0
        };

        for f in 0..frames {
            let shared = self
                .frequency
                .update_target(self.config.frequency, delta_t);
            for c in 0..channels {
                let override_hz = self
                    .config
                    .channel_frequency
                    .get(c)
                    .copied()
                    .unwrap_or(0.0);
                let state = &mut self.channels[c];
                let cutoff = if override_hz > 0.0 {
                    state.frequency.update_target(override_hz, delta_t)
                } else {
                    shared
                };
                let coefficient = Self::coefficient(cutoff, samplerate);
                let dry = buffer.sample(f as isize, c);
                let wet = Self::tick(self.config.kind, poles, state, coefficient, dry);
                let out = wet * wet_amp * (1.0 - dry_mix) + dry * dry_mix;
                buffer.set_sample(f as isize, c, out);
            }
        }

        if self.header.selected != 0 {
            self.meters_output.update(&buffer.as_view(), 1.0);
        }
        Ok(())
    }

    fn reset(&mut self) {
        for state in &mut self.channels {
            state.lowpass = [0.0; MAX_POLES];
            state.highpass = [0.0; MAX_POLES];
            state.frequency = LinearFollower::default();
        }
        self.frequency.jump(self.config.frequency);
        self.meters_input.reset();
        self.meters_output.reset();
    }

    fn reset_channels(&mut self, first: usize, count: usize) {
        self.ensure_channels(first + count);
        for state in &mut self.channels[first..first + count] {
            state.lowpass = [0.0; MAX_POLES];
            state.highpass = [0.0; MAX_POLES];
        }
        self.meters_input.reset_channels(first, count);
        self.meters_output.reset_channels(first, count);
    }
}
