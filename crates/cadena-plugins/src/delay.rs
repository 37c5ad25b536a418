//! Feedback delay with per-channel trim, ping-pong, and a wet-path
//! effects chain.
//!
//! Each channel owns a ring buffer sized to the configured delay (plus a
//! per-channel extra trim, useful for stereo offsets). The wet path is
//! `input + feedback × delayed`, optionally cross-routed into the next
//! channel (ping-pong) and optionally run through an internal effects
//! chain before it is written back into the ring — so feedback passes
//! through those effects on every round trip.
//!
//! The delay takes a snapshot of its input mid-chain, so it cannot rely
//! on chain-provided leading context; it owns all its history and reports
//! no edge demands. Ring growth preserves content and surfaces
//! `OutOfMemory` only through the allocator.

use cadena_core::{
    BufferViewMut, Chain, Meters, Plugin, PluginHeader, ProcessFlags, Result, SideBuffer,
    db_to_amp, ms_to_samples,
};

/// Configuration for [`Delay`].
#[derive(Debug, Clone, PartialEq)]
pub struct DelayConfig {
    /// Wet gain in dB.
    pub gain_wet: f32,
    /// Dry gain in dB.
    pub gain_dry: f32,
    /// Mute the wet signal entirely.
    pub mute_wet: bool,
    /// Mute the dry signal entirely.
    pub mute_dry: bool,
    /// Delay time in ms.
    pub delay_ms: f32,
    /// Fraction of the output fed back into the input, 0 to 1.
    pub feedback: f32,
    /// How much of each channel's wet signal routes into the next
    /// channel, 0 to 1.
    pub pingpong: f32,
    /// Additional per-channel delay in ms, indexed by channel.
    pub channel_delay_ms: Vec<f32>,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            gain_wet: -6.0,
            gain_dry: 0.0,
            mute_wet: false,
            mute_dry: false,
            delay_ms: 300.0,
            feedback: 0.5,
            pingpong: 0.0,
            channel_delay_ms: Vec::new(),
        }
    }
}

/// Per-channel delay ring.
#[derive(Debug, Clone, Default)]
struct ChannelState {
    buffer: Vec<f32>,
    index: usize,
}

impl ChannelState {
    /// Grow or shrink to `samples` slots, preserving content on growth.
    fn set_delay(&mut self, samples: usize) {
        match samples.cmp(&self.buffer.len()) {
            core::cmp::Ordering::Greater => {
                self.buffer.resize(samples, 0.0);
            }
            core::cmp::Ordering::Less => {
                self.buffer.truncate(samples);
                if self.index >= samples {
                    self.index = 0;
                }
            }
            core::cmp::Ordering::Equal => {}
        }
    }
}

/// Static feedback delay.
pub struct Delay {
    header: PluginHeader,
    config: DelayConfig,
    channels: Vec<ChannelState>,
    /// Effects applied to the wet path (including feedback) before it
    /// re-enters the ring.
    input_effects: Option<Chain>,
    meters_input: Meters,
    meters_output: Meters,
}

impl Delay {
    /// Create with the given configuration.
    pub fn new(config: DelayConfig) -> Self {
        Self {
            header: PluginHeader::new("Delay"),
            config,
            channels: Vec::new(),
            input_effects: None,
            meters_input: Meters::new(),
            meters_output: Meters::new(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &DelayConfig {
        &self.config
    }

    /// Replace the configuration. Ring sizes adapt on the next block.
    pub fn set_config(&mut self, config: DelayConfig) {
        self.config = config;
    }

    /// Install (or clear) the wet-path effects chain.
    pub fn set_input_effects(&mut self, chain: Option<Chain>) {
        self.input_effects = chain;
    }

    /// Delay of one channel in samples at the given rate. The ring holds
    /// one extra slot so the write→advance→read sequence yields exactly
    /// this many frames of delay.
    fn delay_samples(&self, channel: usize, samplerate: u32) -> usize {
        let extra = self
            .config
            .channel_delay_ms
            .get(channel)
            .copied()
            .unwrap_or(0.0);
        ms_to_samples(self.config.delay_ms + extra, samplerate as f32) as usize
    }

    fn ensure_channels(&mut self, channels: usize) {
        while self.channels.len() < channels {
            self.channels.push(ChannelState::default());
        }
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::new(DelayConfig::default())
    }
}

impl Plugin for Delay {
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

        let channels = buffer.channels();
        let frames = buffer.frames();
        let samplerate = buffer.samplerate();
        for c in 0..channels {
            let samples = self.delay_samples(c, samplerate);
            self.channels[c].set_delay(samples + 1);
        }

        if self.header.selected != 0 {
            self.meters_input.update(&buffer.as_view(), 1.0);
        }

        // Wet accumulation: input + feedback, with ping-pong cross-routes.
        let mut wet = SideBuffer::zeroed(frames, 0, 0, channels, samplerate);
        for c in 0..channels {
            let state = &self.channels[c];
            let cross = (c + 1) % channels;
            let mut index = state.index;
            let len = state.buffer.len();
            for f in 0..frames {
                let to_add =
                    buffer.sample(f as isize, c) + state.buffer[index] * self.config.feedback;
                let body = wet.body_mut();
                body[f * channels + c] += to_add * (1.0 - self.config.pingpong);
                body[f * channels + cross] += to_add * self.config.pingpong;
                index = (index + 1) % len;
            }
        }

        if let Some(effects) = self.input_effects.as_mut() {
            effects.process_in_place(&mut wet, flags)?;
        }

        let amount_wet = if self.config.mute_wet {
            0.0
        } else {
            db_to_amp(self.config.gain_wet)
        };
        let amount_dry = if self.config.mute_dry {
            0.0
        } else {
            db_to_amp(self.config.gain_dry)
        };

        for c in 0..channels {
            let state = &mut self.channels[c];
            let mut index = state.index;
            let len = state.buffer.len();
            for f in 0..frames {
                state.buffer[index] = wet.body()[f * channels + c];
                index = (index + 1) % len;
                let dry = buffer.sample(f as isize, c);
                buffer.set_sample(
                    f as isize,
                    c,
                    state.buffer[index] * amount_wet + dry * amount_dry,
                );
            }
            state.index = index;
        }

        if self.header.selected != 0 {
            self.meters_output.update(&buffer.as_view(), 1.0);
        }
        Ok(())
    }

    fn reset(&mut self) {
        for state in &mut self.channels {
            state.buffer.fill(0.0);
            state.index = 0;
        }
        self.meters_input.reset();
        self.meters_output.reset();
    }

    fn reset_channels(&mut self, first: usize, count: usize) {
        self.ensure_channels(first + count);
        for state in &mut self.channels[first..first + count] {
            state.buffer.fill(0.0);
            state.index = 0;
        }
        self.meters_input.reset_channels(first, count);
        self.meters_output.reset_channels(first, count);
    }
}
