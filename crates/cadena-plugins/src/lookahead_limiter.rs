//! Constant-latency true-peak limiter with a ramped gain envelope.
//!
//! The limiter delays audio by a fixed 128-frame window and tracks the
//! cross-channel absolute peak of the *undelayed* input, so it always
//! knows about a peak before the peak reaches the output. Gain reduction
//! is a single shared envelope driven by a slope:
//!
//! - A fresh peak requiring steeper attenuation than the current slope
//!   adopts that slope and arms a cooldown of one window.
//! - When the cooldown expires while gain is still below unity, every
//!   position in the peak window is probed for the future peak whose
//!   slope-to-reach-it is steepest; failing that, a gentle recovery slope
//!   of one-fifth the window rate ramps gain back to unity.
//!
//! The envelope therefore previews peaks up to a full window ahead and
//! approaches them as a ramp instead of a click. The delayed samples are
//! multiplied by the envelope and hard-clamped to ±1, so the output bound
//! holds for any input and any input gain.
//!
//! Latency is reported as exactly the window length; the limiter owns its
//! delay internally and asks the chain for no edge context.

use cadena_core::{
    BufferViewMut, LatencySpec, Meters, Plugin, PluginHeader, ProcessFlags, Result, SideBuffer,
    db_to_amp,
};
use libm::fabsf;

/// Lookahead window in frames. 128 frames is 2.7 ms at 48 kHz.
pub const LOOKAHEAD_FRAMES: usize = 128;

/// Configuration for [`LookaheadLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LookaheadLimiterConfig {
    /// Input gain in dB, applied before peak detection.
    pub gain_input: f32,
    /// Output gain in dB, applied after the ±1 clamp.
    pub gain_output: f32,
}

/// Per-channel delayed sample storage.
#[derive(Debug, Clone)]
struct ChannelState {
    samples: [f32; LOOKAHEAD_FRAMES],
}

impl ChannelState {
    fn new() -> Self {
        Self {
            samples: [0.0; LOOKAHEAD_FRAMES],
        }
    }
}

/// Lookahead brickwall limiter.
pub struct LookaheadLimiter {
    header: PluginHeader,
    config: LookaheadLimiterConfig,
    /// Peak per frame of the lookahead window, shared by all channels.
    peak_buffer: [f32; LOOKAHEAD_FRAMES],
    /// Ring position within the window.
    index: usize,
    /// Frames until the envelope may re-plan its slope.
    cooldown: usize,
    /// Current gain envelope value (1.0 = no reduction).
    sum: f32,
    /// Current envelope slope per frame.
    slope: f32,
    /// Deepest envelope value since reset.
    min_amp: f32,
    /// Deepest envelope value over recent blocks.
    min_amp_short: f32,
    channels: Vec<ChannelState>,
    meters_input: Meters,
    meters_output: Meters,
}

impl LookaheadLimiter {
    /// Create with the given configuration.
    pub fn new(config: LookaheadLimiterConfig) -> Self {
        Self {
            header: PluginHeader::new("Lookahead Limiter"),
            config,
            peak_buffer: [0.0; LOOKAHEAD_FRAMES],
            index: 0,
            cooldown: 0,
            sum: 1.0,
            slope: 0.0,
            min_amp: 1.0,
            min_amp_short: 1.0,
            channels: Vec::new(),
            meters_input: Meters::new(),
            meters_output: Meters::new(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &LookaheadLimiterConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: LookaheadLimiterConfig) {
        self.config = config;
    }

    /// Deepest gain envelope value since reset (1.0 = never attenuated).
    pub fn min_amp(&self) -> f32 {
        self.min_amp
    }

    fn ensure_channels(&mut self, channels: usize) {
        while self.channels.len() < channels {
            self.channels.push(ChannelState::new());
        }
    }
}

impl Default for LookaheadLimiter {
    fn default() -> Self {
        Self::new(LookaheadLimiterConfig::default())
    }
}

impl Plugin for LookaheadLimiter {
    fn header(&self) -> &PluginHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut PluginHeader {
        &mut self.header
    }

    fn specs(&self, _samplerate: u32) -> LatencySpec {
        LatencySpec {
            latency: LOOKAHEAD_FRAMES,
            leading: 0,
            trailing: 0,
        }
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

        let amount_input = db_to_amp(self.config.gain_input);
        let amount_output = db_to_amp(self.config.gain_output);
        if self.header.selected != 0 {
            self.meters_input.update(&buffer.as_view(), amount_input);
        }

        let frames = buffer.frames();
        let channels = buffer.channels();
        // Shared gain curve for the block, computed once and applied to
        // every channel.
        let mut gain_curve = SideBuffer::zeroed(frames, 0, 0, 1, buffer.samplerate());

        let mut index = self.index;
        for f in 0..frames {
            let mut frame_peak = 0.0_f32;
            for c in 0..channels {
                let amp = fabsf(buffer.sample(f as isize, c));
                if amp > frame_peak {
                    frame_peak = amp;
                }
            }
            let peak = (frame_peak * amount_input).max(1.0);
            self.peak_buffer[index] = peak;
            index = (index + 1) % LOOKAHEAD_FRAMES;

            // Slope that would land gain at 1/peak one window from now.
            let slope = (1.0 / peak - self.sum) / LOOKAHEAD_FRAMES as f32;
            if slope < self.slope {
                self.slope = slope;
                self.cooldown = LOOKAHEAD_FRAMES;
            } else if self.cooldown == 0 && self.sum < 1.0 {
                // Plan the way back up: default to a gentle recovery, but
                // yield to any future peak that needs a steeper descent.
                self.slope = (1.0 - self.sum) / (LOOKAHEAD_FRAMES as f32 * 5.0);
                for probe in 0..LOOKAHEAD_FRAMES {
                    let future_peak = self.peak_buffer[(index + probe) % LOOKAHEAD_FRAMES];
                    let probe_slope = (1.0 / future_peak - self.sum) / (probe + 1) as f32;
                    if probe_slope < self.slope {
                        self.slope = probe_slope;
                        self.cooldown = probe + 1;
                    }
                }
            } else if self.cooldown > 0 {
                self.cooldown -= 1;
            }

            self.sum += self.slope;
            self.min_amp_short = self.min_amp_short.min(self.sum);
            if self.sum > 1.0 {
                self.slope = 0.0;
                self.sum = 1.0;
            }
            gain_curve.body_mut()[f] = self.sum;
        }
        self.min_amp = self.min_amp.min(self.min_amp_short);

        // Apply the curve to every channel through the sample delay.
        let mut final_index = self.index;
        for c in 0..channels {
            let state = &mut self.channels[c];
            let mut index = self.index;
            for f in 0..frames {
                state.samples[index] = buffer.sample(f as isize, c);
                index = (index + 1) % LOOKAHEAD_FRAMES;
                let delayed = state.samples[index];
                let out =
                    (delayed * gain_curve.body()[f] * amount_input).clamp(-1.0, 1.0);
                buffer.set_sample(f as isize, c, out * amount_output);
            }
            final_index = index;
        }
        self.index = final_index;

        if self.header.selected != 0 {
            self.meters_output.update(&buffer.as_view(), 1.0);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.peak_buffer = [0.0; LOOKAHEAD_FRAMES];
        self.index = 0;
        self.cooldown = 0;
        self.sum = 1.0;
        self.slope = 0.0;
        self.min_amp = 1.0;
        self.min_amp_short = 1.0;
        for state in &mut self.channels {
            state.samples = [0.0; LOOKAHEAD_FRAMES];
        }
        self.meters_input.reset();
        self.meters_output.reset();
    }

    fn reset_channels(&mut self, first: usize, count: usize) {
        self.ensure_channels(first + count);
        for state in &mut self.channels[first..first + count] {
            state.samples = [0.0; LOOKAHEAD_FRAMES];
        }
        self.meters_input.reset_channels(first, count);
        self.meters_output.reset_channels(first, count);
    }
}
