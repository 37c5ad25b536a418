//! Algorithmic reverb: a bank of parallel feedback delays with per-line
//! damping.
//!
//! Thirty feedback delay lines with mutually-prime lengths fan out from a
//! common pre-delay. Each line carries a one-pole low-pass in its
//! feedback path, so high frequencies die faster than lows the way they
//! do in real rooms. `room_size` sets the decay time (feedback per line
//! derives from the line length against a −60 dB target), `color` sets
//! the damping cutoff.
//!
//! The delay lines own their storage and never read chain context, so
//! the reverb advertises no edge requirements.
//!
//! Reference: Schroeder, "Natural Sounding Artificial Reverberation",
//! JAES 1962 — parallel comb bank topology.

use cadena_core::{
    BufferViewMut, Meters, Plugin, PluginHeader, ProcessFlags, Result, SideBuffer, db_to_amp,
    ms_to_samples,
};
use libm::{expf, powf};

/// Number of parallel delay lines.
pub const REVERB_DELAY_COUNT: usize = 30;

/// Line delay times in ms at any sample rate; mutually prime-ish spread
/// over 25–92 ms to avoid coincident resonances.
const LINE_DELAYS_MS: [f32; REVERB_DELAY_COUNT] = [
    25.3, 27.1, 29.7, 31.9, 33.7, 35.3, 37.9, 39.1, 41.3, 43.7, 45.9, 47.3, 49.9, 51.1, 53.7,
    55.9, 57.3, 59.9, 61.1, 63.7, 67.3, 69.9, 71.1, 73.7, 77.3, 79.9, 83.1, 85.7, 89.3, 91.9,
];

/// Output normalization so thirty summed lines land near unity.
const LINE_MIX: f32 = 1.0 / REVERB_DELAY_COUNT as f32;

/// Configuration for [`Reverb`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbConfig {
    /// Wet gain in dB.
    pub gain_wet: f32,
    /// Dry gain in dB.
    pub gain_dry: f32,
    /// Mute the wet signal entirely.
    pub mute_wet: bool,
    /// Mute the dry signal entirely.
    pub mute_dry: bool,
    /// Decay control, roughly 1 to 100: the −60 dB decay time is
    /// `room_size × 100 ms`.
    pub room_size: f32,
    /// Damping control, roughly 1 to 5: the feedback low-pass cutoff is
    /// `color × 2 kHz`.
    pub color: f32,
    /// Pre-delay before the first reflections, in ms.
    pub delay_ms: f32,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            gain_wet: -9.0,
            gain_dry: 0.0,
            mute_wet: false,
            mute_dry: false,
            room_size: 10.0,
            color: 2.0,
            delay_ms: 20.0,
        }
    }
}

/// One channel of one delay line.
#[derive(Debug, Clone, Default)]
struct LineChannel {
    buffer: Vec<f32>,
    index: usize,
    /// One-pole damping state.
    lowpass: f32,
}

/// One feedback delay line across all channels.
#[derive(Debug, Clone, Default)]
struct Line {
    channels: Vec<LineChannel>,
    delay_samples: usize,
    feedback: f32,
}

/// Pre-delay ring per channel.
#[derive(Debug, Clone, Default)]
struct Predelay {
    buffer: Vec<f32>,
    index: usize,
}

/// Parallel-delay-bank reverb.
pub struct Reverb {
    header: PluginHeader,
    config: ReverbConfig,
    lines: [Line; REVERB_DELAY_COUNT],
    predelay: Vec<Predelay>,
    samplerate: u32,
    meters_input: Meters,
    meters_output: Meters,
}

impl Reverb {
    /// Create with the given configuration.
    pub fn new(config: ReverbConfig) -> Self {
        Self {
            header: PluginHeader::new("Reverb"),
            config,
            lines: core::array::from_fn(|_| Line::default()),
            predelay: Vec::new(),
            samplerate: 0,
            meters_input: Meters::new(),
            meters_output: Meters::new(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &ReverbConfig {
        &self.config
    }

    /// Replace the configuration. Line tunings adapt on the next block.
    pub fn set_config(&mut self, config: ReverbConfig) {
        self.config = config;
    }

    /// Retune line lengths and feedbacks for the current config.
    fn retune(&mut self, samplerate: u32, channels: usize) {
        self.samplerate = samplerate;
        // −60 dB after `room_size × 100 ms` of round trips.
        let decay_ms = (self.config.room_size.max(0.1)) * 100.0;
        for (line, &delay_ms) in self.lines.iter_mut().zip(&LINE_DELAYS_MS) {
            let samples = (ms_to_samples(delay_ms, samplerate as f32) as usize).max(1);
            line.delay_samples = samples;
            line.feedback = powf(10.0, -3.0 * delay_ms / decay_ms);
            while line.channels.len() < channels {
                line.channels.push(LineChannel::default());
            }
            for channel in &mut line.channels {
                if channel.buffer.len() != samples {
                    channel.buffer.clear();
                    channel.buffer.resize(samples, 0.0);
                    channel.index = 0;
                }
            }
        }
        let pre_samples =
            (ms_to_samples(self.config.delay_ms, samplerate as f32) as usize).max(1);
        while self.predelay.len() < channels {
            self.predelay.push(Predelay::default());
        }
        for pre in &mut self.predelay {
            if pre.buffer.len() != pre_samples {
                pre.buffer.clear();
                pre.buffer.resize(pre_samples, 0.0);
                pre.index = 0;
            }
        }
    }

    /// Damping coefficient for the feedback low-pass.
    fn damping_coefficient(&self, samplerate: f32) -> f32 {
        let cutoff = (self.config.color.max(0.1) * 2000.0).min(samplerate * 0.5);
        1.0 - expf(-2.0 * core::f32::consts::PI * cutoff / samplerate)
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new(ReverbConfig::default())
    }
}

impl Plugin for Reverb {
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
            self.retune(buffer.samplerate(), buffer.channels());
            self.reset_channels(first, count);
        }
        self.retune(buffer.samplerate(), buffer.channels());

        if self.header.selected != 0 {
            self.meters_input.update(&buffer.as_view(), 1.0);
        }

        let channels = buffer.channels();
        let frames = buffer.frames();
        let damping = self.damping_coefficient(buffer.samplerate() as f32);
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

        // The dry signal must survive the in-place wet writes.
        let dry = SideBuffer::copy_of(&buffer.as_view());

        for f in 0..frames {
            for c in 0..channels {
                // Pre-delay feeds every line the same slightly-late input.
                let pre = &mut self.predelay[c];
                let pre_len = pre.buffer.len();
                let input = dry.view().sample(f as isize, c);
                let fed = pre.buffer[pre.index];
                pre.buffer[pre.index] = input;
                pre.index = (pre.index + 1) % pre_len;

                let mut wet = 0.0_f32;
                for line in &mut self.lines {
                    let channel = &mut line.channels[c];
                    let delayed = channel.buffer[channel.index];
                    // Damp, then feed back.
                    channel.lowpass += damping * (delayed - channel.lowpass);
                    channel.buffer[channel.index] = fed + channel.lowpass * line.feedback;
                    channel.index = (channel.index + 1) % line.delay_samples;
                    wet += delayed;
                }
                wet *= LINE_MIX;
                buffer.set_sample(f as isize, c, wet * amount_wet + input * amount_dry);
            }
        }

        if self.header.selected != 0 {
            self.meters_output.update(&buffer.as_view(), 1.0);
        }
        Ok(())
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            for channel in &mut line.channels {
                channel.buffer.fill(0.0);
                channel.index = 0;
                channel.lowpass = 0.0;
            }
        }
        for pre in &mut self.predelay {
            pre.buffer.fill(0.0);
            pre.index = 0;
        }
        self.meters_input.reset();
        self.meters_output.reset();
    }

    fn reset_channels(&mut self, first: usize, count: usize) {
        for line in &mut self.lines {
            for channel in line.channels.iter_mut().skip(first).take(count) {
                channel.buffer.fill(0.0);
                channel.index = 0;
                channel.lowpass = 0.0;
            }
        }
        for pre in self.predelay.iter_mut().skip(first).take(count) {
            pre.buffer.fill(0.0);
            pre.index = 0;
        }
        self.meters_input.reset_channels(first, count);
        self.meters_output.reset_channels(first, count);
    }
}
