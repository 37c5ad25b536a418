//! Time-varying delay with sub-sample kernel reads.
//!
//! Where the static [`Delay`](crate::Delay) snaps its tap to whole
//! samples, this one reads its ring at a fractional position through the
//! Lanczos kernel, so the delay time can glide without zipper noise. A
//! linear follower per channel moves the delay toward its target over
//! `delay_follow_time_ms`; while the delay is shrinking the read head
//! travels faster than real time, so the kernel rate drops below 1 to
//! act as the anti-aliasing low-pass, and the rate itself is interpolated
//! from the previous block's value to avoid popping at block boundaries.
//!
//! Wet path layout follows the static delay: `input + feedback × delayed`
//! with ping-pong cross-routing and an optional effects chain on the
//! signal entering the ring.

use cadena_core::{
    BufferViewMut, Chain, Kernel, LatencySpec, LinearFollower, Meters, Plugin, PluginHeader,
    ProcessFlags, Result, SideBuffer, db_to_amp, default_lanczos, ms_to_samples,
    sample_with_kernel,
};
use libm::floorf;

/// Bank radius used when the config supplies no kernel.
const DEFAULT_KERNEL_RADIUS: usize = 4;

/// Per-channel delay target.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DelayDynamicChannelConfig {
    /// Target delay in ms for this channel's follower.
    pub delay_ms: f32,
}

/// Configuration for [`DelayDynamic`].
#[derive(Debug, Clone, PartialEq)]
pub struct DelayDynamicConfig {
    /// Wet gain in dB.
    pub gain_wet: f32,
    /// Dry gain in dB.
    pub gain_dry: f32,
    /// Mute the wet signal entirely.
    pub mute_wet: bool,
    /// Mute the dry signal entirely.
    pub mute_dry: bool,
    /// Largest reachable delay in ms; raising it grows the rings (new
    /// space reads as silence).
    pub delay_max_ms: f32,
    /// How long the follower takes to reach a new target, in ms.
    pub delay_follow_time_ms: f32,
    /// Fraction of the output fed back into the input, 0 to 1.
    pub feedback: f32,
    /// How much of each channel's wet signal routes into the next
    /// channel, 0 to 1.
    pub pingpong: f32,
    /// Resampling kernel; `None` uses the shared Lanczos bank.
    pub kernel: Option<&'static Kernel>,
    /// Per-channel delay targets.
    pub channels: Vec<DelayDynamicChannelConfig>,
}

impl Default for DelayDynamicConfig {
    fn default() -> Self {
        Self {
            gain_wet: -6.0,
            gain_dry: 0.0,
            mute_wet: false,
            mute_dry: false,
            delay_max_ms: 1000.0,
            delay_follow_time_ms: 100.0,
            feedback: 0.0,
            pingpong: 0.0,
            kernel: None,
            channels: Vec::new(),
        }
    }
}

/// Per-channel ring and follower state.
#[derive(Debug, Clone, Default)]
struct ChannelState {
    buffer: Vec<f32>,
    write_index: usize,
    delay_ms: LinearFollower,
    /// Kernel rate used at the end of the previous block, lerped toward
    /// the current rate across each block to avoid pops.
    rate_previous: f32,
}

/// Follower-driven fractional delay.
pub struct DelayDynamic {
    header: PluginHeader,
    config: DelayDynamicConfig,
    channels: Vec<ChannelState>,
    input_effects: Option<Chain>,
    meters_input: Meters,
    meters_output: Meters,
}

impl DelayDynamic {
    /// Create with the given configuration.
    pub fn new(config: DelayDynamicConfig) -> Self {
        Self {
            header: PluginHeader::new("Dynamic Delay"),
            config,
            channels: Vec::new(),
            input_effects: None,
            meters_input: Meters::new(),
            meters_output: Meters::new(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &DelayDynamicConfig {
        &self.config
    }

    /// Replace the configuration. Rings adapt on the next block.
    pub fn set_config(&mut self, config: DelayDynamicConfig) {
        self.config = config;
    }

    /// Install (or clear) the wet-path effects chain.
    pub fn set_input_effects(&mut self, chain: Option<Chain>) {
        self.input_effects = chain;
    }

    /// Schedule per-channel ramps that span exactly `frames` at
    /// `samplerate`, from `start_delay_ms[c]` to `end_delay_ms[c]`.
    ///
    /// Useful when this delay is driven frame-accurately from another
    /// processor (the spatializer uses this for doppler).
    pub fn set_ramps(
        &mut self,
        start_delay_ms: &[f32],
        end_delay_ms: &[f32],
        frames: usize,
        samplerate: u32,
    ) {
        let count = start_delay_ms.len().min(end_delay_ms.len());
        self.ensure_channels(count);
        if self.config.channels.len() < count {
            self.config
                .channels
                .resize(count, DelayDynamicChannelConfig::default());
        }
        self.config.delay_follow_time_ms = frames as f32 * 1000.0 / samplerate as f32;
        for c in 0..count {
            self.channels[c]
                .delay_ms
                .ramp(start_delay_ms[c], end_delay_ms[c]);
            self.config.channels[c].delay_ms = end_delay_ms[c];
        }
    }

    fn kernel(&self) -> &'static Kernel {
        self.config
            .kernel
            .unwrap_or_else(|| default_lanczos(DEFAULT_KERNEL_RADIUS))
    }

    fn ensure_channels(&mut self, channels: usize) {
        while self.channels.len() < channels {
            let target = self
                .config
                .channels
                .get(self.channels.len())
                .map_or(0.0, |channel| channel.delay_ms);
            let mut delay_ms = LinearFollower::default();
            delay_ms.jump(target);
            self.channels.push(ChannelState {
                delay_ms,
                rate_previous: 1.0,
                ..ChannelState::default()
            });
        }
    }

    /// Ring length needed for the configured maximum delay: the delay
    /// itself plus the kernel's reach past the read point.
    fn ring_len(&self, samplerate: u32) -> usize {
        let max_samples = ms_to_samples(self.config.delay_max_ms, samplerate as f32) as usize;
        max_samples + self.kernel().length() + 1
    }
}

impl Default for DelayDynamic {
    fn default() -> Self {
        Self::new(DelayDynamicConfig::default())
    }
}

impl Plugin for DelayDynamic {
    fn header(&self) -> &PluginHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut PluginHeader {
        &mut self.header
    }

    fn specs(&self, samplerate: u32) -> LatencySpec {
        let max_samples = ms_to_samples(self.config.delay_max_ms, samplerate as f32) as usize;
        LatencySpec {
            latency: 0,
            leading: max_samples + self.kernel().sample_zero(),
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

        let channels = buffer.channels();
        let frames = buffer.frames();
        let samplerate = buffer.samplerate();
        let ring_len = self.ring_len(samplerate);
        for state in &mut self.channels[..channels] {
            if state.buffer.len() < ring_len {
                // Growth fills new space with silence; the write head keeps
                // its slot.
                state.buffer.resize(ring_len, 0.0);
            }
        }

        if self.header.selected != 0 {
            self.meters_input.update(&buffer.as_view(), 1.0);
        }

        let kernel = self.kernel();
        let frame_ms = 1000.0 / samplerate as f32;
        let delta_t = if self.config.delay_follow_time_ms > 0.0 {
            frame_ms / self.config.delay_follow_time_ms
        } else {
            1.0
        };
        let max_delay_ms = self.config.delay_max_ms;

        // Phase 1: advance the followers, capture the per-frame tap
        // positions and kernel rates, and build the ring input. The
        // feedback tap reads committed ring content, so feedback resolves
        // at block granularity (matching the static delay).
        let mut taps = SideBuffer::zeroed(frames, 0, 0, channels, samplerate);
        let mut rates = SideBuffer::zeroed(frames, 0, 0, channels, samplerate);
        let mut to_ring = SideBuffer::zeroed(frames, 0, 0, channels, samplerate);
        for c in 0..channels {
            let target_ms = self
                .config
                .channels
                .get(c)
                .map_or(0.0, |channel| channel.delay_ms)
                .clamp(0.0, max_delay_ms);
            let state = &mut self.channels[c];
            let len = state.buffer.len();

            // Kernel rate for this block: reading faster than real time
            // (shrinking delay) needs a lowered kernel cutoff.
            state.delay_ms.set_target(target_ms);
            let delay_slope_samples =
                ms_to_samples(state.delay_ms.derivative(delta_t), samplerate as f32);
            let speed = (1.0 - delay_slope_samples).max(0.1);
            let rate_current = (1.0 / speed).min(1.0);
            let rate_start = state.rate_previous;
            state.rate_previous = rate_current;

            let mut write_index = state.write_index;
            let mut out = [0.0_f32];
            for f in 0..frames {
                let delay_ms_now = state.delay_ms.update(delta_t).clamp(0.0, max_delay_ms);
                let delay_samples = ms_to_samples(delay_ms_now, samplerate as f32);
                let t = f as f32 / frames as f32;
                let rate = rate_start + (rate_current - rate_start) * t;
                taps.body_mut()[f * channels + c] = delay_samples;
                rates.body_mut()[f * channels + c] = rate;

                let mut to_add = buffer.sample(f as isize, c);
                if self.config.feedback != 0.0 {
                    let read_pos = write_index as f32 - delay_samples;
                    let read_frame = floorf(read_pos);
                    sample_with_kernel(
                        &mut out,
                        kernel,
                        &state.buffer,
                        1,
                        0,
                        len as isize,
                        true,
                        read_frame as isize,
                        read_pos - read_frame,
                        rate,
                    );
                    to_add += out[0] * self.config.feedback;
                }
                let cross = (c + 1) % channels;
                let body = to_ring.body_mut();
                body[f * channels + c] += to_add * (1.0 - self.config.pingpong);
                body[f * channels + cross] += to_add * self.config.pingpong;
                write_index = (write_index + 1) % len;
            }
        }

        if let Some(effects) = self.input_effects.as_mut() {
            effects.process_in_place(&mut to_ring, flags)?;
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

        // Phase 2: commit each frame to the ring, then read the delayed
        // tap — interleaved so taps shorter than the block still land on
        // samples written this block.
        for c in 0..channels {
            let state = &mut self.channels[c];
            let len = state.buffer.len();
            let mut out = [0.0_f32];
            for f in 0..frames {
                state.buffer[state.write_index] = to_ring.body()[f * channels + c];
                let read_pos = state.write_index as f32 - taps.body()[f * channels + c];
                let read_frame = floorf(read_pos);
                sample_with_kernel(
                    &mut out,
                    kernel,
                    &state.buffer,
                    1,
                    0,
                    len as isize,
                    true,
                    read_frame as isize,
                    read_pos - read_frame,
                    rates.body()[f * channels + c],
                );
                state.write_index = (state.write_index + 1) % len;
                let dry = buffer.sample(f as isize, c);
                buffer.set_sample(
                    f as isize,
                    c,
                    out[0] * amount_wet + dry * amount_dry,
                );
            }
        }

        if self.header.selected != 0 {
            self.meters_output.update(&buffer.as_view(), 1.0);
        }
        Ok(())
    }

    fn reset(&mut self) {
        for (c, state) in self.channels.iter_mut().enumerate() {
            state.buffer.fill(0.0);
            state.write_index = 0;
            state
                .delay_ms
                .jump(self.config.channels.get(c).map_or(0.0, |ch| ch.delay_ms));
            state.rate_previous = 1.0;
        }
        self.meters_input.reset();
        self.meters_output.reset();
    }

    fn reset_channels(&mut self, first: usize, count: usize) {
        self.ensure_channels(first + count);
        for (c, state) in self
            .channels
            .iter_mut()
            .enumerate()
            .skip(first)
            .take(count)
        {
            state.buffer.fill(0.0);
            state.write_index = 0;
            state
                .delay_ms
                .jump(self.config.channels.get(c).map_or(0.0, |ch| ch.delay_ms));
            state.rate_previous = 1.0;
        }
        self.meters_input.reset_channels(first, count);
        self.meters_output.reset_channels(first, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadena_core::{Buffer, ChannelLayout};

    fn wet_only(delay_ms: f32) -> DelayDynamic {
        DelayDynamic::new(DelayDynamicConfig {
            gain_wet: 0.0,
            gain_dry: f32::NEG_INFINITY,
            delay_max_ms: 50.0,
            delay_follow_time_ms: 0.0,
            channels: vec![DelayDynamicChannelConfig { delay_ms }],
            ..DelayDynamicConfig::default()
        })
    }

    #[test]
    fn integer_delay_reproduces_the_impulse() {
        let mut delay = wet_only(1.0); // 48 samples at 48 kHz
        let mut block = Buffer::new(512, 0, 0, ChannelLayout::mono(), 48000);
        block.body_mut()[0] = 1.0;
        delay
            .process(block.view_mut(), ProcessFlags::NONE)
            .unwrap();
        let body = block.body();
        let peak_at = body
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .unwrap()
            .0;
        assert_eq!(peak_at, 48, "echo lands at the configured delay");
        assert!((body[48] - 1.0).abs() < 1e-3, "got {}", body[48]);
    }

    #[test]
    fn fractional_delay_interpolates() {
        // Delay of 10.5 samples: the impulse energy splits around frames
        // 10 and 11 with a windowed-sinc shape, summing to ~1.
        let delay_ms = 10.5 * 1000.0 / 48000.0;
        let mut delay = wet_only(delay_ms);
        let mut block = Buffer::new(128, 0, 0, ChannelLayout::mono(), 48000);
        block.body_mut()[0] = 1.0;
        delay
            .process(block.view_mut(), ProcessFlags::NONE)
            .unwrap();
        let body = block.body();
        assert!(body[10].abs() > 0.3 && body[11].abs() > 0.3);
        let energy: f32 = body.iter().sum();
        assert!((energy - 1.0).abs() < 0.05, "echo energy {energy}");
    }

    #[test]
    fn delay_glides_to_new_target() {
        let mut delay = DelayDynamic::new(DelayDynamicConfig {
            gain_wet: 0.0,
            gain_dry: f32::NEG_INFINITY,
            delay_max_ms: 50.0,
            delay_follow_time_ms: 5.0,
            channels: vec![DelayDynamicChannelConfig { delay_ms: 1.0 }],
            ..DelayDynamicConfig::default()
        });
        // Settle at 1 ms with a steady tone, then retarget to 2 ms and
        // verify the delay actually moved (the echo of a late impulse
        // arrives ~96 frames after it).
        let mut warm = Buffer::new(4096, 0, 0, ChannelLayout::mono(), 48000);
        delay.process(warm.view_mut(), ProcessFlags::NONE).unwrap();

        let mut config = delay.config().clone();
        config.channels[0].delay_ms = 2.0;
        delay.set_config(config);
        // Let the follower finish gliding.
        let mut glide = Buffer::new(4096, 0, 0, ChannelLayout::mono(), 48000);
        delay.process(glide.view_mut(), ProcessFlags::NONE).unwrap();

        let mut block = Buffer::new(512, 0, 0, ChannelLayout::mono(), 48000);
        block.body_mut()[0] = 1.0;
        delay
            .process(block.view_mut(), ProcessFlags::NONE)
            .unwrap();
        let body = block.body();
        let peak_at = body
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .unwrap()
            .0;
        assert_eq!(peak_at, 96, "echo follows the new 2 ms target");
    }

    #[test]
    fn specs_cover_the_maximum_delay() {
        let delay = DelayDynamic::new(DelayDynamicConfig {
            delay_max_ms: 100.0,
            ..DelayDynamicConfig::default()
        });
        let spec = delay.specs(48000);
        assert_eq!(spec.latency, 0);
        assert_eq!(
            spec.leading,
            4800 + delay.kernel().sample_zero(),
            "leading must reach the oldest tap plus kernel radius"
        );
    }

    #[test]
    fn cut_silences_pending_echoes() {
        let mut delay = wet_only(1.0);
        let mut block = Buffer::new(16, 0, 0, ChannelLayout::mono(), 48000);
        block.body_mut()[0] = 1.0;
        delay
            .process(block.view_mut(), ProcessFlags::NONE)
            .unwrap();
        let mut next = Buffer::new(256, 0, 0, ChannelLayout::mono(), 48000);
        delay.process(next.view_mut(), ProcessFlags::CUT).unwrap();
        assert!(next.body().iter().all(|&s| s.abs() < 1e-6));
    }

    #[test]
    fn set_ramps_spans_exactly_one_block() {
        let mut delay = DelayDynamic::default();
        delay.set_ramps(&[0.0], &[10.0], 480, 48000);
        assert!((delay.config().delay_follow_time_ms - 10.0).abs() < 1e-4);
        assert_eq!(delay.config().channels[0].delay_ms, 10.0);
    }
}
