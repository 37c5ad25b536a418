//! Spatializer: places source channels around a listener.
//!
//! Each active source channel carries a 3D position follower. Per block
//! the position glides toward its target, gets transformed into the
//! listener's frame by the configured [`World`], and drives:
//!
//! - **Panning**: cosine gains against each output channel's direction,
//!   with distance attenuation `1 / max(1, d)`.
//! - **Doppler** (optional): propagation delay `d / speed_of_sound`,
//!   realized with an embedded [`DelayDynamic`] whose per-block ramps are
//!   scheduled frame-accurately via `set_ramps` — motion toward the
//!   listener raises pitch exactly the way shrinking delay does.
//! - **Per-ear delays** (optional): each output channel's ear sits
//!   `ear_distance` along its direction, so delays differ slightly per
//!   output channel, giving interaural time differences.
//! - **Distance filtering** (optional): a one-pole low-pass whose cutoff
//!   falls with distance, mimicking air absorption.
//!
//! The listener context is part of the configuration; there is no
//! process-wide world.

use cadena_core::{
    BufferViewMut, LatencySpec, LinearFollower, LinearFollower3, Meters, Plugin, PluginHeader,
    ProcessFlags, Result, SideBuffer, Vec3, World, default_lanczos, ms_to_samples,
};
use libm::expf;

use crate::delay_dynamic::{DelayDynamic, DelayDynamicChannelConfig, DelayDynamicConfig};

/// Fallback maximum doppler delay when the config leaves it zero
/// (covers ~170 m of distance at 343 m/s).
const DEFAULT_DELAY_MAX_MS: f32 = 500.0;

/// Fallback ear offset: half the average human head width, in meters.
const DEFAULT_EAR_DISTANCE: f32 = 0.085;

/// Target placement of one source channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpatializeChannelConfig {
    /// World-space position target.
    pub position: Vec3,
    /// Source amplitude target (before distance attenuation).
    pub amplitude: f32,
}

/// Configuration for [`Spatialize`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpatializeConfig {
    /// Listener context.
    pub world: World,
    /// Simulate propagation delay (and therefore doppler shift).
    pub do_doppler: bool,
    /// Low-pass distant sources.
    pub do_filter: bool,
    /// Give each output channel its own ear delay.
    pub use_per_channel_delay: bool,
    /// How many source channels are active; 0 means all input channels.
    pub num_src_channels: usize,
    /// How long position/amplitude changes take to glide in, in ms.
    pub target_follow_time_ms: f32,
    /// Maximum doppler delay in ms; 0 picks a default.
    pub delay_max_ms: f32,
    /// Ear offset from the origin along each output direction, in world
    /// units; 0 picks a default.
    pub ear_distance: f32,
    /// Per-source-channel targets.
    pub channels: Vec<SpatializeChannelConfig>,
}

impl Default for SpatializeConfig {
    fn default() -> Self {
        Self {
            world: World::default(),
            do_doppler: false,
            do_filter: false,
            use_per_channel_delay: false,
            num_src_channels: 0,
            target_follow_time_ms: 50.0,
            delay_max_ms: 0.0,
            ear_distance: 0.0,
            channels: Vec::new(),
        }
    }
}

/// Runtime state for one source channel.
struct ChannelState {
    position: LinearFollower3,
    amplitude: LinearFollower,
    /// Doppler delay, one lane per output channel.
    delay: DelayDynamic,
    /// Previous block's per-output delay targets in ms.
    prev_delay_ms: Vec<f32>,
    /// One-pole filter state per output channel.
    filter: Vec<f32>,
}

/// Multi-source panner with doppler and distance filtering.
pub struct Spatialize {
    header: PluginHeader,
    config: SpatializeConfig,
    channels: Vec<ChannelState>,
    meters_input: Meters,
    meters_output: Meters,
}

impl Spatialize {
    /// Create with the given configuration.
    pub fn new(config: SpatializeConfig) -> Self {
        Self {
            header: PluginHeader::new("Spatialize"),
            config,
            channels: Vec::new(),
            meters_input: Meters::new(),
            meters_output: Meters::new(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &SpatializeConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: SpatializeConfig) {
        self.config = config;
    }

    /// Schedule per-channel ramps spanning exactly `frames`, from the
    /// `start` placements to the `end` placements, and mark that many
    /// source channels active. For driving the spatializer synchronously
    /// from another processor.
    pub fn set_ramps(
        &mut self,
        start: &[SpatializeChannelConfig],
        end: &[SpatializeChannelConfig],
        frames: usize,
        samplerate: u32,
    ) {
        let count = start.len().min(end.len());
        self.ensure_channels(count);
        if self.config.channels.len() < count {
            self.config
                .channels
                .resize(count, SpatializeChannelConfig::default());
        }
        self.config.num_src_channels = count;
        self.config.target_follow_time_ms = frames as f32 * 1000.0 / samplerate as f32;
        for c in 0..count {
            let state = &mut self.channels[c];
            state.position.jump(start[c].position);
            state.position.set_target(end[c].position);
            state.amplitude.jump(start[c].amplitude);
            state.amplitude.set_target(end[c].amplitude);
            self.config.channels[c] = end[c];
        }
    }

    fn delay_max_ms(&self) -> f32 {
        if self.config.delay_max_ms > 0.0 {
            self.config.delay_max_ms
        } else {
            DEFAULT_DELAY_MAX_MS
        }
    }

    fn ear_distance(&self) -> f32 {
        if self.config.ear_distance > 0.0 {
            self.config.ear_distance
        } else {
            DEFAULT_EAR_DISTANCE
        }
    }

    fn ensure_channels(&mut self, count: usize) {
        while self.channels.len() < count {
            let target = self
                .config
                .channels
                .get(self.channels.len())
                .copied()
                .unwrap_or_default();
            let mut position = LinearFollower3::default();
            position.jump(target.position);
            let mut amplitude = LinearFollower::default();
            amplitude.jump(target.amplitude);
            self.channels.push(ChannelState {
                position,
                amplitude,
                delay: DelayDynamic::new(DelayDynamicConfig {
                    gain_wet: 0.0,
                    gain_dry: f32::NEG_INFINITY,
                    delay_max_ms: self.delay_max_ms(),
                    delay_follow_time_ms: 0.0,
                    feedback: 0.0,
                    pingpong: 0.0,
                    kernel: None,
                    channels: Vec::new(),
                    mute_wet: false,
                    mute_dry: false,
                }),
                prev_delay_ms: Vec::new(),
                filter: Vec::new(),
            });
        }
    }

    /// Panning gain of one output direction for a source at `direction`
    /// (unit vector) and `distance`.
    fn pan_gain(source_direction: Vec3, distance: f32, out_direction: Vec3) -> f32 {
        if out_direction == Vec3::ZERO {
            // Omnidirectional output channel (LFE).
            return 1.0;
        }
        if distance < 0.5 {
            // Inside the head: collapse toward omni so a source crossing
            // the origin doesn't whip across the field.
            return 1.0;
        }
        0.5 + 0.5 * source_direction.dot(out_direction)
    }
}

impl Plugin for Spatialize {
    fn header(&self) -> &PluginHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut PluginHeader {
        &mut self.header
    }

    fn specs(&self, samplerate: u32) -> LatencySpec {
        if !self.config.do_doppler {
            return LatencySpec::ZERO;
        }
        // The embedded dynamic delays dominate; they all share one
        // configuration, so the parallel combination equals one of them.
        let max_samples = ms_to_samples(self.delay_max_ms(), samplerate as f32) as usize;
        LatencySpec {
            latency: 0,
            leading: max_samples + default_lanczos(4).sample_zero(),
            trailing: 0,
        }
    }

    fn process(&mut self, mut buffer: BufferViewMut<'_>, flags: ProcessFlags) -> Result<()> {
        if flags.contains(ProcessFlags::CUT) {
            self.reset();
        }
        if self.header.selected != 0 {
            self.meters_input.update(&buffer.as_view(), 1.0);
        }

        let out_channels = buffer.channels();
        let frames = buffer.frames();
        let samplerate = buffer.samplerate();
        let active = if self.config.num_src_channels == 0 {
            out_channels
        } else {
            self.config.num_src_channels.min(out_channels)
        };
        self.ensure_channels(active);

        let snapshot = SideBuffer::copy_of(&buffer.as_view());
        buffer.clear_body();

        let delta_t = if self.config.target_follow_time_ms > 0.0 {
            buffer.len_ms() / self.config.target_follow_time_ms
        } else {
            1.0
        };
        let world = self.config.world;
        let speed_of_sound = world.speed_of_sound.max(1.0);
        let ear_distance = self.ear_distance();
        let delay_max = self.delay_max_ms();
        let per_ear = self.config.use_per_channel_delay;
        let do_doppler = self.config.do_doppler;
        let do_filter = self.config.do_filter;
        let out_directions: Vec<Vec3> = buffer
            .layout()
            .positions()
            .iter()
            .map(|p| p.direction())
            .collect();

        for c in 0..active {
            let target = self
                .config
                .channels
                .get(c)
                .copied()
                .unwrap_or_default();
            let state = &mut self.channels[c];

            // Glide position and amplitude across the block.
            let start_world = state.position.update_target(target.position, delta_t);
            let end_world = state.position.value();
            let amplitude = state.amplitude.update_target(target.amplitude, delta_t);

            let start_local = world.transform_point(start_world);
            let end_local = world.transform_point(end_world);
            let end_distance = end_local.length();
            let source_direction = end_local.normalized();

            // Replicate the mono source across the output lanes; the
            // delay then shifts each lane by its ear's propagation time.
            let mut lanes = SideBuffer::zeroed(frames, 0, 0, out_channels, samplerate);
            for f in 0..frames {
                let sample = snapshot.view().sample(f as isize, c);
                for o in 0..out_channels {
                    lanes.body_mut()[f * out_channels + o] = sample;
                }
            }

            if do_doppler {
                if state.prev_delay_ms.len() != out_channels {
                    state.prev_delay_ms = vec![0.0; out_channels];
                    for (o, prev) in state.prev_delay_ms.iter_mut().enumerate() {
                        let ear = out_directions[o].scale(ear_distance);
                        let d = if per_ear {
                            start_local.sub(ear).length()
                        } else {
                            start_local.length()
                        };
                        *prev = d / speed_of_sound * 1000.0;
                    }
                }
                let starts = state.prev_delay_ms.clone();
                let mut ends = vec![0.0_f32; out_channels];
                for (o, end) in ends.iter_mut().enumerate() {
                    let ear = out_directions[o].scale(ear_distance);
                    let d = if per_ear {
                        end_local.sub(ear).length()
                    } else {
                        end_distance
                    };
                    *end = (d / speed_of_sound * 1000.0).min(delay_max);
                }
                state.delay.set_ramps(&starts, &ends, frames, samplerate);
                state.prev_delay_ms = ends;
                state.delay.process(lanes.view_mut(), flags)?;
            }

            if do_filter {
                // Air absorption: cutoff falls with distance.
                let cutoff = (20000.0 / (1.0 + end_distance * 0.05)).clamp(200.0, 20000.0);
                let coefficient =
                    1.0 - expf(-2.0 * core::f32::consts::PI * cutoff / samplerate as f32);
                if state.filter.len() != out_channels {
                    state.filter = vec![0.0; out_channels];
                }
                for f in 0..frames {
                    for o in 0..out_channels {
                        let s = &mut state.filter[o];
                        *s += coefficient * (lanes.body()[f * out_channels + o] - *s);
                        lanes.body_mut()[f * out_channels + o] = *s;
                    }
                }
            }

            let distance_amp = 1.0 / end_distance.max(1.0);
            for o in 0..out_channels {
                let gain = amplitude
                    * distance_amp
                    * Self::pan_gain(source_direction, end_distance, out_directions[o]);
                if gain == 0.0 {
                    continue;
                }
                for f in 0..frames {
                    let mixed =
                        buffer.sample(f as isize, o) + lanes.body()[f * out_channels + o] * gain;
                    buffer.set_sample(f as isize, o, mixed);
                }
            }
        }

        if self.header.selected != 0 {
            self.meters_output.update(&buffer.as_view(), 1.0);
        }
        Ok(())
    }

    fn reset(&mut self) {
        for (c, state) in self.channels.iter_mut().enumerate() {
            let target = self.config.channels.get(c).copied().unwrap_or_default();
            state.position.jump(target.position);
            state.amplitude.jump(target.amplitude);
            state.delay.reset();
            state.prev_delay_ms.clear();
            state.filter.fill(0.0);
        }
        self.meters_input.reset();
        self.meters_output.reset();
    }

    fn reset_channels(&mut self, first: usize, count: usize) {
        for state in self.channels.iter_mut().skip(first).take(count) {
            state.delay.reset();
            state.prev_delay_ms.clear();
            state.filter.fill(0.0);
        }
        self.meters_input.reset_channels(first, count);
        self.meters_output.reset_channels(first, count);
    }
}
