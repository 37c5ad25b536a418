//! Brick-wall FIR low-pass built on the windowed-sinc sampler.
//!
//! The cutoff is expressed as a kernel *rate*: sampling the Lanczos bank
//! at `rate = cutoff / nyquist` stretches the kernel so its own cutoff
//! lands at the requested frequency. The kernel radius is picked per
//! block from that rate (smaller tables for lower rates keep the tap
//! count bounded), and the rate itself is interpolated across the block
//! between the previous and current follower values so cutoff sweeps
//! don't pop.
//!
//! Linear phase costs symmetric context: the stage asks the chain for
//! `radius` leading and trailing frames and reports `radius` frames of
//! latency.

use cadena_core::{
    BufferViewMut, LatencySpec, LinearFollower, Meters, Plugin, PluginHeader, ProcessFlags,
    Result, SideBuffer, default_lanczos, lerp, radius_for_rate, sample_view_with_kernel,
};

/// Default bound on how many taps the kernel may take.
const DEFAULT_MAX_KERNEL_SAMPLES: usize = 27;

/// Configuration for [`LowPassFir`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPassFirConfig {
    /// Cutoff frequency in Hz.
    pub frequency: f32,
    /// How long a cutoff change takes to ramp in, in ms.
    pub frequency_follow_time_ms: f32,
    /// Upper bound on kernel taps (`2·radius + 1`); the working radius is
    /// derived from this and the current rate. Zero picks a default.
    pub max_kernel_samples: usize,
}

impl Default for LowPassFirConfig {
    fn default() -> Self {
        Self {
            frequency: 4000.0,
            frequency_follow_time_ms: 50.0,
            max_kernel_samples: DEFAULT_MAX_KERNEL_SAMPLES,
        }
    }
}

/// Windowed-sinc low-pass filter.
pub struct LowPassFir {
    header: PluginHeader,
    config: LowPassFirConfig,
    frequency: LinearFollower,
    meters_input: Meters,
    meters_output: Meters,
}

impl LowPassFir {
    /// Create with the given configuration.
    pub fn new(config: LowPassFirConfig) -> Self {
        let mut frequency = LinearFollower::default();
        frequency.jump(config.frequency);
        Self {
            header: PluginHeader::new("FIR Low Pass"),
            config,
            frequency,
            meters_input: Meters::new(),
            meters_output: Meters::new(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &LowPassFirConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: LowPassFirConfig) {
        self.config = config;
    }

    fn max_radius(&self) -> usize {
        let samples = if self.config.max_kernel_samples == 0 {
            DEFAULT_MAX_KERNEL_SAMPLES
        } else {
            self.config.max_kernel_samples
        };
        ((samples.saturating_sub(1)) / 2).clamp(1, cadena_core::LANCZOS_MAX_RADIUS)
    }
}

impl Default for LowPassFir {
    fn default() -> Self {
        Self::new(LowPassFirConfig::default())
    }
}

impl Plugin for LowPassFir {
    fn header(&self) -> &PluginHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut PluginHeader {
        &mut self.header
    }

    fn specs(&self, _samplerate: u32) -> LatencySpec {
        let radius = self.max_radius();
        LatencySpec {
            latency: radius,
            leading: radius,
            trailing: radius,
        }
    }

    fn process(&mut self, mut buffer: BufferViewMut<'_>, flags: ProcessFlags) -> Result<()> {
        if flags.contains(ProcessFlags::CUT) {
            self.reset();
        }
        if self.header.selected != 0 {
            self.meters_input.update(&buffer.as_view(), 1.0);
        }

        let nyquist = buffer.samplerate() as f32 * 0.5;
        let max_radius = self.max_radius();

        // Advance the cutoff follower by one block and capture the rate at
        // both ends so per-frame interpolation can bridge them.
        let delta_t = if self.config.frequency_follow_time_ms > 0.0 {
            buffer.len_ms() / self.config.frequency_follow_time_ms
        } else {
            1.0
        };
        let start_frequency = self
            .frequency
            .update_target(self.config.frequency, delta_t)
            .min(nyquist);
        let end_frequency = self.frequency.value().min(nyquist);
        let start_rate = (start_frequency / nyquist).min(1.0);
        let end_rate = (end_frequency / nyquist).min(1.0);

        // TODO: crossfade between kernels when the radius changes mid-sweep;
        // today the radius is fixed for the block from the starting rate.
        let kernel = default_lanczos(radius_for_rate(start_rate, max_radius));

        // The kernel would read frames this pass already wrote, so sample
        // from a snapshot.
        let snapshot = SideBuffer::copy_of(&buffer.as_view());
        let src = snapshot.view();
        let frames = buffer.frames();
        let channels = buffer.channels();
        let mut frame_out = [0.0_f32; cadena_core::MAX_CHANNELS];
        for f in 0..frames {
            let t = f as f32 / frames as f32;
            let rate = lerp(start_rate, end_rate, t);
            sample_view_with_kernel(
                &mut frame_out[..channels],
                kernel,
                &src,
                false,
                f as isize,
                0.0,
                rate,
            );
            for c in 0..channels {
                buffer.set_sample(f as isize, c, frame_out[c]);
            }
        }

        if self.header.selected != 0 {
            self.meters_output.update(&buffer.as_view(), 1.0);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.frequency.jump(self.config.frequency);
        self.meters_input.reset();
        self.meters_output.reset();
    }

    fn reset_channels(&mut self, first: usize, count: usize) {
        self.meters_input.reset_channels(first, count);
        self.meters_output.reset_channels(first, count);
    }
}
