//! Cubic soft limiter.
//!
//! Per-sample transfer `1.5x − 0.5x³` after a hard clamp to ±1. The cubic
//! has unity value and zero slope at ±1, so clipping onsets are rounded
//! rather than creased. Its slope at zero is 1.5 (+3.52 dB), which would
//! make the "neutral" setting louder than bypass; the input gain is
//! pre-compensated by that amount so 0 dB in equals 0 dB perceived.

use cadena_core::{
    BufferViewMut, Meters, Plugin, PluginHeader, ProcessFlags, Result, db_to_amp,
};

/// Gain implied by the transfer's slope at zero: `20·log10(1.5)`.
const SLOPE_AT_ZERO_DB: f32 = 3.5218251811136247;

/// The cubic transfer with input clamp.
#[inline]
fn cubic_transfer(sample: f32) -> f32 {
    let x = sample.clamp(-1.0, 1.0);
    1.5 * x - 0.5 * x * x * x
}

/// Configuration for [`CubicLimiter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicLimiterConfig {
    /// Input gain in dB (drives the signal into the cubic).
    pub gain_input: f32,
    /// Output gain in dB.
    pub gain_output: f32,
    /// When set, the output gain mirrors the input gain (`output =
    /// −input`) so drive changes keep the perceived level constant.
    pub link_gain: bool,
}

impl Default for CubicLimiterConfig {
    fn default() -> Self {
        Self {
            gain_input: 0.0,
            gain_output: 0.0,
            link_gain: false,
        }
    }
}

/// Stateless cubic soft limiter.
#[derive(Debug)]
pub struct CubicLimiter {
    header: PluginHeader,
    config: CubicLimiterConfig,
    meters_input: Meters,
    meters_output: Meters,
}

impl CubicLimiter {
    /// Create with the given configuration.
    pub fn new(config: CubicLimiterConfig) -> Self {
        Self {
            header: PluginHeader::new("Cubic Limiter"),
            config,
            meters_input: Meters::new(),
            meters_output: Meters::new(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &CubicLimiterConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: CubicLimiterConfig) {
        self.config = config;
    }

    /// Input meters (updated while selected).
    pub fn meters_input(&self) -> &Meters {
        &self.meters_input
    }

    /// Output meters (updated while selected).
    pub fn meters_output(&self) -> &Meters {
        &self.meters_output
    }
}

impl Default for CubicLimiter {
    fn default() -> Self {
        Self::new(CubicLimiterConfig::default())
    }
}

impl Plugin for CubicLimiter {
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
        let amount_input = db_to_amp(self.config.gain_input - SLOPE_AT_ZERO_DB);
        let gain_output = if self.config.link_gain {
            -self.config.gain_input
        } else {
            self.config.gain_output
        };
        let amount_output = db_to_amp(gain_output);

        if self.header.selected != 0 {
            self.meters_input.update(&buffer.as_view(), amount_input);
        }
        for f in 0..buffer.frames() as isize {
            for c in 0..buffer.channels() {
                let sample = buffer.sample(f, c);
                buffer.set_sample(f, c, amount_output * cubic_transfer(amount_input * sample));
            }
        }
        if self.header.selected != 0 {
            self.meters_output.update(&buffer.as_view(), 1.0);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.meters_input.reset();
        self.meters_output.reset();
    }

    fn reset_channels(&mut self, first: usize, count: usize) {
        self.meters_input.reset_channels(first, count);
        self.meters_output.reset_channels(first, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadena_core::{Buffer, ChannelLayout};

    #[test]
    fn transfer_endpoints() {
        assert_eq!(cubic_transfer(1.0), 1.0);
        assert_eq!(cubic_transfer(-1.0), -1.0);
        assert_eq!(cubic_transfer(0.0), 0.0);
        // Out-of-range input clamps before the cubic.
        assert_eq!(cubic_transfer(1.5), 1.0);
        assert_eq!(cubic_transfer(-1.5), -1.0);
    }

    #[test]
    fn ramp_through_zero_gain() {
        // With both gains at 0 dB the pre-gain cancels the slope-at-zero
        // headroom; extreme samples saturate at exactly ±1.
        let mut limiter = CubicLimiter::default();
        let mut buffer = Buffer::new(5, 0, 0, ChannelLayout::mono(), 48000);
        buffer
            .body_mut()
            .copy_from_slice(&[-1.5, -1.0, 0.0, 1.0, 1.5]);
        limiter
            .process(buffer.view_mut(), ProcessFlags::NONE)
            .unwrap();
        let body = buffer.body();
        assert!((body[0] + 1.0).abs() < 1e-4, "got {}", body[0]);
        assert!((body[2]).abs() < 1e-6);
        assert!((body[4] - 1.0).abs() < 1e-4, "got {}", body[4]);
        // ±1.0 input lands below ±1 because of the −3.52 dB pre-gain.
        assert!(body[1] > -1.0 && body[1] < 0.0);
        assert!(body[3] < 1.0 && body[3] > 0.0);
    }

    #[test]
    fn output_never_exceeds_unity() {
        let mut limiter = CubicLimiter::new(CubicLimiterConfig {
            gain_input: 24.0,
            ..CubicLimiterConfig::default()
        });
        let mut buffer = Buffer::new(64, 0, 0, ChannelLayout::stereo(), 48000);
        for (i, sample) in buffer.body_mut().iter_mut().enumerate() {
            *sample = (i as f32 * 0.37).sin() * 4.0;
        }
        limiter
            .process(buffer.view_mut(), ProcessFlags::NONE)
            .unwrap();
        assert!(buffer.body().iter().all(|s| s.abs() <= 1.0 + 1e-6));
    }

    #[test]
    fn link_gain_mirrors_input() {
        let mut limiter = CubicLimiter::new(CubicLimiterConfig {
            gain_input: 12.0,
            gain_output: 0.0,
            link_gain: true,
        });
        let mut buffer = Buffer::new(4, 0, 0, ChannelLayout::mono(), 48000);
        buffer.body_mut().fill(0.01);
        limiter
            .process(buffer.view_mut(), ProcessFlags::NONE)
            .unwrap();
        // Small signals: +12 in, −12 out, cubic ~linear → ≈ unity overall.
        for &s in buffer.body() {
            assert!((s - 0.01).abs() < 0.002, "got {s}");
        }
    }
}
