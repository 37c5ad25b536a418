//! Monitoring meters: windowed RMS plus peak accumulators.
//!
//! Plugins own a pair of these (input/output) and only update them while
//! their header's `selected` bitset is non-zero, so metering costs nothing
//! when no view is displaying the plugin. `peaks` holds the long-term
//! maximum until reset; `peaks_short_term` is cleared by the reader each
//! time it consumes a value.

use libm::fabsf;

use crate::buffer::BufferView;

/// Per-channel RMS and peak accumulators.
#[derive(Debug, Clone, Default)]
pub struct Meters {
    rms_squared_avg: Vec<f32>,
    peaks: Vec<f32>,
    peaks_short_term: Vec<f32>,
    rms_frames: u32,
}

impl Meters {
    /// Empty meters; channel storage grows on first update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Running mean of squared samples per channel.
    pub fn rms_squared_avg(&self) -> &[f32] {
        &self.rms_squared_avg
    }

    /// Long-term absolute peaks per channel.
    pub fn peaks(&self) -> &[f32] {
        &self.peaks
    }

    /// Short-term absolute peaks per channel; call
    /// [`take_short_term_peaks`](Self::take_short_term_peaks) to consume.
    pub fn peaks_short_term(&self) -> &[f32] {
        &self.peaks_short_term
    }

    /// Frames accumulated into the RMS average so far.
    pub fn rms_frames(&self) -> u32 {
        self.rms_frames
    }

    /// Read and clear the short-term peaks.
    pub fn take_short_term_peaks(&mut self) -> Vec<f32> {
        let result = self.peaks_short_term.clone();
        self.peaks_short_term.fill(0.0);
        result
    }

    /// Zero everything.
    pub fn reset(&mut self) {
        self.rms_squared_avg.fill(0.0);
        self.peaks.fill(0.0);
        self.peaks_short_term.fill(0.0);
        self.rms_frames = 0;
    }

    /// Zero the given channel range (used when channels appear).
    pub fn reset_channels(&mut self, first: usize, count: usize) {
        let end = (first + count).min(self.rms_squared_avg.len());
        for c in first..end {
            self.rms_squared_avg[c] = 0.0;
            self.peaks[c] = 0.0;
            self.peaks_short_term[c] = 0.0;
        }
    }

    /// Fold an entire buffer into the meters, with `input_amp` applied to
    /// every sample first (so input meters reflect the gain staging the
    /// plugin actually hears).
    pub fn update(&mut self, buffer: &BufferView<'_>, input_amp: f32) {
        let channels = buffer.channels();
        if self.rms_squared_avg.len() < channels {
            self.rms_squared_avg.resize(channels, 0.0);
            self.peaks.resize(channels, 0.0);
            self.peaks_short_term.resize(channels, 0.0);
        }
        let frames = buffer.frames() as u32;
        if frames == 0 {
            return;
        }
        let total = self.rms_frames + frames;
        for c in 0..channels {
            let mut squared_sum = 0.0_f32;
            let mut peak = 0.0_f32;
            for f in 0..buffer.frames() {
                let sample = buffer.sample(f as isize, c) * input_amp;
                squared_sum += sample * sample;
                let amp = fabsf(sample);
                if amp > peak {
                    peak = amp;
                }
            }
            // Running mean weighted by how many frames each side counted.
            let old = self.rms_squared_avg[c];
            self.rms_squared_avg[c] =
                (old * self.rms_frames as f32 + squared_sum) / total as f32;
            if peak > self.peaks[c] {
                self.peaks[c] = peak;
            }
            if peak > self.peaks_short_term[c] {
                self.peaks_short_term[c] = peak;
            }
        }
        self.rms_frames = total;
    }
}
