//! Windowed RMS measurement.
//!
//! [`RmsWindow`] is the sidechain component shared by the compressor and
//! gate: a running sum of squares over a fixed window per channel, with
//! the per-frame channel values combined into one value (maximum by
//! default, so the loudest channel drives linked dynamics). [`Rms`] wraps
//! it as a monitoring plugin that passes audio through untouched.

use cadena_core::{
    BufferView, BufferViewMut, Meters, Plugin, PluginHeader, ProcessFlags, Result, SideBuffer,
};
use libm::sqrtf;

/// How per-channel RMS values fold into one sidechain value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombineOp {
    /// Loudest channel wins (linked dynamics).
    #[default]
    Max,
    /// Channels sum (energy of the mix).
    Add,
}

impl CombineOp {
    #[inline]
    fn apply(self, lhs: &mut f32, rhs: f32) {
        match self {
            CombineOp::Max => {
                if rhs > *lhs {
                    *lhs = rhs;
                }
            }
            CombineOp::Add => *lhs += rhs,
        }
    }
}

/// Running RMS over a fixed sample window, per channel.
#[derive(Debug, Clone)]
pub struct RmsWindow {
    window: usize,
    combine: CombineOp,
    /// Squared-sample history, one window per channel, interleaved by
    /// channel-major blocks.
    buffer: Vec<f32>,
    index: usize,
    squared_sums: Vec<f32>,
}

impl RmsWindow {
    /// A window of `window` samples (clamped to at least 1).
    pub fn new(window: usize, combine: CombineOp) -> Self {
        Self {
            window: window.max(1),
            combine,
            buffer: Vec::new(),
            index: 0,
            squared_sums: Vec::new(),
        }
    }

    /// Window length in samples.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Zero all history.
    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.squared_sums.fill(0.0);
        self.index = 0;
    }

    /// Zero history for the given channel range.
    pub fn reset_channels(&mut self, first: usize, count: usize) {
        let end = (first + count).min(self.squared_sums.len());
        for c in first..end {
            self.squared_sums[c] = 0.0;
            self.buffer[c * self.window..(c + 1) * self.window].fill(0.0);
        }
    }

    fn ensure_channels(&mut self, channels: usize) {
        if self.squared_sums.len() < channels {
            self.squared_sums.resize(channels, 0.0);
            self.buffer.resize(channels * self.window, 0.0);
        }
    }

    /// Write one combined RMS value per frame of `src` into `dst`
    /// (`dst.len() == src.frames()`).
    pub fn process_into(&mut self, dst: &mut [f32], src: &BufferView<'_>) {
        debug_assert_eq!(dst.len(), src.frames());
        let channels = src.channels();
        self.ensure_channels(channels);
        let window = self.window;
        for (f, out) in dst.iter_mut().enumerate() {
            let mut combined = 0.0_f32;
            for c in 0..channels {
                let sample = src.sample(f as isize, c);
                let squared = sample * sample;
                let slot = c * window + self.index;
                // Running sum: add the newcomer, retire the oldest. Clamp
                // at zero since floating-point cancellation can drift the
                // sum slightly negative on long silences.
                self.squared_sums[c] = (self.squared_sums[c] + squared - self.buffer[slot]).max(0.0);
                self.buffer[slot] = squared;
                let rms = sqrtf(self.squared_sums[c] / window as f32);
                self.combine.apply(&mut combined, rms);
            }
            self.index = (self.index + 1) % window;
            *out = combined;
        }
    }
}

/// Pass-through RMS monitor plugin.
#[derive(Debug)]
pub struct Rms {
    header: PluginHeader,
    window: RmsWindow,
    meters: Meters,
    /// Most recent combined RMS value, for UI polling.
    current: f32,
}

impl Rms {
    /// Monitor with the given window length in samples.
    pub fn new(window_samples: usize) -> Self {
        Self {
            header: PluginHeader::new("RMS"),
            window: RmsWindow::new(window_samples, CombineOp::Max),
            meters: Meters::new(),
            current: 0.0,
        }
    }

    /// The latest combined RMS value.
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Meters (updated while selected).
    pub fn meters(&self) -> &Meters {
        &self.meters
    }
}

impl Default for Rms {
    fn default() -> Self {
        Self::new(128)
    }
}

impl Plugin for Rms {
    fn header(&self) -> &PluginHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut PluginHeader {
        &mut self.header
    }

    fn process(&mut self, buffer: BufferViewMut<'_>, flags: ProcessFlags) -> Result<()> {
        if flags.contains(ProcessFlags::CUT) {
            self.reset();
        }
        if let Some((first, count)) = self.header.track_channels(buffer.channels()) {
            self.reset_channels(first, count);
        }
        let mut values = SideBuffer::zeroed(buffer.frames(), 0, 0, 1, buffer.samplerate());
        self.window
            .process_into(values.body_mut(), &buffer.as_view());
        self.current = values.body().last().copied().unwrap_or(0.0);
        if self.header.selected != 0 {
            self.meters.update(&buffer.as_view(), 1.0);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.window.reset();
        self.meters.reset();
        self.current = 0.0;
    }

    fn reset_channels(&mut self, first: usize, count: usize) {
        self.window.reset_channels(first, count);
        self.meters.reset_channels(first, count);
    }
}
