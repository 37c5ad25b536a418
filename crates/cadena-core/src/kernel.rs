//! Windowed-sinc sampling kernels with packed sub-sample tables.
//!
//! A [`Kernel`] is a discrete convolution kernel sampled at `scale`
//! sub-sample positions between adjacent taps. Two layouts coexist:
//!
//! - `table`: natural order, `length × scale` values — author into this,
//!   then call [`Kernel::pack`].
//! - `packed`: indexed `[subsample][tap]` with one extra row duplicating
//!   subsample 0 shifted by one tap, so rate-1 sampling reads two adjacent
//!   rows contiguously and interpolates between them without branching.
//!
//! [`sample_with_kernel`] produces one output frame across interleaved
//! channels. Its `rate` argument stretches the kernel in time: `rate = 1`
//! is plain interpolation, `rate < 1` lowers the kernel's cutoff (an
//! anti-aliasing low-pass for downsampling or fast delay-line reads) at a
//! cost of roughly `length / rate` taps. Rates above 1 are clamped.
//!
//! A process-wide bank of Lanczos kernels (one per integer radius, built on
//! first use) backs the dynamic delay, FIR low-pass, sampler and
//! spatializer; [`radius_for_rate`] picks the smallest table that still
//! covers the requested rate so the tap count stays bounded.

use std::sync::OnceLock;

use libm::{floorf, sinf};

use crate::buffer::BufferView;
use crate::math::lerp;

/// Largest radius available from the default Lanczos bank.
pub const LANCZOS_MAX_RADIUS: usize = 128;

/// Sub-samples per tap for the default Lanczos bank.
const LANCZOS_RESOLUTION: usize = 128;

/// A sampling kernel with natural and packed sub-sample layouts.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    length: usize,
    sample_zero: usize,
    scale: usize,
    table: Vec<f32>,
    packed: Vec<f32>,
}

impl Kernel {
    /// Create a blank kernel.
    ///
    /// `length` taps, with tap `sample_zero` representing time offset zero,
    /// and `scale` sub-samples between adjacent taps. Author the response
    /// into [`table_mut`](Self::table_mut), then call [`pack`](Self::pack)
    /// before sampling.
    pub fn new(length: usize, sample_zero: usize, scale: usize) -> Self {
        assert!(length > 0 && scale > 0, "kernel must have extent");
        assert!(sample_zero < length, "sample_zero must lie within length");
        Self {
            length,
            sample_zero,
            scale,
            table: vec![0.0; length * scale],
            packed: vec![0.0; length * (scale + 1)],
        }
    }

    /// Build a Lanczos kernel: `sinc(t)·sinc(t/radius)` for `|t| < radius`.
    ///
    /// `resolution` is the number of sub-samples between zero crossings.
    /// The result is already packed.
    pub fn lanczos(resolution: usize, radius: usize) -> Self {
        assert!(radius >= 1, "lanczos radius must be at least 1");
        let mut kernel = Self::new(2 * radius + 1, radius, resolution);
        let scale = kernel.scale as f32;
        let r = radius as f32;
        for (i, value) in kernel.table.iter_mut().enumerate() {
            let t = i as f32 / scale - r;
            *value = lanczos_window(t, r);
        }
        kernel.pack();
        kernel
    }

    /// Tap count.
    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Tap index representing time offset zero.
    #[inline]
    pub fn sample_zero(&self) -> usize {
        self.sample_zero
    }

    /// Sub-samples between adjacent taps.
    #[inline]
    pub fn scale(&self) -> usize {
        self.scale
    }

    /// The natural-order table (`length × scale` values).
    #[inline]
    pub fn table(&self) -> &[f32] {
        &self.table
    }

    /// Mutable natural-order table, for authoring. Call
    /// [`pack`](Self::pack) when done.
    #[inline]
    pub fn table_mut(&mut self) -> &mut [f32] {
        &mut self.table
    }

    /// The packed layout (`length × (scale + 1)` values).
    #[inline]
    pub fn packed(&self) -> &[f32] {
        &self.packed
    }

    /// Rebuild the packed layout from the table.
    ///
    /// `packed[sub][tap] = table[tap × scale + sub]`, with the extra
    /// `sub == scale` row holding subsample 0 shifted by one tap (values
    /// past the table's end read as zero). Only reads the table, so calling
    /// it twice is a no-op.
    pub fn pack(&mut self) {
        for sub in 0..=self.scale {
            for tap in 0..self.length {
                let src = tap * self.scale + sub;
                self.packed[sub * self.length + tap] = self.table.get(src).copied().unwrap_or(0.0);
            }
        }
    }

    /// Sample the kernel itself at `pos` (in taps, not sub-samples),
    /// linearly interpolating between adjacent sub-sample entries. Outside
    /// `[0, length)` the kernel is zero.
    #[inline]
    pub fn sample(&self, pos: f32) -> f32 {
        let q = pos * self.scale as f32;
        if q < 0.0 {
            return 0.0;
        }
        let i = q as usize;
        if i >= self.table.len() {
            return 0.0;
        }
        let frac = q - i as f32;
        let a = self.table[i];
        let b = self.table.get(i + 1).copied().unwrap_or(0.0);
        lerp(a, b, frac)
    }
}

/// Lanczos window: `sinc(t)·sinc(t/r)` for `|t| < r`, else 0.
fn lanczos_window(t: f32, r: f32) -> f32 {
    if t.abs() >= r {
        return 0.0;
    }
    if t.abs() < 1e-6 {
        return 1.0;
    }
    let pt = core::f32::consts::PI * t;
    (sinf(pt) / pt) * (sinf(pt / r) / (pt / r))
}

/// Map a frame index into `[min_frame, max_frame)`, wrapping when asked.
///
/// Returns `None` when the frame is out of range and wrapping is off — the
/// sample is treated as zero.
#[inline]
fn resolve_frame(frame: isize, min_frame: isize, max_frame: isize, wrap: bool) -> Option<isize> {
    if frame >= min_frame && frame < max_frame {
        Some(frame)
    } else if wrap {
        let len = max_frame - min_frame;
        Some(min_frame + (frame - min_frame).rem_euclid(len))
    } else {
        None
    }
}

/// Convolve `kernel` against `src` to produce one output frame.
///
/// - `dst` receives one value per channel (`dst.len()` channels).
/// - `src` covers frames `[min_frame, max_frame)` at `src_stride` elements
///   per frame; frames outside the range read as zero, or wrap when `wrap`
///   is set.
/// - The output position is `frame + fraction` with `fraction ∈ [0, 1)`.
/// - `rate ∈ (0, 1]` stretches the kernel; values above 1 are clamped. At
///   rate 1 the packed layout is used and exactly `length` taps are summed;
///   below 1 taps are spaced by `rate` in kernel space and the output is
///   normalized by the accumulated kernel weight (proportional to
///   `1/rate`).
#[allow(clippy::too_many_arguments)]
pub fn sample_with_kernel(
    dst: &mut [f32],
    kernel: &Kernel,
    src: &[f32],
    src_stride: usize,
    min_frame: isize,
    max_frame: isize,
    wrap: bool,
    frame: isize,
    fraction: f32,
    rate: f32,
) {
    debug_assert!(max_frame > min_frame);
    debug_assert!((0.0..=1.0).contains(&fraction));
    dst.fill(0.0);
    let rate = rate.min(1.0);
    let length = kernel.length;
    let zero = kernel.sample_zero as isize;

    if rate >= 1.0 {
        // Packed path: rows `si` and `si + 1` bracket the fraction.
        let fs = fraction * kernel.scale as f32;
        let si = (fs as usize).min(kernel.scale - 1);
        let sf = fs - si as f32;
        let row0 = &kernel.packed[si * length..(si + 1) * length];
        let row1 = &kernel.packed[(si + 1) * length..(si + 2) * length];
        for tap in 0..length {
            let weight = lerp(row0[tap], row1[tap], sf);
            if weight == 0.0 {
                continue;
            }
            let Some(f) = resolve_frame(frame + zero - tap as isize, min_frame, max_frame, wrap)
            else {
                continue;
            };
            let base = (f - min_frame) as usize * src_stride;
            for (c, out) in dst.iter_mut().enumerate() {
                *out += weight * src[base + c];
            }
        }
    } else {
        // Stretched path: walk every src frame whose kernel-space position
        // `sample_zero + (x − k)·rate` lands inside the table.
        let x = frame as f32 + fraction;
        let k_hi = floorf(x + kernel.sample_zero as f32 / rate) as isize;
        let k_lo = floorf(x - (length - kernel.sample_zero) as f32 / rate) as isize + 1;
        let mut total = 0.0;
        for k in k_lo..=k_hi {
            let pos = kernel.sample_zero as f32 + (x - k as f32) * rate;
            let weight = kernel.sample(pos);
            total += weight;
            if weight == 0.0 {
                continue;
            }
            let Some(f) = resolve_frame(k, min_frame, max_frame, wrap) else {
                continue;
            };
            let base = (f - min_frame) as usize * src_stride;
            for (c, out) in dst.iter_mut().enumerate() {
                *out += weight * src[base + c];
            }
        }
        if total.abs() > 1e-9 {
            for out in dst.iter_mut() {
                *out /= total;
            }
        }
    }
}

/// [`sample_with_kernel`] over a [`BufferView`]'s full readable region
/// (leading and trailing context included).
pub fn sample_view_with_kernel(
    dst: &mut [f32],
    kernel: &Kernel,
    src: &BufferView<'_>,
    wrap: bool,
    frame: isize,
    fraction: f32,
    rate: f32,
) {
    sample_with_kernel(
        dst,
        kernel,
        src.raw(),
        src.stride(),
        -(src.leading() as isize),
        (src.frames() + src.trailing()) as isize,
        wrap,
        frame,
        fraction,
        rate,
    );
}

/// Smallest bank radius that covers the given sampling rate:
/// `clamp(floor(rate × max_radius), 1, max_radius)`.
#[inline]
pub fn radius_for_rate(rate: f32, max_radius: usize) -> usize {
    (floorf(rate * max_radius as f32) as usize).clamp(1, max_radius)
}

/// Shared Lanczos kernel for the given radius (1 to
/// [`LANCZOS_MAX_RADIUS`]), built on first use.
pub fn default_lanczos(radius: usize) -> &'static Kernel {
    assert!(
        (1..=LANCZOS_MAX_RADIUS).contains(&radius),
        "lanczos radius out of range"
    );
    static BANK: [OnceLock<Kernel>; LANCZOS_MAX_RADIUS] =
        [const { OnceLock::new() }; LANCZOS_MAX_RADIUS];
    BANK[radius - 1].get_or_init(|| Kernel::lanczos(LANCZOS_RESOLUTION, radius))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A kernel whose table is 1 at time offset zero and 0 elsewhere.
    fn impulse_kernel() -> Kernel {
        let mut kernel = Kernel::new(9, 4, 8);
        let zero_index = kernel.sample_zero() * kernel.scale();
        kernel.table_mut()[zero_index] = 1.0;
        kernel.pack();
        kernel
    }

    #[test]
    fn pack_is_idempotent() {
        let mut kernel = Kernel::lanczos(16, 3);
        let once = kernel.packed().to_vec();
        kernel.pack();
        assert_eq!(kernel.packed(), &once[..], "packing twice changed bits");
    }

    #[test]
    fn impulse_kernel_returns_source_sample() {
        let kernel = impulse_kernel();
        let src: Vec<f32> = (0..32).map(|i| i as f32 * 0.25).collect();
        let mut dst = [0.0_f32];
        for frame in 4..28 {
            sample_with_kernel(&mut dst, &kernel, &src, 1, 0, 32, false, frame, 0.0, 1.0);
            assert_eq!(dst[0], src[frame as usize], "frame {frame}");
        }
    }

    #[test]
    fn lanczos_center_is_unity() {
        let kernel = Kernel::lanczos(32, 3);
        assert!((kernel.sample(kernel.sample_zero() as f32) - 1.0).abs() < 1e-6);
        // Integer offsets away from center are zero crossings.
        for offset in 1..=2 {
            let pos = (kernel.sample_zero() + offset) as f32;
            assert!(kernel.sample(pos).abs() < 1e-5, "offset {offset}");
        }
    }

    #[test]
    fn lanczos_interpolates_sine() {
        // Radius 3, resolution 32; sampling src[i] = sin(2π i / 50) at
        // frame 10, fraction 0.5 must approximate sin(2π · 10.5 / 50).
        let kernel = Kernel::lanczos(32, 3);
        let src: Vec<f32> = (0..64)
            .map(|i| sinf(2.0 * core::f32::consts::PI * i as f32 / 50.0))
            .collect();
        let mut dst = [0.0_f32];
        sample_with_kernel(&mut dst, &kernel, &src, 1, 0, 64, false, 10, 0.5, 1.0);
        let expected = sinf(2.0 * core::f32::consts::PI * 10.5 / 50.0);
        assert!(
            (dst[0] - expected).abs() < 1e-4,
            "got {}, expected {expected}",
            dst[0]
        );
    }

    #[test]
    fn reduced_rate_preserves_dc() {
        // A constant signal must come through at unity for any rate thanks
        // to the weight-sum normalization.
        let kernel = Kernel::lanczos(32, 8);
        let src = vec![1.0_f32; 256];
        let mut dst = [0.0_f32];
        for rate in [0.9, 0.5, 0.25] {
            sample_with_kernel(&mut dst, &kernel, &src, 1, 0, 256, false, 128, 0.25, rate);
            assert!(
                (dst[0] - 1.0).abs() < 1e-3,
                "rate {rate} produced {}",
                dst[0]
            );
        }
    }

    #[test]
    fn wrap_reads_around_the_range() {
        let kernel = impulse_kernel();
        let src: Vec<f32> = (0..16).map(|i| i as f32).collect();
        let mut dst = [0.0_f32];
        // frame 17 wraps to frame 1.
        sample_with_kernel(&mut dst, &kernel, &src, 1, 0, 16, true, 17, 0.0, 1.0);
        assert_eq!(dst[0], 1.0);
        // Without wrapping, out-of-range reads are zero.
        sample_with_kernel(&mut dst, &kernel, &src, 1, 0, 16, false, 17, 0.0, 1.0);
        assert_eq!(dst[0], 0.0);
    }

    #[test]
    fn multi_channel_sampling_is_per_channel() {
        let kernel = impulse_kernel();
        // Two interleaved channels: left = i, right = -i.
        let mut src = Vec::new();
        for i in 0..32 {
            src.push(i as f32);
            src.push(-(i as f32));
        }
        let mut dst = [0.0_f32; 2];
        sample_with_kernel(&mut dst, &kernel, &src, 2, 0, 32, false, 10, 0.0, 1.0);
        assert_eq!(dst, [10.0, -10.0]);
    }

    #[test]
    fn radius_for_rate_clamps() {
        assert_eq!(radius_for_rate(1.0, 16), 16);
        assert_eq!(radius_for_rate(0.5, 16), 8);
        assert_eq!(radius_for_rate(0.001, 16), 1);
        assert_eq!(radius_for_rate(4.0, 16), 16);
    }

    #[test]
    fn default_bank_returns_same_kernel() {
        let a = default_lanczos(3) as *const Kernel;
        let b = default_lanczos(3) as *const Kernel;
        assert_eq!(a, b);
        assert_eq!(default_lanczos(3).length(), 7);
    }
}
