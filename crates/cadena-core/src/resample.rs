//! Arbitrary-ratio resampling built on the kernel sampler.
//!
//! These are the streaming primitives the engine uses to splice
//! consecutive blocks without phase discontinuity: the caller carries the
//! fractional source offset from one block to the next and exposes edge
//! context (`src_min_frame`/`src_max_frame` beyond the body) so interior
//! output frames never see a truncated kernel.

use libm::floorf;

use crate::kernel::{Kernel, sample_with_kernel};

/// Resample `src` into `dst` by `factor = src_rate / dst_rate`.
///
/// For each destination frame `i`, the source position is
/// `src_sample_offset + i × factor`, split into integer frame and fraction
/// and handed to [`sample_with_kernel`]. `src` covers frames
/// `[src_min_frame, src_max_frame)`; frames outside read as zero. For
/// clean chunked streaming, `src_min_frame` should reach one kernel length
/// before the body and `src_max_frame` one kernel length after it.
///
/// When `factor > 1` (downsampling), the kernel rate is reduced to
/// `1/factor` so the kernel doubles as the anti-aliasing low-pass.
#[allow(clippy::too_many_arguments)]
pub fn resample(
    kernel: &Kernel,
    factor: f32,
    dst: &mut [f32],
    dst_stride: usize,
    dst_frames: usize,
    channels: usize,
    src: &[f32],
    src_stride: usize,
    src_min_frame: isize,
    src_max_frame: isize,
    src_sample_offset: f32,
) {
    debug_assert!(factor > 0.0);
    let rate = (1.0 / factor).min(1.0);
    let mut frame_out = [0.0_f32; crate::buffer::MAX_CHANNELS];
    let frame_out = &mut frame_out[..channels];
    for i in 0..dst_frames {
        let pos = src_sample_offset + i as f32 * factor;
        let frame = floorf(pos);
        let fraction = pos - frame;
        sample_with_kernel(
            frame_out,
            kernel,
            src,
            src_stride,
            src_min_frame,
            src_max_frame,
            false,
            frame as isize,
            fraction,
            rate,
        );
        let base = i * dst_stride;
        dst[base..base + channels].copy_from_slice(frame_out);
    }
}

/// Like [`resample`], but scales each value by `amp` and accumulates into
/// `dst` instead of replacing it.
#[allow(clippy::too_many_arguments)]
pub fn resample_add(
    kernel: &Kernel,
    factor: f32,
    amp: f32,
    dst: &mut [f32],
    dst_stride: usize,
    dst_frames: usize,
    channels: usize,
    src: &[f32],
    src_stride: usize,
    src_min_frame: isize,
    src_max_frame: isize,
    src_sample_offset: f32,
) {
    debug_assert!(factor > 0.0);
    let rate = (1.0 / factor).min(1.0);
    let mut frame_out = [0.0_f32; crate::buffer::MAX_CHANNELS];
    let frame_out = &mut frame_out[..channels];
    for i in 0..dst_frames {
        let pos = src_sample_offset + i as f32 * factor;
        let frame = floorf(pos);
        let fraction = pos - frame;
        sample_with_kernel(
            frame_out,
            kernel,
            src,
            src_stride,
            src_min_frame,
            src_max_frame,
            false,
            frame as isize,
            fraction,
            rate,
        );
        let base = i * dst_stride;
        for (c, value) in frame_out.iter().enumerate() {
            dst[base + c] += amp * value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libm::sinf;

    fn sine(frames: usize, period: f32) -> Vec<f32> {
        (0..frames)
            .map(|i| sinf(2.0 * core::f32::consts::PI * i as f32 / period))
            .collect()
    }

    #[test]
    fn unity_factor_is_identity() {
        let kernel = Kernel::lanczos(32, 4);
        let src = sine(128, 16.0);
        let mut dst = vec![0.0_f32; 128];
        resample(&kernel, 1.0, &mut dst, 1, 128, 1, &src, 1, 0, 128, 0.0);
        let margin = kernel.length();
        for i in margin..128 - margin {
            assert!(
                (dst[i] - src[i]).abs() < 1e-4,
                "frame {i}: {} vs {}",
                dst[i],
                src[i]
            );
        }
    }

    #[test]
    fn round_trip_reproduces_interior() {
        // Up by 2/3, back down by 3/2; a sinusoid well below half Nyquist
        // must survive away from the edges.
        let kernel = Kernel::lanczos(32, 8);
        let src = sine(256, 20.0);
        let factor_up = 2.0 / 3.0;
        let up_frames = (256.0 / factor_up) as usize;
        let mut up = vec![0.0_f32; up_frames];
        resample(&kernel, factor_up, &mut up, 1, up_frames, 1, &src, 1, 0, 256, 0.0);

        let factor_down = 3.0 / 2.0;
        let mut down = vec![0.0_f32; 256];
        resample(
            &kernel,
            factor_down,
            &mut down,
            1,
            256,
            1,
            &up,
            1,
            0,
            up_frames as isize,
            0.0,
        );

        let margin = kernel.length();
        for i in margin..256 - margin {
            assert!(
                (down[i] - src[i]).abs() < 5e-3,
                "frame {i}: {} vs {}",
                down[i],
                src[i]
            );
        }
    }

    #[test]
    fn resample_add_accumulates_scaled() {
        let kernel = Kernel::lanczos(32, 4);
        let src = vec![1.0_f32; 64];
        let mut dst = vec![1.0_f32; 64];
        resample_add(&kernel, 1.0, 0.5, &mut dst, 1, 64, 1, &src, 1, 0, 64, 0.0);
        let margin = kernel.length();
        for i in margin..64 - margin {
            assert!((dst[i] - 1.5).abs() < 1e-3, "frame {i}: {}", dst[i]);
        }
    }
}
