//! Cross-module integration: the kernel bank, resampler, side buffers,
//! and chain working together.

use cadena_core::{
    Buffer, BufferViewMut, Chain, ChannelLayout, LatencySpec, Plugin, PluginHeader, ProcessFlags,
    Result, SideBuffer, default_lanczos, radius_for_rate, resample, sample_view_with_kernel,
};
use libm::sinf;

/// A stage that low-passes by kernel-sampling its own input snapshot —
/// the minimal shape of every kernel-consuming plugin.
struct KernelStage {
    header: PluginHeader,
    radius: usize,
    rate: f32,
}

impl Plugin for KernelStage {
    fn header(&self) -> &PluginHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut PluginHeader {
        &mut self.header
    }

    fn specs(&self, _samplerate: u32) -> LatencySpec {
        LatencySpec {
            latency: self.radius,
            leading: self.radius,
            trailing: self.radius,
        }
    }

    fn process(&mut self, mut buffer: BufferViewMut<'_>, _flags: ProcessFlags) -> Result<()> {
        let snapshot = SideBuffer::copy_of(&buffer.as_view());
        let kernel = default_lanczos(self.radius);
        let mut out = [0.0_f32; 2];
        let channels = buffer.channels();
        for f in 0..buffer.frames() {
            sample_view_with_kernel(
                &mut out[..channels],
                kernel,
                &snapshot.view(),
                false,
                f as isize,
                0.0,
                self.rate,
            );
            for c in 0..channels {
                buffer.set_sample(f as isize, c, out[c]);
            }
        }
        Ok(())
    }

    fn reset(&mut self) {}
}

#[test]
fn kernel_stage_in_a_chain_is_transparent_at_full_rate() {
    let mut chain = Chain::new();
    chain.append(Box::new(KernelStage {
        header: PluginHeader::new("kernel-stage"),
        radius: 8,
        rate: 1.0,
    }));

    let spec = chain.specs(48000);
    assert_eq!(spec.leading, 8);
    assert_eq!(spec.trailing, 8);
    // The trailing requirement of the last stage is carried by the
    // chain's own trailing demand, not reported as latency.
    assert_eq!(spec.latency, 8);

    let mut dst = Buffer::new(256, 8, 8, ChannelLayout::mono(), 48000);
    let mut src = Buffer::new(256, 0, 0, ChannelLayout::mono(), 48000);

    // Stream several blocks of a continuous sine; after the first block
    // the edge rings are primed and the output is the input delayed by
    // the stage's trailing deferral.
    let mut input_history = Vec::new();
    let mut output_history = Vec::new();
    for block in 0..4 {
        for (j, sample) in src.body_mut().iter_mut().enumerate() {
            let i = block * 256 + j;
            *sample = sinf(2.0 * core::f32::consts::PI * i as f32 / 64.0);
        }
        input_history.extend_from_slice(src.body());
        chain.process(&mut dst, &src, ProcessFlags::NONE).unwrap();
        output_history.extend_from_slice(dst.body());
    }

    // output[i] should equal input[i - trailing] once everything is
    // primed; check well inside the stream.
    for i in 512..1000 {
        let expected = input_history[i - 8];
        let got = output_history[i];
        assert!(
            (got - expected).abs() < 1e-3,
            "frame {i}: {got} vs {expected}"
        );
    }
}

#[test]
fn resample_round_trip_through_the_bank() {
    // Down to 2/3 rate and back using bank kernels picked by rate.
    let frames = 512;
    let src: Vec<f32> = (0..frames)
        .map(|i| sinf(2.0 * core::f32::consts::PI * i as f32 / 24.0))
        .collect();

    let factor_down = 1.5;
    let down_frames = (frames as f32 / factor_down) as usize;
    let down_kernel = default_lanczos(radius_for_rate(1.0 / factor_down, 32));
    let mut down = vec![0.0_f32; down_frames];
    resample(
        down_kernel,
        factor_down,
        &mut down,
        1,
        down_frames,
        1,
        &src,
        1,
        0,
        frames as isize,
        0.0,
    );

    let factor_up = 1.0 / factor_down;
    let up_kernel = default_lanczos(32);
    let mut up = vec![0.0_f32; frames];
    resample(
        up_kernel,
        factor_up,
        &mut up,
        1,
        frames,
        1,
        &down,
        1,
        0,
        down_frames as isize,
        0.0,
    );

    let margin = 96;
    for i in margin..frames - margin {
        assert!(
            (up[i] - src[i]).abs() < 0.02,
            "frame {i}: {} vs {}",
            up[i],
            src[i]
        );
    }
}

#[test]
fn side_buffers_recycle_across_blocks() {
    let mut chain = Chain::new();
    chain.append(Box::new(KernelStage {
        header: PluginHeader::new("kernel-stage"),
        radius: 4,
        rate: 1.0,
    }));
    let mut dst = Buffer::new(128, 4, 4, ChannelLayout::stereo(), 48000);
    let src = Buffer::new(128, 0, 0, ChannelLayout::stereo(), 48000);
    chain.process(&mut dst, &src, ProcessFlags::NONE).unwrap();
    let pooled_after_first = SideBuffer::pooled();
    for _ in 0..8 {
        chain.process(&mut dst, &src, ProcessFlags::NONE).unwrap();
    }
    // Steady state: the pool neither leaks nor grows.
    assert_eq!(SideBuffer::pooled(), pooled_after_first);
}
