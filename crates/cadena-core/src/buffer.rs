//! Interleaved multi-channel audio buffers with edge context.
//!
//! A [`Buffer`] stores interleaved `f32` samples for `frames` body frames
//! plus `leading` context frames before the body and `trailing` context
//! frames after it. Frame indices are signed: index 0 is the first body
//! frame, negative indices address the leading region, and indices at or
//! past `frames` address the trailing region. Only the body is what a
//! processing stage is expected to transform; the edges exist so kernel
//! samplers can read past the block boundaries without special cases.
//!
//! [`BufferView`] / [`BufferViewMut`] are borrowed windows over a buffer
//! (or over foreign interleaved memory) carrying an explicit `stride`, so a
//! view can cover a channel-interleaved region wider than its own channel
//! count. The chain hands plugins views whose `leading`/`trailing` exactly
//! match the stage's declared requirements.

use crate::error::{Error, Result};
use crate::math::Vec3;

/// Upper bound on channels a single buffer can carry.
pub const MAX_CHANNELS: usize = 8;

/// Spatial role of one channel within a layout.
///
/// The direction vectors are used by the spatializer to place output
/// channels around the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelPosition {
    /// Single full-range channel, facing forward.
    #[default]
    Mono,
    /// Front left.
    FrontLeft,
    /// Front right.
    FrontRight,
    /// Front center.
    FrontCenter,
    /// Low-frequency effects; no meaningful direction.
    Lfe,
    /// Back left.
    BackLeft,
    /// Back right.
    BackRight,
    /// Side left.
    SideLeft,
    /// Side right.
    SideRight,
}

impl ChannelPosition {
    /// Unit direction of this channel relative to the listener.
    ///
    /// X is right, Z is forward. [`Lfe`](Self::Lfe) returns the zero vector
    /// (omnidirectional).
    pub fn direction(self) -> Vec3 {
        match self {
            ChannelPosition::Mono | ChannelPosition::FrontCenter => Vec3::new(0.0, 0.0, 1.0),
            ChannelPosition::FrontLeft => Vec3::new(-0.7071, 0.0, 0.7071),
            ChannelPosition::FrontRight => Vec3::new(0.7071, 0.0, 0.7071),
            ChannelPosition::Lfe => Vec3::ZERO,
            ChannelPosition::BackLeft => Vec3::new(-0.7071, 0.0, -0.7071),
            ChannelPosition::BackRight => Vec3::new(0.7071, 0.0, -0.7071),
            ChannelPosition::SideLeft => Vec3::new(-1.0, 0.0, 0.0),
            ChannelPosition::SideRight => Vec3::new(1.0, 0.0, 0.0),
        }
    }
}

/// Channel count plus the spatial role of each channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    positions: Vec<ChannelPosition>,
}

impl ChannelLayout {
    /// Single-channel layout.
    pub fn mono() -> Self {
        Self {
            positions: vec![ChannelPosition::Mono],
        }
    }

    /// Standard two-channel layout.
    pub fn stereo() -> Self {
        Self {
            positions: vec![ChannelPosition::FrontLeft, ChannelPosition::FrontRight],
        }
    }

    /// Layout from explicit positions.
    ///
    /// Fails with [`Error::InvalidChannelCount`] when empty or when the
    /// count exceeds [`MAX_CHANNELS`].
    pub fn from_positions(positions: Vec<ChannelPosition>) -> Result<Self> {
        if positions.is_empty() || positions.len() > MAX_CHANNELS {
            return Err(Error::InvalidChannelCount);
        }
        Ok(Self { positions })
    }

    /// Number of channels.
    #[inline]
    pub fn count(&self) -> usize {
        self.positions.len()
    }

    /// Positions of all channels, in interleave order.
    #[inline]
    pub fn positions(&self) -> &[ChannelPosition] {
        &self.positions
    }
}

/// Owned interleaved audio storage with leading/trailing edge regions.
#[derive(Debug, Clone)]
pub struct Buffer {
    samples: Vec<f32>,
    frames: usize,
    leading: usize,
    trailing: usize,
    layout: ChannelLayout,
    samplerate: u32,
}

impl Buffer {
    /// Allocate a zeroed buffer.
    pub fn new(
        frames: usize,
        leading: usize,
        trailing: usize,
        layout: ChannelLayout,
        samplerate: u32,
    ) -> Self {
        let total = (leading + frames + trailing) * layout.count();
        Self {
            samples: vec![0.0; total],
            frames,
            leading,
            trailing,
            layout,
            samplerate,
        }
    }

    /// Body frame count.
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Leading context frames (readable at negative indices).
    #[inline]
    pub fn leading(&self) -> usize {
        self.leading
    }

    /// Trailing context frames (readable at indices `>= frames`).
    #[inline]
    pub fn trailing(&self) -> usize {
        self.trailing
    }

    /// Channel count.
    #[inline]
    pub fn channels(&self) -> usize {
        self.layout.count()
    }

    /// Channel layout.
    #[inline]
    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    /// Sample rate in Hz.
    #[inline]
    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    /// Body length in milliseconds at this buffer's sample rate.
    #[inline]
    pub fn len_ms(&self) -> f32 {
        self.frames as f32 * 1000.0 / self.samplerate as f32
    }

    /// Change the sample rate tag (the samples themselves are untouched).
    #[inline]
    pub fn set_samplerate(&mut self, samplerate: u32) {
        self.samplerate = samplerate;
    }

    /// All samples, covering `[-leading, frames + trailing)`.
    #[inline]
    pub fn raw(&self) -> &[f32] {
        &self.samples
    }

    /// Mutable access to the full sample region.
    #[inline]
    pub fn raw_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Body samples only, `frames × channels` long.
    #[inline]
    pub fn body(&self) -> &[f32] {
        let ch = self.layout.count();
        let start = self.leading * ch;
        &self.samples[start..start + self.frames * ch]
    }

    /// Mutable body samples.
    #[inline]
    pub fn body_mut(&mut self) -> &mut [f32] {
        let ch = self.layout.count();
        let start = self.leading * ch;
        &mut self.samples[start..start + self.frames * ch]
    }

    /// Zero the whole region, edges included.
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }

    /// Read-only view over the whole buffer (body plus all edge context).
    pub fn view(&self) -> BufferView<'_> {
        BufferView {
            samples: &self.samples,
            frames: self.frames,
            leading: self.leading,
            trailing: self.trailing,
            stride: self.layout.count(),
            layout: &self.layout,
            samplerate: self.samplerate,
        }
    }

    /// Mutable view over the whole buffer.
    pub fn view_mut(&mut self) -> BufferViewMut<'_> {
        BufferViewMut {
            samples: &mut self.samples,
            frames: self.frames,
            leading: self.leading,
            trailing: self.trailing,
            stride: self.layout.count(),
            layout: &self.layout,
            samplerate: self.samplerate,
        }
    }

    /// Resize preserving overlap.
    ///
    /// For every index `i` in
    /// `[-min(old_leading, leading), min(old_frames, frames) + min(old_trailing, trailing))`,
    /// the sample previously at `i` still reads at `i` afterwards. Indices
    /// newly exposed by growth read zero; indices lost to shrinking are
    /// discarded. The channel layout is unchanged.
    pub fn resize(&mut self, frames: usize, leading: usize, trailing: usize) {
        let ch = self.layout.count();
        let mut samples = vec![0.0; (leading + frames + trailing) * ch];

        // Samples survive by *index*, and the surviving index range
        // [-min(leading), min(frames) + min(trailing)) is contiguous in both
        // the old and the new interleaved storage, so one block copy moves
        // everything that survives.
        let keep_lead = self.leading.min(leading);
        let keep_frames = keep_lead + self.frames.min(frames) + self.trailing.min(trailing);
        let old_start = (self.leading - keep_lead) * ch;
        let new_start = (leading - keep_lead) * ch;
        samples[new_start..new_start + keep_frames * ch]
            .copy_from_slice(&self.samples[old_start..old_start + keep_frames * ch]);

        self.samples = samples;
        self.frames = frames;
        self.leading = leading;
        self.trailing = trailing;
    }
}

macro_rules! view_accessors {
    () => {
        /// Body frame count.
        #[inline]
        pub fn frames(&self) -> usize {
            self.frames
        }

        /// Leading context frames.
        #[inline]
        pub fn leading(&self) -> usize {
            self.leading
        }

        /// Trailing context frames.
        #[inline]
        pub fn trailing(&self) -> usize {
            self.trailing
        }

        /// Elements between consecutive frames.
        #[inline]
        pub fn stride(&self) -> usize {
            self.stride
        }

        /// Channel count.
        #[inline]
        pub fn channels(&self) -> usize {
            self.layout.count()
        }

        /// Channel layout.
        #[inline]
        pub fn layout(&self) -> &ChannelLayout {
            self.layout
        }

        /// Sample rate in Hz.
        #[inline]
        pub fn samplerate(&self) -> u32 {
            self.samplerate
        }

        /// Body length in milliseconds.
        #[inline]
        pub fn len_ms(&self) -> f32 {
            self.frames as f32 * 1000.0 / self.samplerate as f32
        }

        /// Element index of `(frame, channel)` within the raw slice.
        ///
        /// `frame` may be negative (leading) or `>= frames` (trailing), as
        /// long as it stays inside the view's readable region.
        #[inline]
        pub fn index_of(&self, frame: isize, channel: usize) -> usize {
            debug_assert!(frame >= -(self.leading as isize));
            debug_assert!(frame < (self.frames + self.trailing) as isize);
            debug_assert!(channel < self.layout.count());
            (self.leading as isize + frame) as usize * self.stride + channel
        }

        /// Read one sample; `frame` may address edge context.
        #[inline]
        pub fn sample(&self, frame: isize, channel: usize) -> f32 {
            self.samples[self.index_of(frame, channel)]
        }

        /// The whole readable region, `[-leading, frames + trailing)`.
        #[inline]
        pub fn raw(&self) -> &[f32] {
            &self.samples
        }
    };
}

/// Read-only view over interleaved samples with edge context.
#[derive(Debug, Clone, Copy)]
pub struct BufferView<'a> {
    samples: &'a [f32],
    frames: usize,
    leading: usize,
    trailing: usize,
    stride: usize,
    layout: &'a ChannelLayout,
    samplerate: u32,
}

impl<'a> BufferView<'a> {
    view_accessors!();

    /// View over foreign interleaved memory.
    ///
    /// `samples` must cover `(leading + frames + trailing) × stride`
    /// elements and `stride` must fit the layout's channel count; otherwise
    /// [`Error::InvalidArgument`] is returned.
    pub fn from_raw(
        samples: &'a [f32],
        frames: usize,
        leading: usize,
        trailing: usize,
        stride: usize,
        layout: &'a ChannelLayout,
        samplerate: u32,
    ) -> Result<Self> {
        if stride < layout.count() || samples.len() < (leading + frames + trailing) * stride {
            return Err(Error::InvalidArgument);
        }
        Ok(Self {
            samples,
            frames,
            leading,
            trailing,
            stride,
            layout,
            samplerate,
        })
    }

    /// Sub-range of the body with explicit edge context.
    ///
    /// The result's body is `[start, start + frames)` of this view's body,
    /// exposing exactly `leading`/`trailing` context frames, which must be
    /// available (body frames outside the sub-range count as context).
    pub fn slice(
        &self,
        start: usize,
        frames: usize,
        leading: usize,
        trailing: usize,
    ) -> Result<BufferView<'a>> {
        check_slice(
            self.frames,
            self.leading,
            self.trailing,
            start,
            frames,
            leading,
            trailing,
        )?;
        let lo = (self.leading + start - leading) * self.stride;
        let hi = (self.leading + start + frames + trailing) * self.stride;
        Ok(BufferView {
            samples: &self.samples[lo..hi],
            frames,
            leading,
            trailing,
            stride: self.stride,
            layout: self.layout,
            samplerate: self.samplerate,
        })
    }

    /// Same body, different exposed edge extents.
    pub fn with_edges(&self, leading: usize, trailing: usize) -> Result<BufferView<'a>> {
        self.slice(0, self.frames, leading, trailing)
    }
}

/// Mutable view over interleaved samples with edge context.
#[derive(Debug)]
pub struct BufferViewMut<'a> {
    samples: &'a mut [f32],
    frames: usize,
    leading: usize,
    trailing: usize,
    stride: usize,
    layout: &'a ChannelLayout,
    samplerate: u32,
}

impl<'a> BufferViewMut<'a> {
    view_accessors!();

    /// Write one sample; `frame` may address edge context.
    #[inline]
    pub fn set_sample(&mut self, frame: isize, channel: usize, value: f32) {
        let i = self.index_of(frame, channel);
        self.samples[i] = value;
    }

    /// Mutable access to the whole readable region.
    #[inline]
    pub fn raw_mut(&mut self) -> &mut [f32] {
        self.samples
    }

    /// Read-only alias of this view.
    pub fn as_view(&self) -> BufferView<'_> {
        BufferView {
            samples: self.samples,
            frames: self.frames,
            leading: self.leading,
            trailing: self.trailing,
            stride: self.stride,
            layout: self.layout,
            samplerate: self.samplerate,
        }
    }

    /// Mutable sub-range of the body with explicit edge context.
    ///
    /// See [`BufferView::slice`] for the availability rules.
    pub fn slice_mut(
        &mut self,
        start: usize,
        frames: usize,
        leading: usize,
        trailing: usize,
    ) -> Result<BufferViewMut<'_>> {
        check_slice(
            self.frames,
            self.leading,
            self.trailing,
            start,
            frames,
            leading,
            trailing,
        )?;
        let lo = (self.leading + start - leading) * self.stride;
        let hi = (self.leading + start + frames + trailing) * self.stride;
        Ok(BufferViewMut {
            samples: &mut self.samples[lo..hi],
            frames,
            leading,
            trailing,
            stride: self.stride,
            layout: self.layout,
            samplerate: self.samplerate,
        })
    }

    /// Copy another view's body into this view's body.
    ///
    /// Frame counts and channel counts must match.
    pub fn copy_body_from(&mut self, src: &BufferView<'_>) -> Result<()> {
        if src.frames() != self.frames {
            return Err(Error::InvalidFrameCount);
        }
        if src.channels() != self.channels() {
            return Err(Error::InvalidChannelCount);
        }
        let ch = self.channels();
        for f in 0..self.frames {
            for c in 0..ch {
                let i = self.index_of(f as isize, c);
                self.samples[i] = src.sample(f as isize, c);
            }
        }
        Ok(())
    }

    /// Zero the body (edges untouched).
    pub fn clear_body(&mut self) {
        let ch = self.channels();
        for f in 0..self.frames {
            for c in 0..ch {
                let i = self.index_of(f as isize, c);
                self.samples[i] = 0.0;
            }
        }
    }
}

/// Validate slice geometry shared by the view types.
#[allow(clippy::too_many_arguments)]
fn check_slice(
    frames: usize,
    leading: usize,
    trailing: usize,
    start: usize,
    new_frames: usize,
    new_leading: usize,
    new_trailing: usize,
) -> Result<()> {
    let end = start
        .checked_add(new_frames)
        .ok_or(Error::InvalidArgument)?;
    if end > frames {
        return Err(Error::InvalidArgument);
    }
    if new_leading > leading + start {
        return Err(Error::InvalidFrameCount);
    }
    if new_trailing > trailing + (frames - end) {
        return Err(Error::InvalidFrameCount);
    }
    Ok(())
}
