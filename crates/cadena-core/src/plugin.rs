//! The plugin capability surface: latency specs, headers, process flags.
//!
//! Every effect implements [`Plugin`]. The chain invokes
//! [`Plugin::process`] with a buffer view whose `leading`/`trailing`
//! extents exactly match what the plugin declared via
//! [`Plugin::specs`] — a plugin never has to guard against missing edge
//! context. Processing is in place: reading an index after writing it
//! observes the written value, so plugins that need a dry snapshot copy it
//! to a [`SideBuffer`](crate::SideBuffer) first.

use crate::buffer::BufferViewMut;
use crate::error::{Error, Result};

/// Per-stage frame requirements and latency report.
///
/// `latency` is the algorithmic delay the stage introduces (reported
/// upstream for host compensation). `leading`/`trailing` are the edge
/// context the stage wants the chain to provide around each block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencySpec {
    /// Frames of algorithmic delay introduced by the stage itself.
    pub latency: usize,
    /// Context frames desired before the body.
    pub leading: usize,
    /// Context frames desired after the body.
    pub trailing: usize,
}

impl LatencySpec {
    /// A spec demanding nothing.
    pub const ZERO: Self = Self {
        latency: 0,
        leading: 0,
        trailing: 0,
    };

    /// Fold in a stage that runs after this one in series.
    ///
    /// The downstream stage's trailing requirement becomes latency: the
    /// chain must defer publishing frames until enough future context has
    /// been seen. Edge requirements take the maximum, since one shared
    /// edge region sized for the widest stage serves every stage.
    pub fn combine_serial(&mut self, next: &LatencySpec) {
        self.latency += next.latency + next.trailing;
        self.leading = self.leading.max(next.leading);
        self.trailing = self.trailing.max(next.trailing);
    }

    /// Fold in a stage that runs in parallel with this one.
    pub fn combine_parallel(&mut self, other: &LatencySpec) {
        self.latency = self.latency.max(other.latency);
        self.leading = self.leading.max(other.leading);
        self.trailing = self.trailing.max(other.trailing);
    }
}

/// Flags passed to [`Plugin::process`].
///
/// Bit 0 is [`CUT`](Self::CUT); all other bits are reserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessFlags(u32);

impl ProcessFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// A time discontinuity occurred in the source since the last call —
    /// the plugin may have been moved between chains, so persistent state
    /// (ring indices, followers, envelopes) must reset. Configuration is
    /// kept.
    pub const CUT: Self = Self(1);

    /// Whether all bits of `flags` are set in `self`.
    #[inline]
    pub fn contains(self, flags: Self) -> bool {
        self.0 & flags.0 == flags.0
    }
}

impl core::ops::BitOr for ProcessFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Common state carried by every plugin.
#[derive(Debug, Clone)]
pub struct PluginHeader {
    name: &'static str,
    /// When set, the stage is skipped entirely (it reports zero specs and
    /// does not process).
    pub bypass: bool,
    /// Bitset of monitoring views currently displaying this plugin; meters
    /// only update while non-zero.
    pub selected: u8,
    prev_channels: usize,
    error: Option<Error>,
}

impl PluginHeader {
    /// Header with the given display name.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            bypass: false,
            selected: 0,
            prev_channels: 0,
            error: None,
        }
    }

    /// Display name of the plugin.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The sticky processing error, if any. While set, the chain skips
    /// this stage.
    #[inline]
    pub fn error(&self) -> Option<Error> {
        self.error
    }

    /// Record a processing error, disabling the stage.
    pub fn set_error(&mut self, error: Error) {
        self.error = Some(error);
    }

    /// Clear the error so the stage processes again. This is an explicit
    /// user action; the next block should carry
    /// [`ProcessFlags::CUT`] so the stage resets its state.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Whether the chain should run this stage.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.bypass && self.error.is_none()
    }

    /// Track a channel-count change between blocks.
    ///
    /// Returns `Some((first_new_channel, added_count))` when the count
    /// grew, in which case the plugin must zero state for the new channels
    /// via [`Plugin::reset_channels`].
    pub fn track_channels(&mut self, channels: usize) -> Option<(usize, usize)> {
        let prev = self.prev_channels;
        self.prev_channels = channels;
        (channels > prev).then(|| (prev, channels - prev))
    }
}

/// Uniform capability set of every effect.
///
/// Implementations are object-safe so chains can hold `Box<dyn Plugin>`.
pub trait Plugin: Send {
    /// Shared header state.
    fn header(&self) -> &PluginHeader;

    /// Mutable header state.
    fn header_mut(&mut self) -> &mut PluginHeader;

    /// The stage's current frame requirements at the given sample rate.
    ///
    /// The default demands nothing, which suits stages that own all their
    /// history internally.
    fn specs(&self, samplerate: u32) -> LatencySpec {
        let _ = samplerate;
        LatencySpec::ZERO
    }

    /// Process one block in place.
    ///
    /// The view's body is the block to transform; its `leading`/`trailing`
    /// extents equal this plugin's declared spec and are readable context.
    /// On [`ProcessFlags::CUT`] all persistent state must reset before
    /// processing.
    fn process(&mut self, buffer: BufferViewMut<'_>, flags: ProcessFlags) -> Result<()>;

    /// Reset all persistent state, keeping configuration.
    fn reset(&mut self);

    /// Zero per-channel state for channels `first..first + count`, used
    /// when the channel count grows between blocks.
    fn reset_channels(&mut self, first: usize, count: usize) {
        let _ = (first, count);
    }
}

/// Query a plugin's spec, honoring bypass.
pub fn plugin_specs(plugin: &dyn Plugin, samplerate: u32) -> LatencySpec {
    if plugin.header().bypass {
        LatencySpec::ZERO
    } else {
        plugin.specs(samplerate)
    }
}

/// Invoke a plugin's process, honoring bypass and a sticky error.
///
/// On failure the error is recorded in the plugin's header and returned.
pub fn plugin_process(
    plugin: &mut dyn Plugin,
    buffer: BufferViewMut<'_>,
    flags: ProcessFlags,
) -> Result<()> {
    if !plugin.header().is_active() {
        return Ok(());
    }
    match plugin.process(buffer, flags) {
        Ok(()) => Ok(()),
        Err(error) => {
            plugin.header_mut().set_error(error);
            Err(error)
        }
    }
}
