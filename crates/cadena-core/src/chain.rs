//! Serial plugin chain with per-stage edge-context management.
//!
//! The chain's job is to let every stage pretend its input is a continuous
//! stream with readable context on both sides, even though the host
//! delivers isolated blocks. Each step keeps a small *edge ring* holding
//! `(leading + trailing) × channels` samples carried over from the previous
//! block:
//!
//! ```text
//! per block, per stage (working in place on the destination buffer):
//!   1. shift the body late by `trailing` frames  — the deferral that turns
//!      a trailing-context requirement into real latency
//!   2. ring → buffer[-leading .. trailing)       — previous block's tail
//!   3. buffer[frames-leading .. frames+trailing) → ring  — saved for next
//!   4. slice a view with exactly (leading, trailing) and process
//! ```
//!
//! Stage geometry is re-queried every block; when a stage's requirements
//! change, its ring is zeroed, so the first block after a live latency
//! change is silent in the edge regions. Stages whose requirements the
//! working buffer cannot satisfy get `InvalidFrameCount` recorded in their
//! header and are skipped until the user clears the error.

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::plugin::{LatencySpec, Plugin, ProcessFlags, plugin_process, plugin_specs};

/// Per-stage carried edge samples.
#[derive(Debug, Default)]
struct EdgeRing {
    samples: Vec<f32>,
    leading: usize,
    trailing: usize,
    channels: usize,
}

impl EdgeRing {
    /// Adapt to new geometry. Any change zeroes the content — continuity
    /// across a live spec change is deliberately not preserved.
    fn configure(&mut self, leading: usize, trailing: usize, channels: usize) {
        if self.leading == leading && self.trailing == trailing && self.channels == channels {
            return;
        }
        self.leading = leading;
        self.trailing = trailing;
        self.channels = channels;
        self.samples.clear();
        self.samples.resize((leading + trailing) * channels, 0.0);
        #[cfg(feature = "tracing")]
        tracing::debug!(leading, trailing, channels, "edge ring reconfigured");
    }
}

/// One step in the chain.
struct ChainStep {
    plugin: Box<dyn Plugin>,
    ring: EdgeRing,
    specs: LatencySpec,
}

impl ChainStep {
    fn new(plugin: Box<dyn Plugin>) -> Self {
        Self {
            plugin,
            ring: EdgeRing::default(),
            specs: LatencySpec::ZERO,
        }
    }
}

/// Ordered list of plugins processed in series.
///
/// The chain owns its plugins. Structural mutation (append/insert/remove)
/// is excluded during [`process`](Self::process) by `&mut self`; hosts
/// running a separate configuration thread synchronize externally.
#[derive(Default)]
pub struct Chain {
    steps: Vec<ChainStep>,
}

impl Chain {
    /// An empty chain.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Add a plugin at the end.
    pub fn append(&mut self, plugin: Box<dyn Plugin>) {
        self.steps.push(ChainStep::new(plugin));
    }

    /// Add a plugin at the beginning.
    pub fn prepend(&mut self, plugin: Box<dyn Plugin>) {
        self.steps.insert(0, ChainStep::new(plugin));
    }

    /// Add a plugin before the stage at `index` (`index == len` appends).
    pub fn insert(&mut self, index: usize, plugin: Box<dyn Plugin>) {
        self.steps.insert(index, ChainStep::new(plugin));
    }

    /// Remove and return the plugin at `index`.
    pub fn remove(&mut self, index: usize) -> Box<dyn Plugin> {
        self.steps.remove(index).plugin
    }

    /// The plugin at `index`.
    pub fn plugin(&self, index: usize) -> Option<&dyn Plugin> {
        self.steps.get(index).map(|step| step.plugin.as_ref())
    }

    /// Mutable access to the plugin at `index`.
    pub fn plugin_mut(&mut self, index: usize) -> Option<&mut (dyn Plugin + 'static)> {
        self.steps.get_mut(index).map(|step| step.plugin.as_mut())
    }

    /// Iterate over the plugins in processing order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Plugin> {
        self.steps.iter().map(|step| step.plugin.as_ref())
    }

    /// Combined requirements of the whole chain at the given sample rate.
    ///
    /// Stage specs fold serially; the final stage's trailing demand is
    /// covered by the chain's own exported `trailing` requirement rather
    /// than counted as latency, so the reported latency is
    /// `Σ(latency + trailing) − last.trailing`.
    pub fn specs(&self, samplerate: u32) -> LatencySpec {
        let mut total = LatencySpec::ZERO;
        let mut last_trailing = 0;
        for step in &self.steps {
            let spec = plugin_specs(step.plugin.as_ref(), samplerate);
            total.combine_serial(&spec);
            last_trailing = spec.trailing;
        }
        total.latency -= last_trailing;
        total
    }

    /// Re-query stage specs and adapt edge rings.
    ///
    /// Called automatically from [`process`](Self::process); calling it
    /// manually after reconfiguration moves the work off the first audio
    /// block.
    pub fn update(&mut self, samplerate: u32, channels: usize) {
        for step in &mut self.steps {
            let spec = plugin_specs(step.plugin.as_ref(), samplerate);
            step.ring.configure(spec.leading, spec.trailing, channels);
            step.specs = spec;
        }
    }

    /// Process a block: copy `src`'s body into `dst`, then run every stage
    /// in place on `dst`.
    ///
    /// `dst` must expose at least the chain's combined `leading`/`trailing`
    /// context; stages whose requirements exceed it are disabled with
    /// `InvalidFrameCount` rather than failing the call.
    pub fn process(&mut self, dst: &mut Buffer, src: &Buffer, flags: ProcessFlags) -> Result<()> {
        self.process_with_handler(dst, src, flags, |_, _| {})
    }

    /// [`process`](Self::process) with a callback observing per-stage
    /// errors as `(stage_index, plugin)`.
    pub fn process_with_handler(
        &mut self,
        dst: &mut Buffer,
        src: &Buffer,
        flags: ProcessFlags,
        on_plugin_error: impl FnMut(usize, &dyn Plugin),
    ) -> Result<()> {
        dst.view_mut().copy_body_from(&src.view())?;
        self.process_in_place_with_handler(dst, flags, on_plugin_error)
    }

    /// Run every stage in place on `buffer`.
    pub fn process_in_place(&mut self, buffer: &mut Buffer, flags: ProcessFlags) -> Result<()> {
        self.process_in_place_with_handler(buffer, flags, |_, _| {})
    }

    /// [`process_in_place`](Self::process_in_place) with an error callback.
    pub fn process_in_place_with_handler(
        &mut self,
        buffer: &mut Buffer,
        flags: ProcessFlags,
        mut on_plugin_error: impl FnMut(usize, &dyn Plugin),
    ) -> Result<()> {
        let samplerate = buffer.samplerate();
        let channels = buffer.channels();
        let frames = buffer.frames();
        self.update(samplerate, channels);

        for i in 0..self.steps.len() {
            let step = &mut self.steps[i];
            if !step.plugin.header().is_active() {
                continue;
            }
            let spec = step.specs;
            if buffer.leading() < spec.leading || buffer.trailing() < spec.trailing {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    stage = i,
                    name = step.plugin.header().name(),
                    have_leading = buffer.leading(),
                    have_trailing = buffer.trailing(),
                    want_leading = spec.leading,
                    want_trailing = spec.trailing,
                    "buffer does not satisfy stage edge requirements"
                );
                step.plugin.header_mut().set_error(Error::InvalidFrameCount);
                on_plugin_error(i, step.plugin.as_ref());
                continue;
            }

            if spec.trailing > 0 {
                // Defer the stream: the body moves late by `trailing`
                // frames, pushing this block's tail into the trailing
                // region where it gets saved for the next block.
                let base = buffer.leading() * channels;
                buffer
                    .raw_mut()
                    .copy_within(base..base + frames * channels, base + spec.trailing * channels);
            }

            let edge_elems = (spec.leading + spec.trailing) * channels;
            if edge_elems > 0 {
                // Previous block's tail becomes this block's head context…
                let head = (buffer.leading() - spec.leading) * channels;
                buffer.raw_mut()[head..head + edge_elems].copy_from_slice(&step.ring.samples);
                // …and this block's tail is carried forward.
                let tail = (buffer.leading() + frames - spec.leading) * channels;
                step.ring
                    .samples
                    .copy_from_slice(&buffer.raw()[tail..tail + edge_elems]);
            }

            let mut view = buffer.view_mut();
            let sliced = view.slice_mut(0, frames, spec.leading, spec.trailing)?;
            if plugin_process(step.plugin.as_mut(), sliced, flags).is_err() {
                on_plugin_error(i, step.plugin.as_ref());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferViewMut, ChannelLayout};
    use crate::plugin::PluginHeader;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Pass-through stage with a configurable spec, recording the leading
    /// context it saw into shared storage so tests can inspect it while
    /// the chain owns the plugin.
    struct Probe {
        header: PluginHeader,
        latency: usize,
        leading: Arc<AtomicUsize>,
        trailing: usize,
        gain: f32,
        seen_leading: Arc<Mutex<Vec<f32>>>,
    }

    impl Probe {
        fn new(spec: LatencySpec) -> Self {
            Self {
                header: PluginHeader::new("probe"),
                latency: spec.latency,
                leading: Arc::new(AtomicUsize::new(spec.leading)),
                trailing: spec.trailing,
                gain: 1.0,
                seen_leading: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn with_gain(mut self, gain: f32) -> Self {
            self.gain = gain;
            self
        }
    }

    impl Plugin for Probe {
        fn header(&self) -> &PluginHeader {
            &self.header
        }

        fn header_mut(&mut self) -> &mut PluginHeader {
            &mut self.header
        }

        fn specs(&self, _samplerate: u32) -> LatencySpec {
            LatencySpec {
                latency: self.latency,
                leading: self.leading.load(Ordering::Relaxed),
                trailing: self.trailing,
            }
        }

        fn process(&mut self, mut buffer: BufferViewMut<'_>, _flags: ProcessFlags) -> Result<()> {
            assert_eq!(buffer.leading(), self.leading.load(Ordering::Relaxed));
            assert_eq!(buffer.trailing(), self.trailing);
            *self.seen_leading.lock().unwrap() = (-(buffer.leading() as isize)..0)
                .map(|f| buffer.sample(f, 0))
                .collect();
            for f in 0..buffer.frames() as isize {
                for c in 0..buffer.channels() {
                    let value = buffer.sample(f, c) * self.gain;
                    buffer.set_sample(f, c, value);
                }
            }
            Ok(())
        }

        fn reset(&mut self) {}
    }

    fn block(values: &[f32], leading: usize, trailing: usize) -> Buffer {
        let mut buffer = Buffer::new(values.len(), leading, trailing, ChannelLayout::mono(), 48000);
        buffer.body_mut().copy_from_slice(values);
        buffer
    }

    #[test]
    fn latency_accounting_matches_contract() {
        let mut chain = Chain::new();
        let specs = [
            LatencySpec {
                latency: 128,
                leading: 0,
                trailing: 0,
            },
            LatencySpec {
                latency: 3,
                leading: 5,
                trailing: 7,
            },
            LatencySpec {
                latency: 0,
                leading: 2,
                trailing: 4,
            },
        ];
        for spec in specs {
            chain.append(Box::new(Probe::new(spec)));
        }
        let combined = chain.specs(48000);
        let sum: usize = specs.iter().map(|s| s.latency + s.trailing).sum();
        assert_eq!(combined.latency, sum - specs.last().unwrap().trailing);
        assert_eq!(combined.leading, 5);
        assert_eq!(combined.trailing, 7);
    }

    #[test]
    fn empty_chain_reports_zero_specs() {
        let chain = Chain::new();
        assert_eq!(chain.specs(48000), LatencySpec::ZERO);
    }

    #[test]
    fn stages_apply_in_order() {
        let mut chain = Chain::new();
        chain.append(Box::new(Probe::new(LatencySpec::ZERO).with_gain(2.0)));
        chain.append(Box::new(Probe::new(LatencySpec::ZERO).with_gain(3.0)));
        let src = block(&[1.0, 1.0, 1.0, 1.0], 0, 0);
        let mut dst = Buffer::new(4, 0, 0, ChannelLayout::mono(), 48000);
        chain.process(&mut dst, &src, ProcessFlags::NONE).unwrap();
        assert!(dst.body().iter().all(|&s| (s - 6.0).abs() < 1e-6));
    }

    #[test]
    fn leading_context_carries_previous_block_tail() {
        let probe = Probe::new(LatencySpec {
            latency: 0,
            leading: 4,
            trailing: 0,
        });
        let seen = Arc::clone(&probe.seen_leading);
        let mut chain = Chain::new();
        chain.append(Box::new(probe));
        let mut dst = Buffer::new(8, 4, 0, ChannelLayout::mono(), 48000);

        let first = block(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], 0, 0);
        chain.process(&mut dst, &first, ProcessFlags::NONE).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0.0, 0.0, 0.0, 0.0]);

        let second = block(&[9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0], 0, 0);
        chain.process(&mut dst, &second, ProcessFlags::NONE).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn trailing_requirement_defers_the_stream() {
        let mut chain = Chain::new();
        chain.append(Box::new(Probe::new(LatencySpec {
            latency: 0,
            leading: 0,
            trailing: 4,
        })));
        let mut dst = Buffer::new(8, 0, 4, ChannelLayout::mono(), 48000);

        let first = block(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], 0, 0);
        chain.process(&mut dst, &first, ProcessFlags::NONE).unwrap();
        assert_eq!(
            dst.body(),
            &[0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0],
            "first block output is deferred by the trailing requirement"
        );

        let second = block(&[9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0], 0, 0);
        chain.process(&mut dst, &second, ProcessFlags::NONE).unwrap();
        assert_eq!(dst.body(), &[5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn insufficient_edges_disable_the_stage() {
        let mut chain = Chain::new();
        chain.append(Box::new(Probe::new(LatencySpec {
            latency: 0,
            leading: 16,
            trailing: 0,
        })));
        let src = block(&[1.0; 8], 0, 0);
        let mut dst = Buffer::new(8, 4, 0, ChannelLayout::mono(), 48000);
        let mut failures = Vec::new();
        chain
            .process_with_handler(&mut dst, &src, ProcessFlags::NONE, |index, plugin| {
                failures.push((index, plugin.header().error()));
            })
            .unwrap();
        assert_eq!(failures, vec![(0, Some(Error::InvalidFrameCount))]);
        // The stage stays disabled on subsequent blocks.
        let mut count = 0;
        chain
            .process_with_handler(&mut dst, &src, ProcessFlags::NONE, |_, _| count += 1)
            .unwrap();
        assert_eq!(count, 0, "errored stage is skipped, not re-reported");
    }

    #[test]
    fn bypassed_stage_reports_zero_specs_and_is_skipped() {
        let mut chain = Chain::new();
        chain.append(Box::new(Probe::new(LatencySpec {
            latency: 64,
            leading: 8,
            trailing: 8,
        })));
        chain.plugin_mut(0).unwrap().header_mut().bypass = true;
        assert_eq!(chain.specs(48000), LatencySpec::ZERO);

        let src = block(&[1.0; 4], 0, 0);
        let mut dst = Buffer::new(4, 0, 0, ChannelLayout::mono(), 48000);
        chain.process(&mut dst, &src, ProcessFlags::NONE).unwrap();
        assert_eq!(dst.body(), &[1.0; 4]);
    }

    #[test]
    fn spec_change_zeroes_the_ring() {
        // A stage that swaps from (leading 8) to (leading 16) must see
        // silence in its newly sized leading region on the first block
        // after the swap.
        let probe = Probe::new(LatencySpec {
            latency: 0,
            leading: 8,
            trailing: 0,
        });
        let seen = Arc::clone(&probe.seen_leading);
        let leading = Arc::clone(&probe.leading);
        let mut chain = Chain::new();
        chain.append(Box::new(probe));

        let mut dst = Buffer::new(8, 16, 0, ChannelLayout::mono(), 48000);
        let src = block(&[1.0; 8], 0, 0);
        chain.process(&mut dst, &src, ProcessFlags::NONE).unwrap();
        chain.process(&mut dst, &src, ProcessFlags::NONE).unwrap();
        assert!(seen.lock().unwrap().iter().all(|&s| s == 1.0));

        leading.store(16, Ordering::Relaxed);
        chain.process(&mut dst, &src, ProcessFlags::NONE).unwrap();
        assert!(
            seen.lock().unwrap().iter().all(|&s| s == 0.0),
            "ring must be zeroed after a spec change"
        );
    }

    #[test]
    fn remove_returns_the_plugin() {
        let mut chain = Chain::new();
        chain.append(Box::new(Probe::new(LatencySpec::ZERO)));
        chain.prepend(Box::new(Probe::new(LatencySpec::ZERO)));
        assert_eq!(chain.len(), 2);
        let removed = chain.remove(0);
        assert_eq!(removed.header().name(), "probe");
        assert_eq!(chain.len(), 1);
    }
}
