//! Cadena Core - realtime DSP engine primitives
//!
//! This crate is the hard core of the cadena audio engine: it composes
//! audio effects ("plugins") into a serial processing chain and runs that
//! chain on interleaved, multi-channel floating-point buffers, managing
//! per-stage latency and kernel-sampling edge requirements so individual
//! plugins never deal with block boundaries themselves.
//!
//! # Core Abstractions
//!
//! ## Buffers
//!
//! - [`Buffer`] - owned interleaved storage with leading/trailing edge
//!   regions (negative frame indices address context before the body)
//! - [`BufferView`] / [`BufferViewMut`] - borrowed windows with stride
//! - [`SideBuffer`] - thread-local scratch storage, released on scope exit
//!
//! ## Kernel sampling
//!
//! - [`Kernel`] - windowed-sinc table with a packed sub-sample layout
//! - [`sample_with_kernel`] / [`sample_view_with_kernel`] - one-frame
//!   convolution with zero-or-wrap edge policy and rate-stretched taps
//! - [`default_lanczos`] / [`radius_for_rate`] - the process-wide Lanczos
//!   bank and its rate-adaptive radius selection
//! - [`resample`] / [`resample_add`] - arbitrary-ratio streaming resampling
//!
//! ## The chain
//!
//! - [`Plugin`] - uniform capability set of every effect
//! - [`LatencySpec`] - per-stage `(latency, leading, trailing)` triple with
//!   serial/parallel combinators
//! - [`Chain`] - ordered plugin list that shuffles edge context between
//!   blocks and slices each stage a view matching its declared spec
//!
//! ## Utilities
//!
//! - [`LinearFollower`] / [`LinearFollower3`] - ramped value animators
//! - [`AdsrConfig`] / [`AdsrInstance`] - time-driven amplitude envelope
//! - [`EventQueue`] / [`Timestamp`] - sub-sample-accurate scheduled events
//! - [`World`] - listener context for spatialization
//! - [`Meters`] - windowed RMS and peak monitoring
//!
//! # Realtime discipline
//!
//! The audio callback runs single-threaded at realtime priority. Nothing
//! here blocks or allocates in steady state; the sanctioned growth points
//! (chain edge rings, delay storage) happen only when stage requirements
//! change. Scalar math goes through `libm` for cross-platform determinism.

pub mod adsr;
pub mod buffer;
pub mod chain;
pub mod error;
pub mod event;
pub mod follower;
pub mod kernel;
pub mod math;
pub mod meters;
pub mod plugin;
pub mod resample;
pub mod side_buffer;
pub mod world;

pub use adsr::{AdsrConfig, AdsrInstance, AdsrStage};
pub use buffer::{Buffer, BufferView, BufferViewMut, ChannelLayout, ChannelPosition, MAX_CHANNELS};
pub use chain::Chain;
pub use error::{Error, Result};
pub use event::{Event, EventQueue, Timestamp};
pub use follower::{LinearFollower, LinearFollower3};
pub use kernel::{
    Kernel, LANCZOS_MAX_RADIUS, default_lanczos, radius_for_rate, sample_view_with_kernel,
    sample_with_kernel,
};
pub use math::{Mat3, Vec3, amp_to_db, db_to_amp, lerp, ms_to_samples, samples_to_ms};
pub use meters::Meters;
pub use plugin::{LatencySpec, Plugin, PluginHeader, ProcessFlags, plugin_process, plugin_specs};
pub use resample::{resample, resample_add};
pub use side_buffer::SideBuffer;
pub use world::World;
