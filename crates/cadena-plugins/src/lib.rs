//! Plugin implementations for the cadena DSP engine.
//!
//! Every effect here implements [`cadena_core::Plugin`] and follows the
//! same skeleton: reset on `CUT`, zero state for newly appearing channels,
//! update meters only while selected, and process in place on the view the
//! chain provides.
//!
//! # Plugins
//!
//! Dynamics:
//! - [`CubicLimiter`] - stateless cubic soft clipper
//! - [`LookaheadLimiter`] - 128-frame true-peak limiter with ramped gain
//! - [`Compressor`] / [`Gate`] - RMS-sidechain dynamics pair
//!
//! Filters:
//! - [`Filter`] - cascaded one-pole IIR (low/high/band-pass)
//! - [`LowPassFir`] - linear-phase windowed-sinc low-pass
//!
//! Time-based:
//! - [`Delay`] - static feedback delay with ping-pong and a wet-path chain
//! - [`DelayDynamic`] - follower-driven fractional delay (kernel reads)
//! - [`Reverb`] - parallel feedback delay bank with damping
//!
//! Sources & spatial:
//! - [`Sampler`] - polyphonic buffer player with ADSR voices
//! - [`Spatialize`] - 3D panner with doppler and distance filtering
//!
//! Monitoring:
//! - [`Rms`] - windowed RMS monitor (also the dynamics sidechain core)

pub mod compressor;
pub mod cubic_limiter;
pub mod delay;
pub mod delay_dynamic;
pub mod filter;
pub mod gate;
pub mod lookahead_limiter;
pub mod lowpass_fir;
pub mod reverb;
pub mod rms;
pub mod sampler;
pub mod spatialize;

pub use compressor::{Compressor, CompressorConfig};
pub use cubic_limiter::{CubicLimiter, CubicLimiterConfig};
pub use delay::{Delay, DelayConfig};
pub use delay_dynamic::{DelayDynamic, DelayDynamicChannelConfig, DelayDynamicConfig};
pub use filter::{Filter, FilterConfig, FilterKind, MAX_POLES};
pub use gate::{Gate, GateConfig};
pub use lookahead_limiter::{LOOKAHEAD_FRAMES, LookaheadLimiter, LookaheadLimiterConfig};
pub use lowpass_fir::{LowPassFir, LowPassFirConfig};
pub use reverb::{REVERB_DELAY_COUNT, Reverb, ReverbConfig};
pub use rms::{CombineOp, Rms, RmsWindow};
pub use sampler::{MAX_INSTANCES, Sampler, SamplerConfig};
pub use spatialize::{Spatialize, SpatializeChannelConfig, SpatializeConfig};
