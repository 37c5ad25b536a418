//! Engine error codes.
//!
//! Two classes of failure exist in the engine (see [`Chain`](crate::Chain)):
//!
//! - **Fatal to a stage**: the error is recorded in the offending plugin's
//!   header and the chain skips that stage until the user clears it.
//! - **Fatal to a call**: `Chain::process` returns the error and the host is
//!   expected to output silence for that block.

use thiserror::Error;

/// Errors reported by buffers, plugins, and the processing chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Error {
    /// A ring buffer or delay line could not grow to the required size.
    #[error("out of memory")]
    OutOfMemory,
    /// A buffer did not provide the frames a stage requires (body, leading,
    /// or trailing).
    #[error("invalid frame count")]
    InvalidFrameCount,
    /// Channel counts of coupled buffers do not match, or a layout exceeds
    /// the supported channel maximum.
    #[error("invalid channel count")]
    InvalidChannelCount,
    /// Inconsistent buffer geometry (extents, stride, slice bounds).
    #[error("invalid argument")]
    InvalidArgument,
    /// Cyclic effect routing was detected at the mixer level.
    #[error("routing cycle")]
    RoutingCycle,
}

/// Convenience alias used throughout the engine.
pub type Result<T> = core::result::Result<T, Error>;
