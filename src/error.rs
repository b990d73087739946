//! Error types for the capture and streaming pipeline.
//!
//! Failures fall into three tiers, and the type system keeps them apart:
//!
//! - **Fatal to the process**: bind/listen/accept failures at startup
//!   ([`StreamError::Bind`], [`StreamError::Accept`]) and configuration
//!   errors ([`StreamError::Config`]).
//! - **Fatal to one session**: a transmit failure ([`StreamError::Transmit`])
//!   ends the active peer connection only; the capture side keeps running.
//! - **Fatal to one tick**: a frame source failure ([`StreamError::Source`])
//!   is logged and that tick is skipped; the capture schedule never dies.
//!
//! Channel wait outcomes (`Timeout`, `Empty`, `Closed`) are not failures and
//! live with the channel as [`crate::ClaimError`] / [`crate::TryClaimError`].
//!
//! ```rust
//! use framewire::StreamError;
//!
//! let error = StreamError::source("sensor returned no data");
//! if error.is_retryable() {
//!     // next tick may succeed, keep the schedule alive
//! }
//! ```

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Main error type for capture and streaming operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StreamError {
    #[error("failed to bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept a connection")]
    Accept {
        #[source]
        source: io::Error,
    },

    #[error("transmit to {peer} failed after {frames_sent} complete frames")]
    Transmit {
        peer: SocketAddr,
        frames_sent: u64,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {details}")]
    Config { details: String },

    #[error("frame source failed: {reason}")]
    Source { reason: String },
}

impl StreamError {
    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// A transmit failure kills the current session but a future connection
    /// can succeed; a source failure skips one tick. Bind, accept, and
    /// configuration failures are terminal to the process.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Bind { .. } => false,
            StreamError::Accept { .. } => false,
            StreamError::Transmit { .. } => true,
            StreamError::Config { .. } => false,
            StreamError::Source { .. } => true,
        }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        StreamError::Config { details: details.into() }
    }

    /// Helper constructor for frame source errors.
    pub fn source(reason: impl Into<String>) -> Self {
        StreamError::Source { reason: reason.into() }
    }

    /// Helper constructor for transmit errors with peer context.
    pub fn transmit(peer: SocketAddr, frames_sent: u64, source: io::Error) -> Self {
        StreamError::Transmit { peer, frames_sent, source }
    }
}
