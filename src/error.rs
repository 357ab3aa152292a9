//! Crate-level error types
//!
//! `Error` is the top-level error returned by broker and client entry points.
//! Wire-level problems are carried by `WireError` so callers can tell a
//! malformed packet (dropped, per protocol) from a real I/O failure.

use std::io;

/// Convenience result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed or oversized wire data
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Invalid launch or runtime configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors produced while decoding datagrams and stream frames
///
/// Datagram decode errors are dropped silently by the broker (publishers are
/// unreliable); stream decode errors terminate the offending connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// Payload shorter than the declared layout
    #[error("truncated message: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    /// Type tag outside the known set
    #[error("unknown type tag {0:#04x}")]
    UnknownTag(u8),

    /// Topic or identity field is not valid UTF-8 or contains path characters
    #[error("invalid name field")]
    InvalidName,

    /// Declared length exceeds the protocol maximum
    #[error("oversized payload: {len} bytes exceeds {max}")]
    Oversized { len: usize, max: usize },
}
