//! The error taxonomy shared by every Deferred, transport and reactor
//! operation in this crate.

use std::io;
use thiserror::Error;

/// Unified error type produced by reactor and transport operations.
#[derive(Error, Debug)]
pub enum ReactorCoreError {
    /// Operation attempted on a transport that has already been closed,
    /// or an operation still pending when `close()` was called.
    #[error("transport closed")]
    TransportClosed,

    /// `read_exactly` (or a bound transport write) hit the end of the
    /// stream short of the requested amount. Carries whatever partial
    /// data had already been accumulated.
    #[error("end of stream, {} partial bytes", partial.len())]
    EndOfStream {
        /// Bytes successfully read (or about to be written) before EOF.
        partial: Vec<u8>,
    },

    /// An incoming packet declared a length exceeding the configured
    /// maximum.
    #[error("packet length {length} exceeds maximum {max}")]
    PacketTooLong {
        /// Declared payload length from the wire header.
        length: u32,
        /// Configured maximum accepted length.
        max: u32,
    },

    /// A reactor-level invariant was violated: a registration conflict
    /// or a fatal error from the readiness multiplexer.
    #[error("reactor error: {0}")]
    Reactor(String),

    /// A programming error: double-resolution of a `Deferred`, or a
    /// similar misuse of the API that is never expected at runtime.
    #[error("programming error: {0}")]
    Programming(&'static str),

    /// A decode/encode error surfaced by a codec transport under a
    /// strict error policy.
    #[error("codec error: {0}")]
    Codec(String),

    /// Any OS-level failure that doesn't fit the categories above.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ReactorCoreError {
    /// Whether this error represents a closed transport.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::TransportClosed)
    }
}

impl Clone for ReactorCoreError {
    /// Deferreds may be subscribed to multiple times, and each
    /// subscriber needs its own copy of a stored error. `io::Error`
    /// does not implement `Clone`, so it is round-tripped through its
    /// kind and message.
    fn clone(&self) -> Self {
        match self {
            Self::TransportClosed => Self::TransportClosed,
            Self::EndOfStream { partial } => Self::EndOfStream {
                partial: partial.clone(),
            },
            Self::PacketTooLong { length, max } => Self::PacketTooLong {
                length: *length,
                max: *max,
            },
            Self::Reactor(msg) => Self::Reactor(msg.clone()),
            Self::Programming(msg) => Self::Programming(msg),
            Self::Codec(msg) => Self::Codec(msg.clone()),
            Self::Io(err) => Self::Io(io::Error::new(err.kind(), err.to_string())),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactorCoreError>;
