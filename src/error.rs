//! Error types for procwire-responsewriter.

use thiserror::Error;

/// Classification of a failure as seen by the caller of the response writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The remote call could not be completed.
    Transport,
    /// The broker could not establish a named sub-connection.
    Dial,
}

/// Main error type for all response writer operations.
#[derive(Debug, Error)]
pub enum ResponseWriterError {
    /// I/O error on the RPC connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (invalid frame, wrong flags, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The host answered the call with an error response.
    #[error("Remote error: {0}")]
    Remote(String),

    /// Connection closed before the reply arrived.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Backpressure timeout - write buffer full.
    #[error("Backpressure timeout")]
    BackpressureTimeout,

    /// The broker failed to dial a sub-connection.
    #[error("Failed to dial sub-connection {id}: {source}")]
    Dial {
        /// Sub-connection id from the hijack reply.
        id: u32,
        /// Underlying broker failure.
        #[source]
        source: std::io::Error,
    },
}

impl ResponseWriterError {
    /// Which of the two caller-visible failure kinds this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResponseWriterError::Dial { .. } => ErrorKind::Dial,
            _ => ErrorKind::Transport,
        }
    }

    /// Shorthand for `kind() == ErrorKind::Dial`.
    #[inline]
    pub fn is_dial(&self) -> bool {
        self.kind() == ErrorKind::Dial
    }
}

/// Result type alias using ResponseWriterError.
pub type Result<T> = std::result::Result<T, ResponseWriterError>;
