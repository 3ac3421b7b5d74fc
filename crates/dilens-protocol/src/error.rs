//! Error types for framing, message decoding and location parsing.

use std::io;

use thiserror::Error;

/// Errors raised while reading or writing a single frame.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The stream ended before a complete frame arrived.
    #[error("stream closed after {received} bytes of an incomplete frame")]
    Incomplete {
        /// Bytes of the current frame consumed before the stream ended.
        received: usize,
    },

    /// No `Content-Length` header was found within the allowed header blocks.
    #[error("no Content-Length header after {attempts} header blocks")]
    Empty {
        /// Number of header blocks inspected.
        attempts: usize,
    },

    /// The `Content-Length` value was not a decimal, or the header block was
    /// too large to hold one.
    #[error("invalid Content-Length header: {value}")]
    InvalidLength {
        /// The offending header value.
        value: String,
    },

    /// Any other I/O failure on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MessageError {
    /// Returns `true` when the peer closed the stream cleanly between frames.
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::Incomplete { received: 0 })
    }

    /// Returns `true` when the failure means the peer is already gone.
    #[must_use]
    pub fn is_broken_pipe(&self) -> bool {
        match self {
            Self::Io(error) => matches!(
                error.kind(),
                io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
            ),
            Self::Incomplete { .. } => true,
            Self::Empty { .. } | Self::InvalidLength { .. } => false,
        }
    }
}

/// Errors raised while exchanging JSON messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Framing failed.
    #[error(transparent)]
    Frame(#[from] MessageError),

    /// The payload was not the expected JSON document.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// The peer answered with an error response.
    #[error("remote error: {message}")]
    Remote {
        /// Error text sent by the peer.
        message: String,
    },

    /// A handshake response carried `null` instead of its value.
    #[error("handshake step '{step}' carried no value")]
    MissingHandshake {
        /// Which of the three handshake responses was empty.
        step: &'static str,
    },
}

impl ProtocolError {
    /// Returns `true` when the failure means the peer is already gone.
    #[must_use]
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, Self::Frame(error) if error.is_broken_pipe())
    }
}

/// Errors raised while parsing a `path:line` location.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationError {
    /// The text carried no `:line` suffix.
    #[error("location '{input}' has no line number")]
    MissingLine {
        /// The rejected text.
        input: String,
    },

    /// The line suffix was not a positive decimal.
    #[error("location '{input}' has an invalid line number")]
    InvalidLine {
        /// The rejected text.
        input: String,
    },

    /// The path component was empty.
    #[error("location '{input}' has an empty path")]
    EmptyPath {
        /// The rejected text.
        input: String,
    },
}
