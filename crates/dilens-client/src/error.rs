//! Error types raised while booting and talking to the backend.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use dilens_protocol::ProtocolError;

/// Errors raised while starting the backend process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The workspace does not contain the backend marker.
    #[error("backend marker not found at {}", marker.display())]
    MarkerMissing {
        /// Absolute path that was probed.
        marker: PathBuf,
    },

    /// The configured launch command was empty.
    #[error("backend command is empty")]
    EmptyCommand,

    /// The backend process could not be spawned.
    #[error("failed to spawn backend '{command}': {source}")]
    SpawnFailed {
        /// Program that failed to start.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The child started without one of its standard streams.
    #[error("failed to capture backend {stream}")]
    MissingPipe {
        /// Name of the stream that was not captured.
        stream: &'static str,
    },
}

impl LaunchError {
    /// Returns `true` when the workspace simply does not host a backend.
    #[must_use]
    pub const fn is_marker_missing(&self) -> bool {
        matches!(self, Self::MarkerMissing { .. })
    }
}

/// The backend started but did not complete its handshake.
#[derive(Debug, Error)]
#[error("backend failed to initialise: {source}{}", stderr_suffix(.stderr))]
pub struct InitializationError {
    /// Framing or decoding failure seen during the handshake.
    #[source]
    pub source: ProtocolError,
    /// Whatever the backend wrote to stderr before it was stopped.
    pub stderr: String,
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{trimmed}")
    }
}

/// Errors surfaced by the boot sequence.
#[derive(Debug, Error)]
pub enum BootError {
    /// Launch failed.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// Handshake failed.
    #[error(transparent)]
    Initialization(#[from] InitializationError),

    /// The stderr relay thread could not be started.
    #[error("failed to start diagnostic relay: {source}")]
    Relay {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Failure of a single request/response exchange.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The connection was closed by shutdown or an earlier broken pipe.
    #[error("connection to backend is closed")]
    Closed,

    /// Framing, decoding or a remote error.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
