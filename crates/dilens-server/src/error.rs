//! Error types for request dispatch and container inspection.
//!
//! Every variant is isolated to the request that produced it: the dispatch
//! loop answers with `{"error": ...}` and keeps serving.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use dilens_protocol::MessageError;

/// Failures raised by a [`crate::ContainerInspector`].
#[derive(Debug, Error)]
pub enum InspectorError {
    /// The application has no live container to answer from.
    #[error("container is not ready: {reason}")]
    NotReady {
        /// Why the container is unavailable.
        reason: String,
    },

    /// The manifest could not be read.
    #[error("failed to read manifest {path}: {source}")]
    ManifestIo {
        /// Manifest location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The manifest is not valid JSON of the expected shape.
    #[error("failed to parse manifest {path}: {source}")]
    ManifestParse {
        /// Manifest location.
        path: Utf8PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The requested type is not known to the application.
    #[error("unknown type: {name}")]
    UnknownType {
        /// Type name as requested.
        name: String,
    },
}

impl InspectorError {
    /// Creates a not-ready error.
    #[must_use]
    pub fn not_ready(reason: impl Into<String>) -> Self {
        Self::NotReady {
            reason: reason.into(),
        }
    }

    /// Creates an unknown-type error.
    #[must_use]
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType { name: name.into() }
    }
}

/// Errors surfaced while handling a single request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The payload was not a request object.
    #[error("malformed request: {source}")]
    MalformedRequest {
        /// Decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The framing of the request was invalid.
    #[error("malformed frame: {0}")]
    Frame(#[source] MessageError),

    /// The method name is not recognised.
    #[error("unknown method: {method}")]
    UnknownMethod {
        /// Method as received.
        method: String,
    },

    /// The parameters do not match the method.
    #[error("invalid params for {method}: {source}")]
    InvalidParams {
        /// Method whose parameters failed to decode.
        method: String,
        /// Decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The inspector failed.
    #[error(transparent)]
    Inspector(#[from] InspectorError),

    /// The result could not be encoded.
    #[error("failed to encode result: {source}")]
    Encode {
        /// Encode error.
        #[source]
        source: serde_json::Error,
    },
}

impl DispatchError {
    /// Creates an unknown-method error.
    #[must_use]
    pub fn unknown_method(method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            method: method.into(),
        }
    }
}
