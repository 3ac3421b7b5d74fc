//! The request loop served on the backend's stdin and stdout.
//!
//! After the handshake the server alternates strictly: read one frame,
//! dispatch it, write one response. Failures are isolated to the request
//! that caused them and answered with `{"error": ...}`.

use std::io::{BufRead, Write};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use dilens_protocol::{
    Handshake, KeyParams, KeysResult, LocationResult, MAX_MATCHING_KEYS, MessageError, Method,
    NameParams, ProtocolError, Request, Response, read_frame, write_message,
};

use crate::error::DispatchError;
use crate::inspector::ContainerInspector;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Serves protocol requests against a [`ContainerInspector`].
#[derive(Debug)]
pub struct DispatchServer<I> {
    inspector: I,
    running: bool,
}

impl<I: ContainerInspector> DispatchServer<I> {
    /// Creates a server answering from `inspector`.
    #[must_use]
    pub const fn new(inspector: I) -> Self {
        Self {
            inspector,
            running: false,
        }
    }

    /// The values announced at startup.
    #[must_use]
    pub fn handshake(&self) -> Handshake {
        Handshake {
            root: self.inspector.root(),
            container_name: self.inspector.container_name(),
            injection_name: self.inspector.injection_name(),
        }
    }

    /// Writes the handshake, then serves requests until shutdown or EOF.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake or a response cannot be written, or
    /// if reading from `reader` fails with an I/O error.
    pub fn serve<R, W>(&mut self, reader: &mut R, writer: &mut W) -> Result<(), ProtocolError>
    where
        R: BufRead + ?Sized,
        W: Write + ?Sized,
    {
        self.handshake().write_to(writer)?;
        debug!(target: DISPATCH_TARGET, "handshake sent");
        self.run(reader, writer)
    }

    /// Serves requests until a `shutdown` request or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if a response cannot be written or if reading from
    /// `reader` fails with an I/O error.
    pub fn run<R, W>(&mut self, reader: &mut R, writer: &mut W) -> Result<(), ProtocolError>
    where
        R: BufRead + ?Sized,
        W: Write + ?Sized,
    {
        self.running = true;
        while self.running {
            let response = match read_frame(reader) {
                Ok(payload) => self.handle_payload(&payload),
                Err(frame_error) if frame_error.is_end_of_stream() => {
                    debug!(target: DISPATCH_TARGET, "input closed");
                    break;
                }
                Err(frame_error @ MessageError::Io(_)) => return Err(frame_error.into()),
                Err(frame_error) => reject(&DispatchError::Frame(frame_error)),
            };
            write_message(writer, &response)?;
        }
        debug!(target: DISPATCH_TARGET, "dispatch loop finished");
        Ok(())
    }

    /// Whether the loop is serving and has not been asked to shut down.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Answers one decoded request.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown methods, invalid parameters and
    /// inspector failures.
    pub fn handle(&mut self, request: &Request) -> Result<Response, DispatchError> {
        let method = Method::from_str(&request.method)
            .map_err(|_| DispatchError::unknown_method(&request.method))?;
        debug!(target: DISPATCH_TARGET, %method, "dispatching request");
        match method {
            Method::DependencyLocation => {
                let params: KeyParams = decode_params(request)?;
                let location = self
                    .inspector
                    .locate(&params.key)?
                    .map(|location| LocationResult { location });
                encode(&location)
            }
            Method::DependencyAccessors => {
                let params: NameParams = decode_params(request)?;
                let accessors = self
                    .inspector
                    .accessors_of(&params.name)?
                    .filter(|accessors| !accessors.is_empty());
                encode(&accessors)
            }
            Method::MatchingDependencyKeys => {
                let params: KeyParams = decode_params(request)?;
                if params.key.is_empty() {
                    return Ok(Response::ack());
                }
                let keys = self
                    .inspector
                    .keys_with_prefix(&params.key, MAX_MATCHING_KEYS)?;
                encode(&KeysResult { keys })
            }
            Method::Reload => {
                if let Err(reload_error) = self.inspector.reload_runtime() {
                    warn!(target: DISPATCH_TARGET, error = %reload_error, "reload failed");
                }
                Ok(Response::ack())
            }
            Method::Shutdown => {
                self.running = false;
                Ok(Response::ack())
            }
            Method::ContainerName => encode(&self.inspector.container_name()),
            Method::InjectionName => encode(&self.inspector.injection_name()),
        }
    }

    fn handle_payload(&mut self, payload: &[u8]) -> Response {
        let outcome = serde_json::from_slice::<Request>(payload)
            .map_err(|source| DispatchError::MalformedRequest { source })
            .and_then(|request| self.handle(&request));
        outcome.unwrap_or_else(|dispatch_error| reject(&dispatch_error))
    }
}

fn decode_params<T: DeserializeOwned>(request: &Request) -> Result<T, DispatchError> {
    request
        .params()
        .map_err(|source| DispatchError::InvalidParams {
            method: request.method.clone(),
            source,
        })
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Response, DispatchError> {
    Response::result(value).map_err(|source| DispatchError::Encode { source })
}

fn reject(dispatch_error: &DispatchError) -> Response {
    error!(target: DISPATCH_TARGET, error = %dispatch_error, "request failed");
    Response::error(dispatch_error.to_string())
}
