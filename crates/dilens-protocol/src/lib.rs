//! Wire protocol shared by the dilens client and the `dilensd` backend.
//!
//! Messages are JSON objects framed with a `Content-Length` header and carried
//! over the backend's stdin and stdout. There are no message identifiers: each
//! request is answered by exactly one response, in order. At startup the
//! backend writes three handshake responses before it reads any request.

mod error;
pub mod framing;
mod location;
mod message;

pub use error::{LocationError, MessageError, ProtocolError};
pub use framing::{
    MAX_HEADER_ATTEMPTS, MAX_HEADER_BYTES, MAX_PAYLOAD_BYTES, encode, read_frame, write_frame,
};
pub use location::SourceLocation;
pub use message::{
    AccessorMap, HANDSHAKE_OK, Handshake, KeyParams, KeysResult, LocationResult,
    MAX_MATCHING_KEYS, Method, NameParams, NameResult, Request, Response, RootResult,
    read_message, write_message,
};
