//! Request, response and handshake payloads.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::error::ProtocolError;
use crate::framing::{read_frame, write_frame};

/// Upper bound on the keys returned for a prefix query.
pub const MAX_MATCHING_KEYS: usize = 5;

/// Status carried by the first handshake response.
pub const HANDSHAKE_OK: &str = "ok";

/// Accessor name to source location for one injected type.
pub type AccessorMap = BTreeMap<String, Option<String>>;

/// Methods understood by the backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "camelCase")]
pub enum Method {
    /// Source location of a registered dependency key.
    DependencyLocation,
    /// Accessors injected into a type, with their locations.
    DependencyAccessors,
    /// Registered keys sharing a prefix.
    MatchingDependencyKeys,
    /// Reload the application runtime.
    Reload,
    /// Stop serving after acknowledging.
    Shutdown,
    /// Name of the container constant.
    ContainerName,
    /// Name of the injection mixin.
    InjectionName,
}

/// A request sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Method name in camel case.
    pub method: String,
    /// Method parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Creates a request for `method` with the given parameter object.
    #[must_use]
    pub fn new(method: Method, params: Value) -> Self {
        Self {
            method: method.to_string(),
            params: Some(params),
        }
    }

    /// Creates a request whose parameter object is empty.
    #[must_use]
    pub fn bare(method: Method) -> Self {
        Self::new(method, json!({}))
    }

    /// `dependencyLocation` for a full key.
    #[must_use]
    pub fn dependency_location(key: &str) -> Self {
        Self::new(Method::DependencyLocation, json!({ "key": key }))
    }

    /// `dependencyAccessors` for a type name.
    #[must_use]
    pub fn dependency_accessors(name: &str) -> Self {
        Self::new(Method::DependencyAccessors, json!({ "name": name }))
    }

    /// `matchingDependencyKeys` for a key prefix.
    #[must_use]
    pub fn matching_dependency_keys(prefix: &str) -> Self {
        Self::new(Method::MatchingDependencyKeys, json!({ "key": prefix }))
    }

    /// Deserialises the parameter object into `T`.
    ///
    /// # Errors
    ///
    /// Returns an error when the parameters are absent or do not match `T`.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.params.clone().unwrap_or(Value::Null))
    }
}

/// A response from the backend: exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Response {
    /// Successful answer; `null` for "nothing found" and acknowledgments.
    Result(Value),
    /// Failure description.
    Error(String),
}

impl Response {
    /// The `{"result": null}` acknowledgment.
    #[must_use]
    pub const fn ack() -> Self {
        Self::Result(Value::Null)
    }

    /// Serialises `value` into a successful response.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be represented as JSON.
    pub fn result<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Result)
    }

    /// Builds an error response.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Converts the response into its result, or the remote error.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Remote` for error responses.
    pub fn into_result(self) -> Result<Value, ProtocolError> {
        match self {
            Self::Result(value) => Ok(value),
            Self::Error(message) => Err(ProtocolError::Remote { message }),
        }
    }

    /// Decodes the result into `T`, mapping `null` to `None`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Remote` for error responses and
    /// `ProtocolError::Json` when the result does not match `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Option<T>, ProtocolError> {
        match self.into_result()? {
            Value::Null => Ok(None),
            value => Ok(Some(serde_json::from_value(value)?)),
        }
    }
}

/// Parameters naming a dependency key or key prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyParams {
    /// Full key or prefix.
    pub key: String,
}

/// Parameters naming a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameParams {
    /// Type name as written in source.
    pub name: String,
}

/// Result of `dependencyLocation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationResult {
    /// `path:line` of the registration.
    pub location: String,
}

/// Result of `matchingDependencyKeys`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysResult {
    /// Matching keys in sorted order.
    pub keys: Vec<String>,
}

/// First handshake response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootResult {
    /// Always [`HANDSHAKE_OK`].
    pub message: String,
    /// Application root directory.
    pub root: String,
}

/// Second and third handshake responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameResult {
    /// The announced name.
    pub name: String,
}

/// Values the backend announces before serving requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Application root directory.
    pub root: String,
    /// Name of the container constant.
    pub container_name: String,
    /// Name of the injection mixin.
    pub injection_name: String,
}

impl Handshake {
    /// Writes the three handshake responses in order.
    ///
    /// # Errors
    ///
    /// Returns an error if a response cannot be written.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), ProtocolError> {
        let root = RootResult {
            message: HANDSHAKE_OK.to_owned(),
            root: self.root.clone(),
        };
        write_message(writer, &Response::result(&root)?)?;
        for name in [&self.container_name, &self.injection_name] {
            let payload = NameResult { name: name.clone() };
            write_message(writer, &Response::result(&payload)?)?;
        }
        Ok(())
    }

    /// Reads the three handshake responses in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream closes, a frame is malformed, or any
    /// response is an error or lacks its expected field.
    pub fn read_from<R: BufRead + ?Sized>(reader: &mut R) -> Result<Self, ProtocolError> {
        let root: RootResult = read_handshake_value(reader, "root")?;
        let container: NameResult = read_handshake_value(reader, "container name")?;
        let injection: NameResult = read_handshake_value(reader, "injection name")?;
        Ok(Self {
            root: root.root,
            container_name: container.name,
            injection_name: injection.name,
        })
    }
}

fn read_handshake_value<R: BufRead + ?Sized, T: DeserializeOwned>(
    reader: &mut R,
    step: &'static str,
) -> Result<T, ProtocolError> {
    let response: Response = read_message(reader)?;
    response
        .decode()?
        .ok_or(ProtocolError::MissingHandshake { step })
}

/// Serialises `message` as JSON and writes it as one frame.
///
/// # Errors
///
/// Returns an error if serialisation or the write fails.
pub fn write_message<W: Write + ?Sized, T: Serialize>(
    writer: &mut W,
    message: &T,
) -> Result<(), ProtocolError> {
    let payload = serde_json::to_vec(message)?;
    write_frame(writer, &payload)?;
    Ok(())
}

/// Reads one frame and deserialises it from JSON.
///
/// # Errors
///
/// Returns an error if framing fails or the payload is not a valid `T`.
pub fn read_message<R: BufRead + ?Sized, T: DeserializeOwned>(
    reader: &mut R,
) -> Result<T, ProtocolError> {
    let payload = read_frame(reader)?;
    Ok(serde_json::from_slice(&payload)?)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn location_request_has_exact_wire_form() {
        let request = Request::dependency_location("logger");

        let json = serde_json::to_string(&request).expect("serialise");

        assert_eq!(
            json,
            r#"{"method":"dependencyLocation","params":{"key":"logger"}}"#
        );
    }

    #[rstest]
    #[case(Method::MatchingDependencyKeys, "matchingDependencyKeys")]
    #[case(Method::ContainerName, "containerName")]
    #[case(Method::Reload, "reload")]
    fn method_names_are_camel_case(#[case] method: Method, #[case] expected: &str) {
        assert_eq!(method.as_ref(), expected);
        assert_eq!(expected.parse::<Method>().ok(), Some(method));
    }

    #[rstest]
    fn bare_requests_carry_empty_params() {
        let json = serde_json::to_string(&Request::bare(Method::Shutdown)).expect("serialise");

        assert_eq!(json, r#"{"method":"shutdown","params":{}}"#);
    }

    #[rstest]
    fn missing_params_fail_to_decode() {
        let request: Request = serde_json::from_str(r#"{"method":"dependencyLocation"}"#)
            .expect("requests without params parse");

        assert!(request.params::<KeyParams>().is_err());
    }

    #[rstest]
    #[case(Response::ack(), r#"{"result":null}"#)]
    #[case(Response::error("boom"), r#"{"error":"boom"}"#)]
    fn responses_carry_exactly_one_key(#[case] response: Response, #[case] expected: &str) {
        let json = serde_json::to_string(&response).expect("serialise");

        assert_eq!(json, expected);
        let parsed: Response = serde_json::from_str(expected).expect("parse");
        assert_eq!(parsed, response);
    }

    #[rstest]
    fn null_results_decode_to_none() {
        let decoded: Option<LocationResult> = Response::ack().decode().expect("decode");

        assert!(decoded.is_none());
    }

    #[rstest]
    fn error_responses_surface_as_remote_errors() {
        let error = Response::error("no container")
            .decode::<KeysResult>()
            .expect_err("error response");

        assert!(matches!(error, ProtocolError::Remote { message } if message == "no container"));
    }

    #[rstest]
    fn handshake_reads_back_what_was_written() {
        let handshake = Handshake {
            root: "/app".to_owned(),
            container_name: "AppContainer".to_owned(),
            injection_name: "App::Deps".to_owned(),
        };
        let mut buffer = Vec::new();
        handshake.write_to(&mut buffer).expect("write handshake");

        let text = String::from_utf8(buffer.clone()).expect("utf8");
        assert!(text.starts_with(
            "Content-Length: 41\r\n\r\n{\"result\":{\"message\":\"ok\",\"root\":\"/app\"}}"
        ));
        let read = Handshake::read_from(&mut Cursor::new(buffer)).expect("read handshake");
        assert_eq!(read, handshake);
    }

    #[rstest]
    fn mismatched_handshake_is_an_error() {
        let mut buffer = Vec::new();
        let name = NameResult {
            name: "AppContainer".to_owned(),
        };
        write_message(&mut buffer, &Response::result(&name).expect("value")).expect("write");

        let error = Handshake::read_from(&mut Cursor::new(buffer)).expect_err("root is missing");

        assert!(matches!(error, ProtocolError::Json(_)));
    }
}
