//! Shared helpers for dispatch tests.

use std::io::Cursor;

use serde_json::{Value, json};

use dilens_protocol::{AccessorMap, Handshake, Request, Response, encode, read_message};

use crate::inspector::MockContainerInspector;
use crate::prefix::keys_with_prefix;

pub(super) const APPLICATION_KEYS: [&str; 3] = ["logger", "login", "metrics"];

/// Frames each request into one input stream.
pub(super) fn input(requests: &[Request]) -> Cursor<Vec<u8>> {
    let mut bytes = Vec::new();
    for request in requests {
        let payload = serde_json::to_vec(request).expect("serialise request");
        bytes.extend(encode(&payload));
    }
    Cursor::new(bytes)
}

/// Frames raw payload bytes into one input stream.
pub(super) fn raw_input(payloads: &[&[u8]]) -> Cursor<Vec<u8>> {
    Cursor::new(payloads.iter().flat_map(|payload| encode(payload)).collect())
}

pub(super) fn request(method: &str, params: Value) -> Request {
    Request {
        method: method.to_owned(),
        params: Some(params),
    }
}

/// Splits server output into its handshake and the responses that follow.
pub(super) fn split_output(output: &[u8]) -> (Handshake, Vec<Response>) {
    let mut reader = Cursor::new(output);
    let handshake = Handshake::read_from(&mut reader).expect("handshake");
    (handshake, read_responses(&mut reader))
}

pub(super) fn read_responses(reader: &mut Cursor<&[u8]>) -> Vec<Response> {
    let mut responses = Vec::new();
    while usize::try_from(reader.position()).expect("position fits") < reader.get_ref().len() {
        responses.push(read_message(reader).expect("response"));
    }
    responses
}

pub(super) fn location_result(location: &str) -> Response {
    Response::Result(json!({ "location": location }))
}

/// A mock answering like an application rooted at `/app`.
pub(super) fn application_inspector() -> MockContainerInspector {
    let mut inspector = MockContainerInspector::new();
    inspector.expect_root().returning(|| "/app".to_owned());
    inspector
        .expect_container_name()
        .returning(|| "AppContainer".to_owned());
    inspector
        .expect_injection_name()
        .returning(|| "App::Deps".to_owned());
    inspector.expect_locate().returning(|key| {
        Ok(APPLICATION_KEYS
            .contains(&key)
            .then(|| format!("/app/lib/{key}.rb:3")))
    });
    inspector.expect_accessors_of().returning(|name| {
        let accessors = match name {
            "UsersController" => AccessorMap::from([
                ("logger".to_owned(), Some("/app/lib/logger.rb:3".to_owned())),
                ("audit".to_owned(), None),
            ]),
            _ => AccessorMap::new(),
        };
        Ok(Some(accessors))
    });
    inspector
        .expect_keys_with_prefix()
        .returning(|prefix, limit| Ok(keys_with_prefix(&APPLICATION_KEYS, prefix, limit)));
    inspector
}
