//! Unit tests for request dispatch against a mocked inspector.

use std::io::Cursor;

use rstest::{fixture, rstest};
use serde_json::{Value, json};

use dilens_protocol::{Method, Request, Response, encode};

use super::support::{
    application_inspector, input, location_result, raw_input, read_responses, request,
    split_output,
};
use crate::dispatch::DispatchServer;
use crate::error::InspectorError;
use crate::inspector::MockContainerInspector;

#[fixture]
fn inspector() -> MockContainerInspector {
    application_inspector()
}

fn serve(inspector: MockContainerInspector, requests: &[Request]) -> Vec<Response> {
    let mut server = DispatchServer::new(inspector);
    let mut output = Vec::new();
    server
        .serve(&mut input(requests), &mut output)
        .expect("serve");
    let (_, responses) = split_output(&output);
    responses
}

#[rstest]
fn handshake_precedes_the_first_response(inspector: MockContainerInspector) {
    let mut server = DispatchServer::new(inspector);
    let mut output = Vec::new();

    server
        .serve(&mut input(&[Request::dependency_location("logger")]), &mut output)
        .expect("serve");

    let (handshake, responses) = split_output(&output);
    assert_eq!(handshake.root, "/app");
    assert_eq!(handshake.container_name, "AppContainer");
    assert_eq!(handshake.injection_name, "App::Deps");
    assert_eq!(responses, vec![location_result("/app/lib/logger.rb:3")]);
}

#[rstest]
#[case(Request::dependency_location("logger"), location_result("/app/lib/logger.rb:3"))]
#[case(Request::dependency_location("mailer"), Response::ack())]
#[case(
    Request::matching_dependency_keys("log"),
    Response::Result(json!({ "keys": ["logger", "login"] }))
)]
#[case(
    Request::matching_dependency_keys("zzz"),
    Response::Result(json!({ "keys": [] }))
)]
#[case(Request::matching_dependency_keys(""), Response::ack())]
#[case(
    Request::dependency_accessors("UsersController"),
    Response::Result(json!({ "audit": null, "logger": "/app/lib/logger.rb:3" }))
)]
#[case(Request::dependency_accessors("PlainObject"), Response::ack())]
#[case(
    Request::bare(Method::ContainerName),
    Response::Result(Value::from("AppContainer"))
)]
#[case(
    Request::bare(Method::InjectionName),
    Response::Result(Value::from("App::Deps"))
)]
fn answers_queries(
    inspector: MockContainerInspector,
    #[case] query: Request,
    #[case] expected: Response,
) {
    let mut server = DispatchServer::new(inspector);

    let response = server.handle(&query).expect("handled");

    assert_eq!(response, expected);
}

#[rstest]
fn every_request_gets_exactly_one_response(mut inspector: MockContainerInspector) {
    let requests = [
        Request::dependency_location("logger"),
        request("frobnicate", json!({})),
        Request::bare(Method::Reload),
        Request::matching_dependency_keys("m"),
        request("dependencyLocation", json!({})),
    ];
    inspector.expect_reload_runtime().times(1).returning(|| Ok(()));

    let responses = serve(inspector, &requests);

    assert_eq!(responses.len(), requests.len());
    assert!(matches!(
        responses.get(1),
        Some(Response::Error(message)) if message.contains("unknown method: frobnicate")
    ));
    assert_eq!(responses.get(2), Some(&Response::ack()));
    assert!(matches!(
        responses.get(4),
        Some(Response::Error(message))
            if message.contains("invalid params for dependencyLocation")
    ));
}

#[rstest]
fn malformed_payloads_are_answered_and_skipped(inspector: MockContainerInspector) {
    let location = serde_json::to_vec(&Request::dependency_location("metrics")).expect("json");
    let mut server = DispatchServer::new(inspector);
    let mut output = Vec::new();

    let payloads = [b"{ not json".as_slice(), b"[1, 2]".as_slice(), &location];

    server.serve(&mut raw_input(&payloads), &mut output).expect("serve");

    let (_, responses) = split_output(&output);
    assert_eq!(responses.len(), 3);
    assert!(matches!(
        responses.first(),
        Some(Response::Error(message)) if message.starts_with("malformed request")
    ));
    assert!(matches!(responses.get(1), Some(Response::Error(_))));
    assert_eq!(responses.get(2), Some(&location_result("/app/lib/metrics.rb:3")));
}

#[rstest]
fn inspector_failures_are_isolated() {
    let mut inspector = MockContainerInspector::new();
    inspector.expect_root().returning(|| "/app".to_owned());
    inspector.expect_container_name().returning(|| "C".to_owned());
    inspector.expect_injection_name().returning(|| "I".to_owned());
    inspector
        .expect_locate()
        .returning(|_| Err(InspectorError::not_ready("container not finalized")));
    inspector
        .expect_accessors_of()
        .returning(|name| Err(InspectorError::unknown_type(name)));

    let responses = serve(
        inspector,
        &[
            Request::dependency_location("logger"),
            Request::dependency_accessors("Nope"),
            Request::bare(Method::ContainerName),
        ],
    );

    assert_eq!(
        responses,
        vec![
            Response::error("container is not ready: container not finalized"),
            Response::error("unknown type: Nope"),
            Response::Result(Value::from("C")),
        ]
    );
}

#[rstest]
fn failed_reload_is_still_acknowledged(mut inspector: MockContainerInspector) {
    inspector
        .expect_reload_runtime()
        .times(1)
        .returning(|| Err(InspectorError::not_ready("boot failed")));

    let responses = serve(
        inspector,
        &[
            Request::bare(Method::Reload),
            Request::dependency_location("logger"),
        ],
    );

    assert_eq!(
        responses,
        vec![Response::ack(), location_result("/app/lib/logger.rb:3")]
    );
}

#[rstest]
fn shutdown_acknowledges_and_stops_reading(inspector: MockContainerInspector) {
    let mut server = DispatchServer::new(inspector);
    let mut output = Vec::new();
    let mut reader = input(&[
        Request::bare(Method::Shutdown),
        Request::dependency_location("logger"),
    ]);

    server.serve(&mut reader, &mut output).expect("serve");

    let (_, responses) = split_output(&output);
    assert_eq!(responses, vec![Response::ack()]);
    assert!(!server.is_running());
    assert!(
        usize::try_from(reader.position()).expect("position fits") < reader.get_ref().len(),
        "the request after shutdown must stay unread"
    );
}

#[rstest]
fn end_of_input_ends_the_loop_cleanly(inspector: MockContainerInspector) {
    let responses = serve(inspector, &[]);

    assert!(responses.is_empty());
}

#[rstest]
#[case(b"Content-Length: nope\r\n\r\n".as_slice())]
#[case(b"X-Other: 1\r\n\r\nX-Other: 2\r\n\r\nX-Other: 3\r\n\r\nX-Other: 4\r\n\r\n".as_slice())]
#[case(b"Content-Length: 40\r\n\r\n{\"method\"".as_slice())]
fn framing_errors_are_answered_before_the_loop_ends(
    inspector: MockContainerInspector,
    #[case] bytes: &[u8],
) {
    let mut server = DispatchServer::new(inspector);
    let mut output = Vec::new();

    server
        .run(&mut Cursor::new(bytes.to_vec()), &mut output)
        .expect("run");

    let responses = read_responses(&mut Cursor::new(output.as_slice()));
    assert_eq!(responses.len(), 1);
    assert!(matches!(
        responses.first(),
        Some(Response::Error(message)) if message.starts_with("malformed frame")
    ));
}

#[rstest]
#[case(b"Content-Length: 18446744073709551615\r\n\r\n".as_slice())]
#[case(b"Content-Length: nope\r\nX-Trailer: 1\r\n\r\n".as_slice())]
fn rejected_lengths_do_not_desynchronise_later_requests(
    inspector: MockContainerInspector,
    #[case] bad_frame: &[u8],
) {
    let location = serde_json::to_vec(&Request::dependency_location("logger")).expect("json");
    let mut bytes = bad_frame.to_vec();
    bytes.extend_from_slice(&encode(&location));
    let mut server = DispatchServer::new(inspector);
    let mut output = Vec::new();

    server.run(&mut Cursor::new(bytes), &mut output).expect("run");

    let responses = read_responses(&mut Cursor::new(output.as_slice()));
    assert_eq!(responses.len(), 2);
    assert!(matches!(responses.first(), Some(Response::Error(_))));
    assert_eq!(responses.get(1), Some(&location_result("/app/lib/logger.rb:3")));
}
