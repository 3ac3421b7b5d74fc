//! In-memory backends and stub clients shared by the client test suites.

use std::collections::BTreeMap;
use std::io::BufReader;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use serde_json::json;

use dilens_protocol::{AccessorMap, Handshake, Request, Response, read_frame, write_message};

use crate::client::DependencyClient;
use crate::notify::{ChannelNotifier, HostEvent};
use crate::request_client::RequestClient;

pub(crate) fn handshake_for(root: &str) -> Handshake {
    Handshake {
        root: root.to_owned(),
        container_name: "AppContainer".to_owned(),
        injection_name: "App::Deps".to_owned(),
    }
}

/// Raw request payloads seen by a fake backend, in arrival order.
pub(crate) type RequestLog = Arc<Mutex<Vec<String>>>;

/// Backend thread answering over one end of a socket pair.
pub(crate) struct FakeBackend {
    log: RequestLog,
    handle: Option<JoinHandle<()>>,
}

impl FakeBackend {
    pub(crate) fn log(&self) -> RequestLog {
        Arc::clone(&self.log)
    }

    /// Waits for the backend to see end of stream and returns its log.
    pub(crate) fn join(mut self) -> Vec<String> {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("fake backend panicked");
        }
        self.log.lock().expect("request log").clone()
    }
}

/// Connects a client to a fake backend. The responder returns `None` to
/// simulate a crash: the backend closes its end without answering.
pub(crate) fn connect<F>(
    handshake: &Handshake,
    responder: F,
) -> (RequestClient, FakeBackend, Receiver<HostEvent>)
where
    F: FnMut(&Request) -> Option<Response> + Send + 'static,
{
    let (client_end, server_end) = UnixStream::pair().expect("socket pair");
    let backend = spawn_backend(server_end, handshake.clone(), responder);
    let (notifier, events) = ChannelNotifier::new();
    let reader = client_end.try_clone().expect("clone client stream");
    let client = RequestClient::connect(reader, client_end, Arc::new(notifier)).expect("handshake");
    (client, backend, events)
}

pub(crate) fn spawn_backend<F>(
    stream: UnixStream,
    handshake: Handshake,
    mut responder: F,
) -> FakeBackend
where
    F: FnMut(&Request) -> Option<Response> + Send + 'static,
{
    let log: RequestLog = Arc::default();
    let thread_log = Arc::clone(&log);
    let handle = thread::spawn(move || {
        let mut writer = stream.try_clone().expect("clone backend stream");
        let mut reader = BufReader::new(stream);
        handshake.write_to(&mut writer).expect("write handshake");
        while let Ok(payload) = read_frame(&mut reader) {
            let text = String::from_utf8(payload).expect("utf-8 request");
            let request: Request = serde_json::from_str(&text).expect("request json");
            thread_log.lock().expect("request log").push(text);
            let Some(response) = responder(&request) else {
                break;
            };
            if write_message(&mut writer, &response).is_err() {
                break;
            }
        }
    });
    FakeBackend {
        log,
        handle: Some(handle),
    }
}

/// Answers like a small application rooted at `root` with a fixed key set.
pub(crate) fn application_responder(
    root: &str,
) -> impl FnMut(&Request) -> Option<Response> + Send + 'static {
    let root = root.to_owned();
    let keys = ["logger", "login", "metrics"];
    move |request| {
        let params = request.params.clone().unwrap_or_default();
        let key = params.get("key").and_then(|value| value.as_str()).unwrap_or_default().to_owned();
        let response = match request.method.as_str() {
            "dependencyLocation" if keys.contains(&key.as_str()) => {
                Response::Result(json!({ "location": format!("{root}/lib/{key}.rb:3") }))
            }
            "dependencyLocation" => Response::ack(),
            "matchingDependencyKeys" if key.is_empty() => Response::ack(),
            "matchingDependencyKeys" => {
                let matching: Vec<&str> = keys
                    .iter()
                    .copied()
                    .filter(|candidate| candidate.starts_with(&key))
                    .collect();
                Response::Result(json!({ "keys": matching }))
            }
            "dependencyAccessors" => Response::Result(json!({
                "logger": format!("{root}/lib/logger.rb:3"),
                "clock": null,
            })),
            "reload" | "shutdown" => Response::ack(),
            other => Response::error(format!("unknown method: {other}")),
        };
        Some(response)
    }
}

/// Scripted client used where no protocol traffic is needed.
#[derive(Debug, Default)]
pub(crate) struct StubClient {
    root: PathBuf,
    locations: BTreeMap<String, String>,
    reloads: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl StubClient {
    pub(crate) fn new(root: &str) -> Self {
        Self {
            root: PathBuf::from(root),
            locations: BTreeMap::from([(
                "logger".to_owned(),
                format!("{root}/lib/logger.rb:3"),
            )]),
            ..Self::default()
        }
    }

    pub(crate) fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    pub(crate) fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl DependencyClient for StubClient {
    fn resolve_location(&self, key: &str) -> Option<String> {
        self.locations.get(key).cloned()
    }

    fn resolve_accessors(&self, _type_name: &str) -> Option<AccessorMap> {
        None
    }

    fn matching_keys(&self, prefix: &str) -> Option<Vec<String>> {
        Some(
            self.locations
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect(),
        )
    }

    fn trigger_reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn container_name(&self) -> Option<&str> {
        Some("AppContainer")
    }

    fn injection_name(&self) -> Option<&str> {
        Some("App::Deps")
    }

    fn is_ready(&self) -> bool {
        self.shutdowns() == 0
    }
}
