//! Live client speaking the framed protocol to a backend.
//!
//! Correlation is by strict alternation: one mutex covers writing a request
//! and reading its response, so at most one exchange is in flight and every
//! caller reads the response to its own request.

use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use dilens_protocol::{
    AccessorMap, Handshake, KeysResult, LocationResult, Method, ProtocolError, Request, Response,
    read_message, write_message,
};

use crate::client::DependencyClient;
use crate::error::{InitializationError, RequestError};
use crate::notify::{HostEvent, LogLevel, Notifier};
use crate::supervisor::ChildProcess;

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::request_client");

/// Default wait for the backend to exit after `shutdown`.
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) type PipeReader = BufReader<Box<dyn Read + Send>>;
pub(crate) type PipeWriter = Box<dyn Write + Send>;

struct Pipe {
    reader: PipeReader,
    writer: PipeWriter,
}

impl Pipe {
    fn round_trip(&mut self, request: &Request) -> Result<Response, ProtocolError> {
        write_message(&mut self.writer, request)?;
        read_message(&mut self.reader)
    }
}

/// Client connected to a backend that has completed its handshake.
pub struct RequestClient {
    root: PathBuf,
    container_name: String,
    injection_name: String,
    pipe: Mutex<Option<Pipe>>,
    process: Mutex<Option<ChildProcess>>,
    notifier: Arc<dyn Notifier>,
    shutdown_grace: Duration,
    pipe_broken: AtomicBool,
    shut_down: AtomicBool,
}

impl RequestClient {
    /// Reads the handshake from `reader` and returns a client speaking over
    /// the given streams. No process is attached.
    ///
    /// # Errors
    ///
    /// Returns `InitializationError` when the handshake cannot be read.
    pub fn connect<R, W>(
        reader: R,
        writer: W,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, InitializationError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let mut buffered: PipeReader = BufReader::new(Box::new(reader));
        let handshake =
            Handshake::read_from(&mut buffered).map_err(|source| InitializationError {
                source,
                stderr: String::new(),
            })?;
        Ok(Self::from_handshake(
            &handshake,
            buffered,
            Box::new(writer),
            notifier,
        ))
    }

    pub(crate) fn from_handshake(
        handshake: &Handshake,
        reader: PipeReader,
        writer: PipeWriter,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        debug!(
            target: CLIENT_TARGET,
            root = %handshake.root,
            container = %handshake.container_name,
            injection = %handshake.injection_name,
            "backend handshake complete"
        );
        Self {
            root: PathBuf::from(&handshake.root),
            container_name: handshake.container_name.clone(),
            injection_name: handshake.injection_name.clone(),
            pipe: Mutex::new(Some(Pipe { reader, writer })),
            process: Mutex::new(None),
            notifier,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            pipe_broken: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Attaches the backend process so shutdown can stop it.
    #[must_use]
    pub(crate) fn with_process(self, process: ChildProcess) -> Self {
        *self
            .process
            .lock()
            .unwrap_or_else(|poison| poison.into_inner()) = Some(process);
        self
    }

    /// Sets how long shutdown waits for the backend to exit.
    #[must_use]
    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Sends one request and reads its response under the pipe lock.
    fn exchange(&self, request: &Request) -> Result<Response, RequestError> {
        let mut guard = self
            .pipe
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let pipe = guard.as_mut().ok_or(RequestError::Closed)?;
        debug!(target: CLIENT_TARGET, method = %request.method, "sending request");
        match pipe.round_trip(request) {
            Ok(response) => Ok(response),
            Err(error) => {
                if error.is_broken_pipe() {
                    warn!(target: CLIENT_TARGET, %error, "backend connection lost");
                    self.pipe_broken.store(true, Ordering::SeqCst);
                    *guard = None;
                }
                Err(error.into())
            }
        }
    }

    /// Performs a query; `None` on failure, `Some(None)` for a `null` result.
    fn ask<T: DeserializeOwned>(&self, request: &Request) -> Option<Option<T>> {
        let outcome = self
            .exchange(request)
            .and_then(|response| response.decode().map_err(RequestError::from));
        match outcome {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                self.report(&request.method, &error);
                None
            }
        }
    }

    fn report(&self, method: &str, failure: &RequestError) {
        if matches!(failure, RequestError::Closed) {
            debug!(target: CLIENT_TARGET, method, "request skipped on closed connection");
            return;
        }
        error!(target: CLIENT_TARGET, method, error = %failure, "backend request failed");
        self.notifier.notify(HostEvent::log(
            LogLevel::Error,
            format!("dilens: {method} failed: {failure}"),
        ));
    }

    fn take_process(&self) -> Option<ChildProcess> {
        self.process
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .take()
    }
}

impl DependencyClient for RequestClient {
    fn resolve_location(&self, key: &str) -> Option<String> {
        self.ask::<LocationResult>(&Request::dependency_location(key))
            .flatten()
            .map(|found| found.location)
    }

    fn resolve_accessors(&self, type_name: &str) -> Option<AccessorMap> {
        self.ask::<AccessorMap>(&Request::dependency_accessors(type_name))
            .flatten()
    }

    fn matching_keys(&self, prefix: &str) -> Option<Vec<String>> {
        self.ask::<KeysResult>(&Request::matching_dependency_keys(prefix))
            .map(|found| found.map_or_else(Vec::new, |result| result.keys))
    }

    fn trigger_reload(&self) {
        let request = Request::bare(Method::Reload);
        let outcome = self
            .exchange(&request)
            .and_then(|response| response.into_result().map_err(RequestError::from));
        if let Err(error) = outcome {
            self.report(&request.method, &error);
        }
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(target: CLIENT_TARGET, "shutting down backend");

        let mut pipe = self
            .pipe
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        if let Some(open) = pipe.as_mut()
            && let Err(error) = write_message(&mut open.writer, &Request::bare(Method::Shutdown))
        {
            debug!(target: CLIENT_TARGET, %error, "shutdown request not delivered");
            if error.is_broken_pipe() {
                self.pipe_broken.store(true, Ordering::SeqCst);
            }
        }

        let mut process = self.take_process();
        if let Some(child) = process.as_mut()
            && !self.pipe_broken.load(Ordering::SeqCst)
        {
            wait_for_exit(child, self.shutdown_grace);
        }
        *pipe = None;
        drop(pipe);

        if let Some(mut child) = process
            && child.is_alive()
        {
            warn!(
                target: CLIENT_TARGET,
                pid = child.id(),
                "backend still running after shutdown; killing it"
            );
            child.force_kill();
        }
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn container_name(&self) -> Option<&str> {
        Some(&self.container_name)
    }

    fn injection_name(&self) -> Option<&str> {
        Some(&self.injection_name)
    }

    fn is_ready(&self) -> bool {
        !self.shut_down.load(Ordering::SeqCst) && !self.pipe_broken.load(Ordering::SeqCst)
    }
}

impl Drop for RequestClient {
    fn drop(&mut self) {
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }
        if let Some(mut child) = self.take_process()
            && child.is_alive()
        {
            child.force_kill();
        }
    }
}

fn wait_for_exit(child: &mut ChildProcess, grace: Duration) {
    let deadline = Instant::now() + grace;
    while child.is_alive() && Instant::now() < deadline {
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}
