//! Relay of the backend's stderr into host log events.
//!
//! The relay starts as soon as the backend is launched so a chatty boot can
//! never fill the pipe and stall the handshake. Until the boot completes it
//! also keeps the most recent lines, which become part of an initialisation
//! error if the handshake fails.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::notify::{HostEvent, LogLevel, Notifier};

const RELAY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::relay");

/// Lines of stderr retained while the backend boots.
pub(crate) const BOOT_TAIL_LINES: usize = 200;

type Tail = Arc<Mutex<Option<VecDeque<String>>>>;

/// A running stderr relay.
pub(crate) struct StderrRelay {
    handle: JoinHandle<()>,
    tail: Tail,
}

impl StderrRelay {
    /// Stops retaining lines; relaying continues until the stream closes.
    pub(crate) fn release_tail(&self) {
        *lock(&self.tail) = None;
    }

    /// Waits for the stream to close and returns the retained lines.
    ///
    /// Only call this once the backend has been stopped.
    #[must_use]
    pub(crate) fn finish(self) -> String {
        if self.handle.join().is_err() {
            tracing::debug!(target: RELAY_TARGET, "stderr relay panicked");
        }
        lock(&self.tail)
            .take()
            .map(|lines| Vec::from(lines).join("\n"))
            .unwrap_or_default()
    }
}

fn lock(tail: &Tail) -> MutexGuard<'_, Option<VecDeque<String>>> {
    tail.lock().unwrap_or_else(|poison| poison.into_inner())
}

/// Starts a thread that republishes each line of `stream` as a `Log` event.
///
/// The thread ends when the stream reaches end of file or fails.
pub(crate) fn spawn_relay<R>(stream: R, notifier: Arc<dyn Notifier>) -> io::Result<StderrRelay>
where
    R: Read + Send + 'static,
{
    let tail: Tail = Arc::new(Mutex::new(Some(VecDeque::new())));
    let retained = Arc::clone(&tail);
    let handle = thread::Builder::new()
        .name("dilens-stderr-relay".to_owned())
        .spawn(move || relay_lines(stream, notifier.as_ref(), &retained))?;
    Ok(StderrRelay { handle, tail })
}

fn relay_lines<R: Read>(stream: R, notifier: &dyn Notifier, tail: &Tail) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                let message = text.trim_end_matches(['\n', '\r']);
                retain(tail, message);
                notifier.notify(HostEvent::log(LogLevel::Log, message));
            }
            Err(error) => {
                tracing::debug!(target: RELAY_TARGET, %error, "stderr relay stopped");
                break;
            }
        }
    }
    tracing::debug!(target: RELAY_TARGET, "backend stderr closed");
}

fn retain(tail: &Tail, message: &str) {
    if let Some(lines) = lock(tail).as_mut() {
        if lines.len() == BOOT_TAIL_LINES {
            lines.pop_front();
        }
        lines.push_back(message.to_owned());
    }
}
