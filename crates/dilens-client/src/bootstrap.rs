//! Bootstrap coordination between the host and the backend.
//!
//! A [`Coordinator`] exposes a [`PlaceholderClient`] from construction. Its
//! boot thread waits for [`Coordinator::activate`], launches the backend,
//! reads the handshake, and then swaps the live [`RequestClient`] into the
//! slot. Failures leave the placeholder in place for the rest of the session.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use strum::Display;
use tracing::{debug, error, info, warn};

use dilens_protocol::Handshake;

use crate::client::DependencyClient;
use crate::error::{BootError, InitializationError, LaunchError};
use crate::notify::{HostEvent, LogLevel, Notifier};
use crate::placeholder::PlaceholderClient;
use crate::relay::spawn_relay;
use crate::request_client::{PipeReader, RequestClient};
use crate::settings::ClientSettings;
use crate::supervisor::{self, ChildStreams};
use crate::watch::requires_reload;

const BOOT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Lifecycle of the client slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum BootState {
    /// The placeholder is exposed and the boot has not finished.
    Pending,
    /// A live client is exposed.
    Ready,
    /// Boot failed or was abandoned; the placeholder stays exposed.
    Failed,
}

/// What the host supplies when it is ready for the backend to start.
#[derive(Clone)]
pub struct Activation {
    workspace_root: PathBuf,
    notifier: Arc<dyn Notifier>,
}

impl Activation {
    /// Creates an activation for `workspace_root`.
    #[must_use]
    pub fn new(workspace_root: impl Into<PathBuf>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            notifier,
        }
    }

    /// Directory the backend runs in.
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Channel for host-visible events.
    #[must_use]
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }
}

/// Produces a live client for an activated workspace.
pub trait Booter: Send + 'static {
    /// Launches and connects to the backend.
    ///
    /// # Errors
    ///
    /// Returns `BootError` when the backend cannot be started or does not
    /// complete its handshake.
    fn boot(&self, activation: &Activation) -> Result<Arc<dyn DependencyClient>, BootError>;
}

impl<F> Booter for F
where
    F: Fn(&Activation) -> Result<Arc<dyn DependencyClient>, BootError> + Send + 'static,
{
    fn boot(&self, activation: &Activation) -> Result<Arc<dyn DependencyClient>, BootError> {
        self(activation)
    }
}

/// Booter that launches the configured backend process.
#[derive(Debug, Clone)]
pub struct ProcessBooter {
    settings: ClientSettings,
}

impl ProcessBooter {
    /// Creates a booter using `settings`.
    #[must_use]
    pub const fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }
}

impl Booter for ProcessBooter {
    fn boot(&self, activation: &Activation) -> Result<Arc<dyn DependencyClient>, BootError> {
        let client = create_client(
            activation.workspace_root(),
            &self.settings,
            Arc::clone(activation.notifier()),
        )?;
        Ok(Arc::new(client))
    }
}

/// Launches the backend in `workspace_root` and completes the handshake.
///
/// Backend stderr is relayed from the moment of launch. On handshake failure
/// the process is killed and the most recent stderr lines are attached to
/// the error.
///
/// # Errors
///
/// Returns `BootError::Launch` when the process cannot be started,
/// `BootError::Relay` when the stderr relay cannot be started, and
/// `BootError::Initialization` when the handshake fails.
pub fn create_client(
    workspace_root: &Path,
    settings: &ClientSettings,
    notifier: Arc<dyn Notifier>,
) -> Result<RequestClient, BootError> {
    let (mut process, streams) = supervisor::launch(workspace_root, settings)?;
    let ChildStreams {
        stdin,
        stdout,
        stderr,
    } = streams;

    let relay = match spawn_relay(stderr, Arc::clone(&notifier)) {
        Ok(relay) => relay,
        Err(source) => {
            process.force_kill();
            return Err(BootError::Relay { source });
        }
    };

    let mut reader: PipeReader = BufReader::new(Box::new(stdout) as Box<dyn Read + Send>);
    let handshake = match Handshake::read_from(&mut reader) {
        Ok(handshake) => handshake,
        Err(source) => {
            process.force_kill();
            return Err(InitializationError {
                source,
                stderr: relay.finish(),
            }
            .into());
        }
    };
    relay.release_tail();

    info!(
        target: BOOT_TARGET,
        pid = process.id(),
        root = %handshake.root,
        "backend ready"
    );
    Ok(
        RequestClient::from_handshake(&handshake, reader, Box::new(stdin), notifier)
            .with_process(process)
            .with_shutdown_grace(settings.shutdown_grace()),
    )
}

struct Slot {
    client: Arc<dyn DependencyClient>,
    state: BootState,
    shut_down: bool,
}

struct Shared {
    slot: Mutex<Slot>,
    settled: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn install(&self, client: Arc<dyn DependencyClient>) {
        let mut slot = self.lock();
        if slot.shut_down {
            slot.state = BootState::Failed;
            drop(slot);
            self.settled.notify_all();
            debug!(target: BOOT_TARGET, "shutdown requested during boot; stopping backend");
            client.shutdown();
            return;
        }
        slot.client = client;
        slot.state = BootState::Ready;
        drop(slot);
        self.settled.notify_all();
    }

    fn fail(&self) {
        self.lock().state = BootState::Failed;
        self.settled.notify_all();
    }
}

/// Owns the client slot and the boot thread for one workspace.
pub struct Coordinator {
    shared: Arc<Shared>,
    activations: Mutex<Option<Sender<Activation>>>,
    boot_thread: Mutex<Option<JoinHandle<()>>>,
    reload_patterns: Vec<String>,
}

impl Coordinator {
    /// Creates a coordinator that launches the configured backend process.
    #[must_use]
    pub fn new(settings: ClientSettings) -> Self {
        let reload_patterns = settings.reload_patterns().to_vec();
        Self::with_booter(ProcessBooter::new(settings), reload_patterns)
    }

    /// Creates a coordinator with a custom boot strategy.
    #[must_use]
    pub fn with_booter<B: Booter>(booter: B, reload_patterns: Vec<String>) -> Self {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                client: Arc::new(PlaceholderClient::new()),
                state: BootState::Pending,
                shut_down: false,
            }),
            settled: Condvar::new(),
        });
        let (sender, receiver) = mpsc::channel();

        let thread_shared = Arc::clone(&shared);
        let spawned = thread::Builder::new()
            .name("dilens-boot".to_owned())
            .spawn(move || run_boot(&booter, &thread_shared, &receiver));
        let boot_thread = match spawned {
            Ok(handle) => Some(handle),
            Err(error) => {
                error!(target: BOOT_TARGET, %error, "failed to start boot thread");
                shared.fail();
                None
            }
        };

        Self {
            shared,
            activations: Mutex::new(boot_thread.as_ref().map(|_| sender)),
            boot_thread: Mutex::new(boot_thread),
            reload_patterns,
        }
    }

    /// Releases the boot thread to launch the backend in `workspace_root`.
    ///
    /// Only the first call has an effect.
    pub fn activate(&self, workspace_root: impl Into<PathBuf>, notifier: Arc<dyn Notifier>) {
        let sender = self
            .activations
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .take();
        let Some(sender) = sender else {
            warn!(target: BOOT_TARGET, "activation ignored; coordinator already activated");
            return;
        };
        if sender.send(Activation::new(workspace_root, notifier)).is_err() {
            warn!(target: BOOT_TARGET, "boot thread is gone; activation dropped");
        }
    }

    /// Returns the currently exposed client without waiting for the boot.
    #[must_use]
    pub fn client(&self) -> Arc<dyn DependencyClient> {
        Arc::clone(&self.shared.lock().client)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BootState {
        self.shared.lock().state
    }

    /// Blocks until the boot settles or `timeout` elapses, returning the
    /// state observed last.
    #[must_use]
    pub fn wait_until_settled(&self, timeout: Duration) -> BootState {
        let guard = self.shared.lock();
        let (slot, _) = self
            .shared
            .settled
            .wait_timeout_while(guard, timeout, |slot| slot.state == BootState::Pending)
            .unwrap_or_else(|poison| poison.into_inner());
        slot.state
    }

    /// Reloads the backend when any changed URI matches a reload pattern.
    ///
    /// Returns `true` when a reload was requested.
    pub fn did_change_watched_files<I, S>(&self, uris: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stale = uris
            .into_iter()
            .any(|uri| requires_reload(uri.as_ref(), &self.reload_patterns));
        if stale {
            debug!(target: BOOT_TARGET, "watched file changed; reloading backend");
            self.client().trigger_reload();
        }
        stale
    }

    /// Shuts the exposed client down and prevents any later activation.
    ///
    /// Safe to call repeatedly.
    pub fn shutdown(&self) {
        drop(
            self.activations
                .lock()
                .unwrap_or_else(|poison| poison.into_inner())
                .take(),
        );
        let client = {
            let mut slot = self.shared.lock();
            slot.shut_down = true;
            Arc::clone(&slot.client)
        };
        client.shutdown();
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        let never_activated = self
            .activations
            .get_mut()
            .unwrap_or_else(|poison| poison.into_inner())
            .take()
            .is_some();
        let handle = self
            .boot_thread
            .get_mut()
            .unwrap_or_else(|poison| poison.into_inner())
            .take();
        // An activated boot may be blocked on the handshake; leave it detached.
        if never_activated
            && let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!(target: BOOT_TARGET, "boot thread panicked");
        }
    }
}

fn run_boot<B: Booter>(booter: &B, shared: &Shared, activations: &Receiver<Activation>) {
    let Ok(activation) = activations.recv() else {
        debug!(target: BOOT_TARGET, "coordinator released before activation");
        shared.fail();
        return;
    };

    debug!(
        target: BOOT_TARGET,
        root = %activation.workspace_root().display(),
        "booting backend"
    );
    match booter.boot(&activation) {
        Ok(client) => shared.install(client),
        Err(failure) => {
            report_boot_failure(&activation, &failure);
            shared.fail();
        }
    }
}

fn report_boot_failure(activation: &Activation, failure: &BootError) {
    let (level, message) = match failure {
        BootError::Launch(launch @ LaunchError::MarkerMissing { .. }) => {
            warn!(target: BOOT_TARGET, error = %launch, "backend not available");
            (
                LogLevel::Warning,
                format!("dilens: {launch}; dependency lookups are disabled"),
            )
        }
        other => {
            error!(target: BOOT_TARGET, error = %other, "backend failed to boot");
            (LogLevel::Error, format!("dilens: {other}"))
        }
    };
    activation.notifier().notify(HostEvent::log(level, message));
}
