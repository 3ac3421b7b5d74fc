//! Backend process supervision.
//!
//! The backend runs in the workspace root with all three standard streams
//! piped. On Unix it leads its own process group, so terminal signals aimed at
//! the host do not reach it and a forced kill also takes down any helper
//! processes it started.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};

use tracing::{debug, warn};

use crate::error::LaunchError;
use crate::settings::ClientSettings;

const SUPERVISOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::supervisor");

/// The backend's standard streams.
#[derive(Debug)]
pub struct ChildStreams {
    /// Requests are written here.
    pub stdin: ChildStdin,
    /// Handshake and responses are read from here.
    pub stdout: ChildStdout,
    /// Diagnostics, relayed to the host.
    pub stderr: ChildStderr,
}

impl ChildStreams {
    fn take(child: &mut Child) -> Result<Self, LaunchError> {
        let stdin = child
            .stdin
            .take()
            .ok_or(LaunchError::MissingPipe { stream: "stdin" })?;
        let stdout = child
            .stdout
            .take()
            .ok_or(LaunchError::MissingPipe { stream: "stdout" })?;
        let stderr = child
            .stderr
            .take()
            .ok_or(LaunchError::MissingPipe { stream: "stderr" })?;
        Ok(Self {
            stdin,
            stdout,
            stderr,
        })
    }
}

/// Handle on a running backend process.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    /// Operating system process identifier.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Returns `true` while the process has not exited.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Kills the process (and its group on Unix) and reaps it.
    pub fn force_kill(&mut self) {
        let pid = self.child.id();
        if let Err(error) = kill_process_tree(&mut self.child) {
            warn!(
                target: SUPERVISOR_TARGET,
                pid,
                %error,
                "failed to kill backend process"
            );
        }
        match self.child.wait() {
            Ok(status) => debug!(target: SUPERVISOR_TARGET, pid, ?status, "backend reaped"),
            Err(error) => warn!(target: SUPERVISOR_TARGET, pid, %error, "failed to reap backend"),
        }
    }
}

/// Starts the backend for `workspace_root`.
///
/// # Errors
///
/// Returns `LaunchError::MarkerMissing` when the workspace has no backend
/// marker, `LaunchError::EmptyCommand` for an empty launch command, and
/// `LaunchError::SpawnFailed` or `LaunchError::MissingPipe` when the process
/// cannot be started with piped streams.
pub fn launch(
    workspace_root: &Path,
    settings: &ClientSettings,
) -> Result<(ChildProcess, ChildStreams), LaunchError> {
    let marker = workspace_root.join(settings.backend_marker());
    if !marker.exists() {
        return Err(LaunchError::MarkerMissing { marker });
    }

    let (program, args) = settings
        .backend_command()
        .split_first()
        .ok_or(LaunchError::EmptyCommand)?;
    let program_path = resolve_program(workspace_root, program);

    debug!(
        target: SUPERVISOR_TARGET,
        program = %program_path.display(),
        ?args,
        root = %workspace_root.display(),
        "launching backend"
    );

    let mut command = Command::new(&program_path);
    command
        .args(args)
        .current_dir(workspace_root)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    detach(&mut command);

    let child = command.spawn().map_err(|source| LaunchError::SpawnFailed {
        command: program.clone(),
        source,
    })?;
    let mut process = ChildProcess { child };
    match ChildStreams::take(&mut process.child) {
        Ok(streams) => {
            debug!(target: SUPERVISOR_TARGET, pid = process.id(), "backend spawned");
            Ok((process, streams))
        }
        Err(error) => {
            process.force_kill();
            Err(error)
        }
    }
}

/// Relative programs containing a separator are resolved against the root;
/// bare names are left for `PATH` lookup.
fn resolve_program(workspace_root: &Path, program: &str) -> PathBuf {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        workspace_root.join(path)
    } else {
        path.to_path_buf()
    }
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    command.process_group(0);
}

#[cfg(not(unix))]
fn detach(_command: &mut Command) {}

#[cfg(unix)]
fn kill_process_tree(child: &mut Child) -> io::Result<()> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pid = i32::try_from(child.id()).map_err(io::Error::other)?;
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) => Ok(()),
        Err(errno) => {
            debug!(
                target: SUPERVISOR_TARGET,
                pid,
                %errno,
                "process group kill failed; killing the process directly"
            );
            child.kill()
        }
    }
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) -> io::Result<()> {
    child.kill()
}
