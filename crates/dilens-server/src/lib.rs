//! The `dilensd` backend.
//!
//! `dilensd serve` announces an application's dependency container on
//! stdout, then answers Content-Length framed JSON requests read from stdin
//! until it is asked to shut down or its input closes. Diagnostics go to
//! stderr only. The container is reached through [`ContainerInspector`];
//! [`ManifestInspector`] is the bundled implementation.

mod cli;
pub mod dispatch;
mod error;
mod inspector;
mod manifest;
mod prefix;
pub mod telemetry;

#[cfg(test)]
mod tests;

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8Path;
use clap::Parser;
use ortho_config::{OrthoConfig, OrthoError};
use tracing::{error, info};

use dilens_config::Config;
use dilens_protocol::ProtocolError;

use crate::cli::{Cli, CliCommand};
use crate::dispatch::DISPATCH_TARGET;
use crate::telemetry::TelemetryError;

pub use dispatch::DispatchServer;
pub use error::{DispatchError, InspectorError};
pub use inspector::ContainerInspector;
pub use manifest::{DEFAULT_MANIFEST, ManifestInspector};
pub use prefix::keys_with_prefix;

/// Failures that stop `dilensd` before or while serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Configuration could not be loaded.
    #[error("failed to load configuration: {0}")]
    Configuration(#[source] Arc<OrthoError>),
    /// Telemetry could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// The inspector could not be created.
    #[error(transparent)]
    Inspector(#[from] InspectorError),
    /// The handshake or a response could not be written.
    #[error("protocol stream failed: {0}")]
    Protocol(#[source] ProtocolError),
}

/// Runs `dilensd` with the given arguments and standard streams.
#[must_use]
pub fn run<I, R, W, E>(args: I, stdin: &mut R, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(usage) if usage.use_stderr() => {
            let _ = write!(stderr, "{}", usage.render());
            return ExitCode::FAILURE;
        }
        Err(usage) => {
            let _ = write!(stdout, "{}", usage.render());
            return ExitCode::SUCCESS;
        }
    };

    let CliCommand::Serve { manifest } = cli.command;
    match serve(&manifest, stdin, stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(startup_error) => {
            error!(target: DISPATCH_TARGET, error = %startup_error, "dilensd stopped");
            let _ = writeln!(stderr, "dilensd: {startup_error}");
            ExitCode::FAILURE
        }
    }
}

fn serve<R, W>(manifest: &Utf8Path, stdin: &mut R, stdout: &mut W) -> Result<(), StartupError>
where
    R: BufRead,
    W: Write,
{
    let config = Config::load_from_iter([OsString::from("dilensd")])
        .map_err(StartupError::Configuration)?;
    telemetry::initialise(&config)?;
    let inspector = ManifestInspector::load(manifest)?;
    info!(
        target: DISPATCH_TARGET,
        manifest = %inspector.path(),
        root = %inspector.root(),
        "serving"
    );
    DispatchServer::new(inspector)
        .serve(stdin, stdout)
        .map_err(StartupError::Protocol)
}
