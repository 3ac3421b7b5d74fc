//! Command-line arguments for `dilensd`.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use crate::manifest::DEFAULT_MANIFEST;

/// Backend answering dependency-container queries over stdin and stdout.
#[derive(Parser, Debug)]
#[command(name = "dilensd", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Structured subcommands for `dilensd`.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Announces the container, then serves requests until shutdown or EOF.
    Serve {
        /// Manifest describing the application container.
        #[arg(long, value_name = "PATH", default_value = DEFAULT_MANIFEST)]
        manifest: Utf8PathBuf,
    },
}
