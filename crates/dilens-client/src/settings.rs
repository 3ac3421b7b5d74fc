//! Client settings resolved from the shared layered configuration.

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoError};

use dilens_config::Config;

/// Launch and lifecycle settings for the backend, resolved from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    backend_marker: Utf8PathBuf,
    backend_command: Vec<String>,
    shutdown_grace: Duration,
    reload_patterns: Vec<String>,
}

impl ClientSettings {
    /// Resolves settings from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            backend_marker: config.backend_marker().to_owned(),
            backend_command: config.backend_command(),
            shutdown_grace: config.shutdown_grace(),
            reload_patterns: config.reload_patterns(),
        }
    }

    /// Loads settings from configuration files and `DILENS_*` variables.
    ///
    /// The host's own command line is not consulted.
    ///
    /// # Errors
    ///
    /// Returns the loader error when a configuration source is malformed.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        let config = Config::load_from_iter([OsString::from("dilens")])?;
        Ok(Self::from_config(&config))
    }

    /// Replaces the marker path, relative to the workspace root.
    #[must_use]
    pub fn with_backend_marker(mut self, marker: impl Into<Utf8PathBuf>) -> Self {
        self.backend_marker = marker.into();
        self
    }

    /// Replaces the program and arguments used to launch the backend.
    #[must_use]
    pub fn with_backend_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backend_command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the shutdown grace period.
    #[must_use]
    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Replaces the reload patterns.
    #[must_use]
    pub fn with_reload_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reload_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Marker path relative to the workspace root.
    #[must_use]
    pub fn backend_marker(&self) -> &Utf8Path {
        &self.backend_marker
    }

    /// Program followed by its arguments.
    #[must_use]
    pub fn backend_command(&self) -> &[String] {
        &self.backend_command
    }

    /// Time the backend is given to exit after `shutdown`.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    /// Path suffixes that trigger a reload.
    #[must_use]
    pub fn reload_patterns(&self) -> &[String] {
        &self.reload_patterns
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
