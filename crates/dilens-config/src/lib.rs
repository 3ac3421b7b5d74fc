//! Shared configuration for the dilens client and backend.
//!
//! Values are layered by `ortho_config`: built-in defaults, then a
//! configuration file, then `DILENS_*` environment variables, then command
//! line flags. Fields absent from every layer keep the values from
//! [`defaults`].

pub mod defaults;
mod logging;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_BACKEND_COMMAND, DEFAULT_BACKEND_MARKER, DEFAULT_LOG_FILTER, DEFAULT_RELOAD_PATTERNS,
    DEFAULT_SHUTDOWN_GRACE_MS, default_backend_marker, default_log_filter, default_log_format,
    default_shutdown_grace,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Layered configuration shared by the client library and `dilensd`.
///
/// Every field carries a built-in default, so loading with no file, no
/// environment and no flags yields [`Config::default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "DILENS")]
#[serde(default)]
pub struct Config {
    /// Tracing filter expression, in `RUST_LOG` syntax.
    #[ortho_config(default = String::from(DEFAULT_LOG_FILTER))]
    pub log_filter: String,
    /// Output format of the backend's diagnostic stream.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Path, relative to the workspace root, that must exist before the
    /// backend is launched.
    #[ortho_config(default = default_backend_marker())]
    pub backend_marker: Utf8PathBuf,
    /// Whitespace-separated command line that boots the backend.
    #[ortho_config(default = String::from(DEFAULT_BACKEND_COMMAND))]
    pub backend_command: String,
    /// Milliseconds to wait for the backend to exit after `shutdown`.
    #[ortho_config(default = DEFAULT_SHUTDOWN_GRACE_MS)]
    pub shutdown_grace_ms: u64,
    /// Comma-separated path suffixes that trigger a backend reload.
    #[ortho_config(default = String::from(DEFAULT_RELOAD_PATTERNS))]
    pub reload_patterns: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: String::from(DEFAULT_LOG_FILTER),
            log_format: default_log_format(),
            backend_marker: default_backend_marker(),
            backend_command: String::from(DEFAULT_BACKEND_COMMAND),
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            reload_patterns: String::from(DEFAULT_RELOAD_PATTERNS),
        }
    }
}

impl Config {
    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Diagnostic output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Backend marker path relative to the workspace root.
    #[must_use]
    pub fn backend_marker(&self) -> &Utf8Path {
        &self.backend_marker
    }

    /// Program and arguments used to boot the backend.
    ///
    /// A blank command falls back to [`DEFAULT_BACKEND_COMMAND`].
    #[must_use]
    pub fn backend_command(&self) -> Vec<String> {
        let configured = if self.backend_command.trim().is_empty() {
            DEFAULT_BACKEND_COMMAND
        } else {
            &self.backend_command
        };
        configured.split_whitespace().map(str::to_owned).collect()
    }

    /// Grace period granted to the backend after a `shutdown` request.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Path suffixes whose modification triggers a reload.
    #[must_use]
    pub fn reload_patterns(&self) -> Vec<String> {
        self.reload_patterns
            .split(',')
            .map(str::trim)
            .filter(|pattern| !pattern.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn accessors_fall_back_to_defaults() {
        let config = Config::default();

        assert_eq!(config.log_filter(), "info");
        assert_eq!(config.log_format(), LogFormat::Compact);
        assert_eq!(config.backend_marker(), Utf8Path::new("bin/dilensd"));
        assert_eq!(config.backend_command(), vec!["bin/dilensd", "serve"]);
        assert_eq!(config.shutdown_grace(), Duration::from_millis(500));
        assert_eq!(
            config.reload_patterns(),
            vec!["db/schema.rb", "structure.sql"]
        );
    }

    #[rstest]
    fn loads_built_in_defaults_without_any_source() {
        let loaded = Config::load_from_iter(["dilens"]);

        assert_eq!(loaded.ok(), Some(Config::default()));
    }

    #[rstest]
    #[case("  ", vec!["bin/dilensd", "serve"])]
    #[case("bundle exec dilensd serve", vec!["bundle", "exec", "dilensd", "serve"])]
    #[case("./run", vec!["./run"])]
    fn splits_backend_command(#[case] command: &str, #[case] expected: Vec<&str>) {
        let config = Config {
            backend_command: command.to_owned(),
            ..Config::default()
        };

        assert_eq!(config.backend_command(), expected);
    }

    #[rstest]
    fn reload_patterns_skip_blank_entries() {
        let config = Config {
            reload_patterns: " schema.rb ,, migrations/ ".to_owned(),
            ..Config::default()
        };

        assert_eq!(config.reload_patterns(), vec!["schema.rb", "migrations/"]);
    }

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("COMPACT", LogFormat::Compact)]
    fn parses_log_format_case_insensitively(#[case] input: &str, #[case] expected: LogFormat) {
        assert_eq!(input.parse::<LogFormat>().ok(), Some(expected));
    }
}
