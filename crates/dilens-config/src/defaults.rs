//! Built-in configuration defaults shared by the client and `dilensd`.

use std::time::Duration;

use camino::Utf8PathBuf;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// File whose presence marks a workspace as able to host the backend.
pub const DEFAULT_BACKEND_MARKER: &str = "bin/dilensd";

/// Command line used to boot the backend inside the application.
pub const DEFAULT_BACKEND_COMMAND: &str = "bin/dilensd serve";

/// Time the backend is given to exit after a `shutdown` request.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 500;

/// Comma-separated path suffixes whose modification triggers a backend reload.
pub const DEFAULT_RELOAD_PATTERNS: &str = "db/schema.rb,structure.sql";

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}

/// Default backend marker, relative to the workspace root.
#[must_use]
pub fn default_backend_marker() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_BACKEND_MARKER)
}

/// Default grace period granted to the backend during shutdown.
#[must_use]
pub fn default_shutdown_grace() -> Duration {
    Duration::from_millis(DEFAULT_SHUTDOWN_GRACE_MS)
}
