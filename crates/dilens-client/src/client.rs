//! The query surface shared by live and placeholder clients.

use std::path::Path;

use dilens_protocol::AccessorMap;

/// Queries the tooling host can make against a workspace's container.
///
/// Implementations never raise: a failed or impossible query yields `None`
/// (or nothing, for commands) and the failure is reported through logging.
pub trait DependencyClient: Send + Sync {
    /// Returns the `path:line` where `key` is registered.
    fn resolve_location(&self, key: &str) -> Option<String>;

    /// Returns the accessors injected into `type_name`, with their locations.
    fn resolve_accessors(&self, type_name: &str) -> Option<AccessorMap>;

    /// Returns up to five registered keys starting with `prefix`.
    fn matching_keys(&self, prefix: &str) -> Option<Vec<String>>;

    /// Asks the backend to reload the application runtime.
    fn trigger_reload(&self);

    /// Stops the backend. Repeated calls are no-ops.
    fn shutdown(&self);

    /// Application root announced by the backend.
    fn root(&self) -> &Path;

    /// Name of the container constant, once known.
    fn container_name(&self) -> Option<&str>;

    /// Name of the injection mixin, once known.
    fn injection_name(&self) -> Option<&str>;

    /// Returns `true` while the backend connection is usable: neither shut
    /// down nor lost to a broken pipe.
    fn is_ready(&self) -> bool;
}
