//! The seam between the dispatch loop and the application being inspected.

use dilens_protocol::AccessorMap;

use crate::error::InspectorError;
use crate::prefix;

/// Read access to an application's dependency container.
///
/// Implementations answer in terms of registered keys, source locations
/// (`path:line`) and the accessors the injection mixin adds to a type.
#[cfg_attr(test, mockall::automock)]
pub trait ContainerInspector: Send {
    /// Application root directory announced in the handshake.
    fn root(&self) -> String;

    /// Name of the container constant.
    fn container_name(&self) -> String;

    /// Name of the injection mixin.
    fn injection_name(&self) -> String;

    /// Source location of the registration for `key`, if registered.
    ///
    /// # Errors
    ///
    /// Returns an error when the container cannot be consulted.
    fn locate(&self, key: &str) -> Result<Option<String>, InspectorError>;

    /// Accessors injected into `type_name`, mapped to their locations.
    ///
    /// `Ok(None)` means the type exists but has no injected accessors.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown types or when the container cannot be
    /// consulted.
    fn accessors_of(&self, type_name: &str) -> Result<Option<AccessorMap>, InspectorError>;

    /// Every registered key in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error when the container cannot be consulted.
    fn sorted_keys(&self) -> Result<Vec<String>, InspectorError>;

    /// Up to `limit` registered keys starting with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error when the container cannot be consulted.
    fn keys_with_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>, InspectorError> {
        let keys = self.sorted_keys()?;
        Ok(prefix::keys_with_prefix(&keys, prefix, limit))
    }

    /// Reloads the application so later queries see fresh registrations.
    ///
    /// # Errors
    ///
    /// Returns an error when the reload fails; earlier state stays in use.
    fn reload_runtime(&mut self) -> Result<(), InspectorError>;
}
