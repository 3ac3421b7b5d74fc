//! Inert client exposed until a backend is ready.

use std::path::{Path, PathBuf};

use dilens_protocol::AccessorMap;

use crate::client::DependencyClient;

/// Client that knows nothing and does nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderClient {
    root: PathBuf,
}

impl PlaceholderClient {
    /// Creates a placeholder rooted at the current working directory.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(std::env::current_dir().unwrap_or_default())
    }

    /// Creates a placeholder with an explicit root.
    #[must_use]
    pub const fn with_root(root: PathBuf) -> Self {
        Self { root }
    }
}

impl Default for PlaceholderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyClient for PlaceholderClient {
    fn resolve_location(&self, _key: &str) -> Option<String> {
        None
    }

    fn resolve_accessors(&self, _type_name: &str) -> Option<AccessorMap> {
        None
    }

    fn matching_keys(&self, _prefix: &str) -> Option<Vec<String>> {
        None
    }

    fn trigger_reload(&self) {}

    fn shutdown(&self) {}

    fn root(&self) -> &Path {
        &self.root
    }

    fn container_name(&self) -> Option<&str> {
        None
    }

    fn injection_name(&self) -> Option<&str> {
        None
    }

    fn is_ready(&self) -> bool {
        false
    }
}
