//! A [`ContainerInspector`] backed by a JSON manifest.
//!
//! The manifest (`dilens.json` by default) describes the application the
//! way its container would report it:
//!
//! ```json
//! {
//!   "root": "/app",
//!   "container": "AppContainer",
//!   "injection": "App::Deps",
//!   "components": { "logger": "lib/logger.rb:3" },
//!   "types": { "UsersController": { "logger": "logger" } }
//! }
//! ```
//!
//! `root` defaults to the manifest's directory and relative roots resolve
//! against it. Component locations must be `path:line` text; relative paths
//! resolve against `root`. Each type maps accessor names to component keys.

use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::debug;

use dilens_protocol::{AccessorMap, SourceLocation};

use crate::error::InspectorError;
use crate::inspector::ContainerInspector;

/// File name looked up when no manifest path is given.
pub const DEFAULT_MANIFEST: &str = "dilens.json";

const MANIFEST_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::manifest");

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestDocument {
    #[serde(default)]
    root: Option<Utf8PathBuf>,
    container: String,
    injection: String,
    #[serde(default)]
    components: BTreeMap<String, SourceLocation>,
    #[serde(default)]
    types: BTreeMap<String, BTreeMap<String, String>>,
}

/// Inspector answering from a manifest file, re-read on reload.
#[derive(Debug, Clone)]
pub struct ManifestInspector {
    path: Utf8PathBuf,
    root: Utf8PathBuf,
    document: ManifestDocument,
}

impl ManifestInspector {
    /// Reads the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`InspectorError::ManifestIo`] when the file cannot be read
    /// and [`InspectorError::ManifestParse`] when it is not a valid manifest.
    pub fn load(path: &Utf8Path) -> Result<Self, InspectorError> {
        let manifest = absolute(path)?;
        let document = read_document(&manifest)?;
        let root = resolve_root(&manifest, document.root.as_deref());
        debug!(
            target: MANIFEST_TARGET,
            manifest = %manifest,
            %root,
            components = document.components.len(),
            types = document.types.len(),
            "manifest loaded"
        );
        Ok(Self {
            path: manifest,
            root,
            document,
        })
    }

    /// Absolute path of the manifest file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn resolve_location(&self, location: &SourceLocation) -> String {
        location.anchored_at(&self.root).to_string()
    }
}

impl ContainerInspector for ManifestInspector {
    fn root(&self) -> String {
        self.root.to_string()
    }

    fn container_name(&self) -> String {
        self.document.container.clone()
    }

    fn injection_name(&self) -> String {
        self.document.injection.clone()
    }

    fn locate(&self, key: &str) -> Result<Option<String>, InspectorError> {
        Ok(self
            .document
            .components
            .get(key)
            .map(|location| self.resolve_location(location)))
    }

    fn accessors_of(&self, type_name: &str) -> Result<Option<AccessorMap>, InspectorError> {
        let accessors = self
            .document
            .types
            .get(type_name)
            .ok_or_else(|| InspectorError::unknown_type(type_name))?;
        if accessors.is_empty() {
            return Ok(None);
        }
        let mut resolved = AccessorMap::new();
        for (accessor, key) in accessors {
            resolved.insert(accessor.clone(), self.locate(key)?);
        }
        Ok(Some(resolved))
    }

    fn sorted_keys(&self) -> Result<Vec<String>, InspectorError> {
        Ok(self.document.components.keys().cloned().collect())
    }

    fn reload_runtime(&mut self) -> Result<(), InspectorError> {
        let document = read_document(&self.path)?;
        self.root = resolve_root(&self.path, document.root.as_deref());
        self.document = document;
        debug!(target: MANIFEST_TARGET, manifest = %self.path, "manifest reloaded");
        Ok(())
    }
}

fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf, InspectorError> {
    let io_error = |source| InspectorError::ManifestIo {
        path: path.to_path_buf(),
        source,
    };
    let resolved = std::path::absolute(path).map_err(io_error)?;
    Utf8PathBuf::try_from(resolved).map_err(|error| io_error(error.into_io_error()))
}

fn read_document(path: &Utf8Path) -> Result<ManifestDocument, InspectorError> {
    let contents = fs::read_to_string(path).map_err(|source| InspectorError::ManifestIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| InspectorError::ManifestParse {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve_root(manifest: &Utf8Path, root: Option<&Utf8Path>) -> Utf8PathBuf {
    let base = manifest.parent().unwrap_or_else(|| Utf8Path::new("/"));
    match root {
        Some(root) if root.is_absolute() => root.to_path_buf(),
        Some(root) => base.join(root),
        None => base.to_path_buf(),
    }
}
