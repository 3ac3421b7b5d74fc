//! `path:line` source positions reported for registered components.

use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::LocationError;

/// A `path:line` source position as reported by the backend.
///
/// Serialises as its `path:line` text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceLocation {
    path: Utf8PathBuf,
    line: u32,
}

impl SourceLocation {
    /// Creates a location from its parts.
    #[must_use]
    pub const fn new(path: Utf8PathBuf, line: u32) -> Self {
        Self { path, line }
    }

    /// File containing the registration.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// One-based line number.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// Returns this location with a relative path joined onto `root`.
    #[must_use]
    pub fn anchored_at(&self, root: &Utf8Path) -> Self {
        if self.path.is_absolute() {
            self.clone()
        } else {
            Self::new(root.join(&self.path), self.line)
        }
    }
}

impl FromStr for SourceLocation {
    type Err = LocationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let Some((path, line)) = input.rsplit_once(':') else {
            return Err(LocationError::MissingLine {
                input: input.to_owned(),
            });
        };
        if path.is_empty() {
            return Err(LocationError::EmptyPath {
                input: input.to_owned(),
            });
        }
        match line.parse::<u32>() {
            Ok(number) if number > 0 => Ok(Self::new(Utf8PathBuf::from(path), number)),
            _ => Err(LocationError::InvalidLine {
                input: input.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for SourceLocation {
    type Error = LocationError;

    fn try_from(input: String) -> Result<Self, Self::Error> {
        input.parse()
    }
}

impl From<SourceLocation> for String {
    fn from(location: SourceLocation) -> Self {
        location.to_string()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}
