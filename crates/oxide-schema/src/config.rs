//! Connection settings.

use std::path::PathBuf;

use tracing::debug;

use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};

/// Target database and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Target dialect.
    pub dialect: Dialect,
    /// Connection URI given directly.
    pub uri: Option<String>,
    /// File holding the connection URI, typically a mounted secret. Takes
    /// precedence over `uri`.
    pub uri_file: Option<PathBuf>,
}

impl Config {
    /// Creates a configuration with no URI set.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            uri: None,
            uri_file: None,
        }
    }

    /// Sets the connection URI.
    #[must_use]
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Sets the file to read the connection URI from.
    #[must_use]
    pub fn uri_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.uri_file = Some(path.into());
        self
    }

    /// Resolves the connection URI.
    ///
    /// The URI file is read verbatim, without trimming.
    pub fn resolve_uri(&self) -> Result<String> {
        if let Some(ref path) = self.uri_file {
            debug!(path = %path.display(), "Reading connection URI from file");
            return std::fs::read_to_string(path).map_err(|e| SchemaError::io(path, e));
        }
        self.uri.clone().ok_or(SchemaError::MissingUri)
    }
}
