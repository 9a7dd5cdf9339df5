//! Error types for planning, introspection and apply.

use std::path::PathBuf;

/// Errors that can occur while planning or applying schema changes.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// IO error reading a specification, secret or output file.
    #[error("IO error on '{}': {source}", path.display())]
    Io {
        /// The file that could not be read or written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The document matched neither the enveloped nor the bare table shape.
    #[error("Failed to parse table document '{}': {source}", path.display())]
    Parse {
        /// Path of the document (empty for in-memory input).
        path: PathBuf,
        /// Error reported for the bare-form attempt.
        #[source]
        source: serde_yaml::Error,
    },

    /// The document parsed but is not a valid table specification.
    #[error("Invalid table specification: {0}")]
    InvalidSpec(String),

    /// The configured driver name is not one of the supported dialects.
    #[error("Unknown database driver '{0}' (expected postgres, mysql or cockroachdb)")]
    UnknownDialect(String),

    /// Neither a connection URI nor a URI file was configured.
    #[error("No connection URI configured")]
    MissingUri,

    /// Database error while connecting or querying the catalog.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A statement failed during apply; later statements were not run.
    #[error("Statement {index} failed: {statement}: {source}")]
    Execution {
        /// Zero-based position of the failing statement.
        index: usize,
        /// The statement text.
        statement: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// Serialization error writing generated documents.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

impl SchemaError {
    /// Wraps an IO error with the path it happened on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
