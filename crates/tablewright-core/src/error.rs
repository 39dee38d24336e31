//! Error types for descriptor building, introspection and script generation.

use std::path::PathBuf;

/// Errors raised while turning an entity definition into a table descriptor.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// The definition could not be interpreted as a structured record.
    #[error("Failed to parse entity definition '{entity}': {message}")]
    Parse {
        /// Entity name, or `<unknown>` when the record has none.
        entity: String,
        /// Error message.
        message: String,
    },

    /// The definition parsed but describes an impossible table.
    #[error("Invalid descriptor for table '{table}': {message}")]
    Invalid {
        /// Table name.
        table: String,
        /// Error message.
        message: String,
    },
}

impl DescriptorError {
    pub(crate) fn invalid(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// Errors reported by an [`Introspector`](crate::introspect::Introspector).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntrospectError {
    /// A metadata query failed.
    #[error("Introspection query '{query}' failed: {message}")]
    Query {
        /// Short name of the failing query.
        query: &'static str,
        /// Driver error message.
        message: String,
    },

    /// The database could not be reached at all.
    #[error("Database unavailable: {0}")]
    Unavailable(String),
}

/// Errors that abort a generation run.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// An entity definition was malformed.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// Introspection failed and the run was configured to fail fast.
    #[error("Introspection of table '{table}' failed: {source}")]
    Introspection {
        /// Table being diffed.
        table: String,
        /// Underlying introspection failure.
        #[source]
        source: IntrospectError,
    },

    /// Creating the migrations directory or writing the script failed.
    #[error("Failed to write migration file '{path}': {source}")]
    Io {
        /// File or directory that could not be written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The requested migration name cannot be used as a file name.
    #[error("Invalid migration name: '{0}'")]
    InvalidMigrationName(String),
}

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenerateError>;
