//! Error types for tracker-migrate.

use thiserror::Error;

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while migrating records.
///
/// Only a few of these are fatal to a run (schema load, page fetch, setup).
/// The rest are caught at the boundary of one unit of work and turned into a
/// [`crate::report::Failure`].
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request to the source tracker failed.
    #[error("Source connection error: {0}")]
    SourceConnection(String),

    /// Request to the destination tracker failed.
    #[error("Destination connection error: {0}")]
    DestinationConnection(String),

    /// Credentials were rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The remote API throttled us. Carries the suggested wait in seconds.
    #[error("Rate limited, retry after {0}s")]
    RateLimit(u64),

    /// The destination schema has no field with this name.
    #[error("Field '{0}' not found in destination schema")]
    SchemaFieldNotFound(String),

    /// The destination field has no option matching this label.
    #[error("Option '{label}' not found for field '{field}'")]
    SchemaOptionNotFound {
        /// Destination field name.
        field: String,
        /// Source label that failed to resolve.
        label: String,
    },

    /// Rich text, dates or other structured content could not be parsed.
    #[error("Content parse error: {0}")]
    ContentParse(String),

    /// Local staging of attachment bytes failed.
    #[error("Staging error: {0}")]
    Staging(String),

    /// Underlying HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
