//! Error types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// The node has no live channel and nothing usable was cached.
    #[error("no connection to node '{node}' while collecting {label}")]
    NoConnection { node: String, label: String },

    /// The remote routine did not complete before the deadline and nothing
    /// usable was cached.
    #[error("collecting {label} from node '{node}' timed out")]
    CollectionTimeout { node: String, label: String },

    /// The remote routine failed and nothing usable was cached.
    #[error("collecting {label} from node '{node}' failed: {reason}")]
    CollectionFailed {
        node: String,
        label: String,
        reason: String,
    },

    #[error("Remote execution error: {0}")]
    RemoteExecutionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Report error: {0}")]
    ReportError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

// Convert anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
