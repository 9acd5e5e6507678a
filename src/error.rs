//! Error types shared by the presence core

/// Failures reported by a presence transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No local presence service could be reached
    #[error("presence service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("not connected to the presence service")]
    NotConnected,

    /// Error reported by the presence service itself
    #[error("presence service error {code}: {message}")]
    Remote { code: i32, message: String },

    /// Raw failure from the underlying channel
    #[error("presence transport failure: {0}")]
    Io(String),
}

/// A `formatArgs` entry that names no data source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown data source {0:?}")]
pub struct UnknownDataSource(pub String);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("application id {0:?} is not a valid integer")]
    InvalidAppId(String),
}
