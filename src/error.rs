//! Error types for the pingback endpoint

use thiserror::Error;

/// Main error type for pingback operations
#[derive(Debug, Error)]
pub enum PingbackError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Interaction store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Server error: {0}")]
    ServerError(String),
}

/// Result type alias for pingback operations
pub type Result<T> = std::result::Result<T, PingbackError>;
