//! Common error types for cuestream

use thiserror::Error;

/// Common result type for cuestream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the cuestream crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Inbound or outbound frame could not be interpreted
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
