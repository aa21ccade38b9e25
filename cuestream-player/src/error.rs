//! Error types for cuestream-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Normal playback never surfaces these to the owner: underrun, clamped seeks
//! and discarded frames are states or events, not errors.

use thiserror::Error;

/// Main error type for cuestream-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shared protocol, context or config errors
    #[error(transparent)]
    Common(#[from] cuestream_common::Error),

    /// Session connection could not be opened or used
    #[error("Connection error: {0}")]
    Connection(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// The engine task has exited and no longer accepts commands
    #[error("Engine stopped: {0}")]
    EngineGone(String),
}

/// Convenience Result type using cuestream-player Error
pub type Result<T> = std::result::Result<T, Error>;
