//! # cuestream common library
//!
//! Shared code for the cuestream crates:
//! - Session wire protocol (handshake, commands, text frame parsing)
//! - Musical context model and normalization
//! - Engine event types and EventBus
//! - Configuration loading

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod protocol;

pub use context::MusicalContext;
pub use error::{Error, Result};
pub use events::{EngineEvent, EngineState, EventBus};
