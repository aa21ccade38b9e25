//! # cuestream player library
//!
//! Client-side sync engine for a live generated soundtrack.
//!
//! **Purpose:** Receive raw PCM from a music session, buffer it on a media
//! timeline, and schedule it against an audio clock so it stays locked to a
//! video's play/pause/seek, stalling (buffering) instead of drifting when
//! audio runs short.
//!
//! **Architecture:** Session connection -> chunk decoder -> buffer timeline
//! -> playback scheduler <-> transport controller, all driven from one
//! engine loop. Musical context metadata is published alongside.

pub mod audio;
pub mod config;
pub mod context;
pub mod error;
pub mod playback;
pub mod session;
pub mod state;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use playback::{build_engine, EngineHandle, EngineRunner, TransportCommand};
pub use state::EngineStatus;
