//! Playback engine
//!
//! Buffer timeline, clock-anchored scheduler, transport controller and the
//! runtime loop that ties them to the session connection.

pub mod engine;
pub mod scheduler;
pub mod timeline;
pub mod transport;

pub use engine::{build_engine, EngineHandle, EngineRunner, TransportCommand};
pub use scheduler::{ChunkOutcome, PlaybackAnchor, PlaybackScheduler};
pub use timeline::{AudioChunk, BufferTimeline};
pub use transport::TransportController;
