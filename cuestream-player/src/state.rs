//! Engine status snapshot
//!
//! The engine owns all of its state on one task. Owners see it through
//! [`EngineStatus`], republished on a watch channel after every step, so
//! reads never contend with the engine loop.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

pub use cuestream_common::events::EngineState;

/// Point-in-time view of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: EngineState,
    /// Server has signaled the stream is live
    pub is_ready: bool,
    /// Playback stalled waiting for audio; the video should pause too
    pub is_buffering: bool,
    /// Current position on the media timeline (seconds)
    pub media_time: f64,
    /// Audio buffered so far (seconds)
    pub buffered_duration: f64,
    /// Authoritative media length; `<= 0` while unknown
    pub total_media_duration: f64,
    /// Sources handed to the output and not yet finished or cancelled
    pub scheduled_sources: usize,
    /// Everything up to the media length has been received
    pub stream_complete: bool,
}

impl EngineStatus {
    /// Status of a freshly built engine
    pub fn idle(total_media_duration: f64) -> Self {
        Self {
            state: EngineState::Idle,
            is_ready: false,
            is_buffering: false,
            media_time: 0.0,
            buffered_duration: 0.0,
            total_media_duration,
            scheduled_sources: 0,
            stream_complete: false,
        }
    }
}

/// Publishes status snapshots to any number of readers
#[derive(Debug)]
pub struct StatusPublisher {
    tx: watch::Sender<EngineStatus>,
}

impl StatusPublisher {
    pub fn new(initial: EngineStatus) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Replace the snapshot; readers are only woken when it changed
    pub fn publish(&self, status: EngineStatus) {
        self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> EngineStatus {
        self.tx.borrow().clone()
    }
}
