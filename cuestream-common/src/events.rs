//! Engine event types and EventBus
//!
//! Events describe what the engine did, for owners that want more than the
//! polled status snapshot: state changes, buffering stalls, and the warnings
//! that permissive handling would otherwise hide (clamped seeks, discarded
//! frames, dropped connections).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Engine state
///
/// Exactly one is active at a time. Readiness and buffering are reported
/// separately as projections in the status snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// Constructed, nothing requested yet
    Idle,
    /// Connection opened, waiting for the stream to go live
    Connecting,
    /// Audio clock running, chunks being scheduled
    Playing,
    /// Held by the owner
    Paused,
    /// Playback stalled until enough audio arrives
    Buffering,
    /// Terminal
    Stopped,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Connecting => write!(f, "connecting"),
            EngineState::Playing => write!(f, "playing"),
            EngineState::Paused => write!(f, "paused"),
            EngineState::Buffering => write!(f, "buffering"),
            EngineState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Engine events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// State machine transition
    StateChanged {
        old_state: EngineState,
        new_state: EngineState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Server signaled the stream is live
    StreamReady {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Underrun: playback stalled
    BufferingStarted {
        media_time: f64,
        buffered_duration: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Enough audio arrived to continue
    BufferingEnded {
        media_time: f64,
        buffered_duration: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Seek target fell outside `[0, buffered]` and was clamped
    SeekClamped {
        requested: f64,
        effective: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Inbound text frame was discarded
    MalformedMessage {
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// New musical context replaced the previous one
    ContextUpdated {
        musical_blocks: usize,
        scenes: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Full media duration is buffered; STOP sent and connection closed
    StreamCompleted {
        buffered_duration: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Connection dropped or could not be opened
    ConnectionLost {
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Transport command that had no effect in the current state
    CommandIgnored {
        command: String,
        state: EngineState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl EngineEvent {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::StateChanged { .. } => "state_changed",
            EngineEvent::StreamReady { .. } => "stream_ready",
            EngineEvent::BufferingStarted { .. } => "buffering_started",
            EngineEvent::BufferingEnded { .. } => "buffering_ended",
            EngineEvent::SeekClamped { .. } => "seek_clamped",
            EngineEvent::MalformedMessage { .. } => "malformed_message",
            EngineEvent::ContextUpdated { .. } => "context_updated",
            EngineEvent::StreamCompleted { .. } => "stream_completed",
            EngineEvent::ConnectionLost { .. } => "connection_lost",
            EngineEvent::CommandIgnored { .. } => "command_ignored",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally: publishing never blocks, slow
/// subscribers see `Lagged` instead of stalling the engine.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&EngineState::Buffering).unwrap();
        assert_eq!(json, "\"buffering\"");
        assert_eq!(EngineState::Connecting.to_string(), "connecting");
    }

    #[test]
    fn test_event_is_tagged() {
        let event = EngineEvent::SeekClamped {
            requested: 12.0,
            effective: 4.0,
            timestamp: chrono::Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "SeekClamped");
        assert_eq!(value["effective"], 4.0);
        assert_eq!(event.kind(), "seek_clamped");
    }

    #[tokio::test]
    async fn test_event_bus_delivery() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit_lossy(EngineEvent::StreamReady {
            timestamp: chrono::Utc::now(),
        });

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, EngineEvent::StreamReady { .. }));
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.emit_lossy(EngineEvent::StreamReady {
            timestamp: chrono::Utc::now(),
        });
        assert_eq!(bus.capacity(), 4);
    }
}
