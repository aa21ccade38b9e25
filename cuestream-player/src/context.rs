//! Musical context sink
//!
//! Holds the latest planning/analysis metadata received on the session.
//! Each update replaces the previous context wholesale; readers get an
//! immutable shared snapshot through a watch channel. The context lives as
//! long as the connection and is cleared on stop or disconnect.

use std::sync::Arc;

use chrono::Utc;
use cuestream_common::{EngineEvent, EventBus, MusicalContext};
use tokio::sync::watch;
use tracing::{debug, info};

/// Latest musical context, shared read-only
pub type ContextSnapshot = Option<Arc<MusicalContext>>;

/// Receives context updates and publishes them
#[derive(Debug)]
pub struct MusicalContextSink {
    tx: watch::Sender<ContextSnapshot>,
    events: EventBus,
}

impl MusicalContextSink {
    pub fn new(events: EventBus) -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx, events }
    }

    /// Replace the current context
    pub fn update(&self, context: MusicalContext) {
        let musical_blocks = context.musical_blocks.len();
        let scenes = context.scene_analysis.len();
        info!(
            "Musical context updated: {} blocks, {} scenes",
            musical_blocks, scenes
        );

        self.tx.send_replace(Some(Arc::new(context)));
        self.events.emit_lossy(EngineEvent::ContextUpdated {
            musical_blocks,
            scenes,
            timestamp: Utc::now(),
        });
    }

    /// Drop the context (stop or disconnect)
    pub fn clear(&self) {
        if self.tx.borrow().is_some() {
            debug!("Musical context cleared");
            self.tx.send_replace(None);
        }
    }

    pub fn current(&self) -> ContextSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ContextSnapshot> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cuestream_common::context::{MusicalBlock, TimeRange};

    fn context(direction: &str) -> MusicalContext {
        MusicalContext {
            global_context: "test".to_string(),
            musical_blocks: vec![MusicalBlock {
                time_range: TimeRange::new(0.0, 10.0),
                musical_direction: direction.to_string(),
                ..Default::default()
            }],
            scene_analysis: Vec::new(),
        }
    }

    #[test]
    fn test_update_replaces_wholesale() {
        let sink = MusicalContextSink::new(EventBus::default());
        sink.update(context("first"));
        sink.update(context("second"));

        let current = sink.current().unwrap();
        assert_eq!(current.musical_blocks.len(), 1);
        assert_eq!(current.musical_blocks[0].musical_direction, "second");
    }

    #[test]
    fn test_readers_keep_old_snapshot() {
        let sink = MusicalContextSink::new(EventBus::default());
        sink.update(context("first"));
        let held = sink.current().unwrap();
        sink.update(context("second"));
        assert_eq!(held.musical_blocks[0].musical_direction, "first");
    }

    #[test]
    fn test_clear_and_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let sink = MusicalContextSink::new(bus);

        sink.update(context("first"));
        assert!(matches!(
            rx.try_recv().unwrap(),
            EngineEvent::ContextUpdated { musical_blocks: 1, scenes: 0, .. }
        ));

        sink.clear();
        assert!(sink.current().is_none());
    }
}
