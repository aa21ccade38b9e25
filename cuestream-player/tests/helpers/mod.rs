//! Test helper modules for cuestream player integration tests
//!
//! Provides reusable test infrastructure components:
//! - ScriptedConnector: in-memory session connection the test plays server for
//! - PCM builders: wire-format chunks of a given length
//! - controller(): transport controller on a manual clock

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use cuestream_common::events::EngineEvent;
use cuestream_common::EventBus;
use cuestream_player::audio::ManualOutput;
use cuestream_player::playback::TransportController;
use cuestream_player::session::{Connector, Outbound, SessionEvent, SessionLink};
use cuestream_player::{EngineConfig, Error};
use tokio::sync::{broadcast, mpsc};

pub const SAMPLE_RATE: u32 = 48_000;

#[derive(Default)]
struct ScriptState {
    session_ids: Vec<String>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    outbound: Vec<mpsc::UnboundedReceiver<Outbound>>,
    refuse: Option<String>,
}

/// Connector whose "server" is the test
///
/// Clones share state, so the test keeps one clone while the engine owns
/// another.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    inner: Arc<Mutex<ScriptState>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connect attempt fails synchronously with `reason`
    pub fn refusing(reason: &str) -> Self {
        let connector = Self::default();
        connector.inner.lock().unwrap().refuse = Some(reason.to_string());
        connector
    }

    pub fn connect_count(&self) -> usize {
        self.inner.lock().unwrap().session_ids.len()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.inner.lock().unwrap().session_ids.clone()
    }

    /// Deliver an event as the connection task would
    pub fn server_send(&self, event: SessionEvent) -> bool {
        let state = self.inner.lock().unwrap();
        match &state.events {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Everything the engine sent on any link so far
    pub fn outbound(&self) -> Vec<Outbound> {
        let mut state = self.inner.lock().unwrap();
        let mut sent = Vec::new();
        for rx in state.outbound.iter_mut() {
            while let Ok(message) = rx.try_recv() {
                sent.push(message);
            }
        }
        sent
    }
}

impl Connector for ScriptedConnector {
    fn connect(
        &mut self,
        session_id: &str,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> cuestream_player::Result<SessionLink> {
        let mut state = self.inner.lock().unwrap();
        state.session_ids.push(session_id.to_string());
        if let Some(reason) = &state.refuse {
            return Err(Error::Connection(reason.clone()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.events = Some(events);
        state.outbound.push(rx);
        Ok(SessionLink::new(tx, None))
    }
}

/// Silent s16le stereo PCM lasting `seconds`
pub fn pcm_seconds(seconds: f64) -> Vec<u8> {
    let frames = (seconds * SAMPLE_RATE as f64).round() as usize;
    vec![0u8; frames * 4]
}

/// Constant-level s16le stereo PCM lasting `seconds`
pub fn pcm_level(seconds: f64, left: i16, right: i16) -> Vec<u8> {
    let frames = (seconds * SAMPLE_RATE as f64).round() as usize;
    let mut bytes = Vec::with_capacity(frames * 4);
    for _ in 0..frames {
        bytes.extend_from_slice(&left.to_le_bytes());
        bytes.extend_from_slice(&right.to_le_bytes());
    }
    bytes
}

pub fn chunk(seconds: f64) -> SessionEvent {
    SessionEvent::Chunk(pcm_seconds(seconds))
}

pub fn config(total: f64) -> EngineConfig {
    EngineConfig::new("ws://localhost:8000/ws/music", "session-test", total)
}

pub type TestController = TransportController<ManualOutput, ScriptedConnector>;

/// Controller on a manual clock plus the test's view of connector and events
pub fn controller_with(
    config: &EngineConfig,
) -> (TestController, ScriptedConnector, broadcast::Receiver<EngineEvent>) {
    let connector = ScriptedConnector::new();
    let bus = EventBus::default();
    let rx = bus.subscribe();
    let (session_tx, _session_rx) = mpsc::unbounded_channel();
    let controller = TransportController::new(
        ManualOutput::new(SAMPLE_RATE),
        connector.clone(),
        config,
        session_tx,
        bus,
    );
    (controller, connector, rx)
}

pub fn controller(total: f64) -> (TestController, ScriptedConnector, broadcast::Receiver<EngineEvent>) {
    controller_with(&config(total))
}

/// Advance the clock in tick-sized steps, ticking after each
pub fn run_for(controller: &mut TestController, seconds: f64) {
    let step: f64 = 0.016;
    let mut elapsed = 0.0;
    while elapsed + 1e-9 < seconds {
        let dt = step.min(seconds - elapsed);
        controller.scheduler_mut().output_mut().advance(dt);
        controller.tick();
        elapsed += dt;
    }
}

/// Everything emitted so far
pub fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

pub fn count_kind(events: &[EngineEvent], kind: &str) -> usize {
    events.iter().filter(|e| e.kind() == kind).count()
}
