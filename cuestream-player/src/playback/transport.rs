//! Transport controller
//!
//! The play/pause/seek/stop surface the video player drives in lock-step
//! with its own controls. Owns the scheduler, the session link and the
//! musical context sink, and is the single place session events enter the
//! engine.

use chrono::Utc;
use cuestream_common::config::{ConnectionLossPolicy, ConnectionSettings};
use cuestream_common::protocol::ClientCommand;
use cuestream_common::{EngineEvent, EngineState, EventBus};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::scheduler::{ChunkOutcome, PlaybackScheduler};
use crate::audio::{decode_chunk, AudioOutput};
use crate::config::EngineConfig;
use crate::context::{ContextSnapshot, MusicalContextSink};
use crate::session::{Connector, SessionEvent, SessionLink};
use crate::state::EngineStatus;

/// Engine front end: transport operations plus session event intake
pub struct TransportController<O: AudioOutput, C: Connector> {
    scheduler: PlaybackScheduler<O>,
    connector: C,
    session_id: String,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
    link: Option<SessionLink>,
    connection_attempted: bool,
    ready: bool,
    context: MusicalContextSink,
    events: EventBus,
    connection: ConnectionSettings,
}

impl<O: AudioOutput, C: Connector> TransportController<O, C> {
    /// Create an idle controller
    ///
    /// `session_tx` is handed to the connector; whoever owns the matching
    /// receiver feeds its events back through [`on_session_event`](Self::on_session_event).
    pub fn new(
        output: O,
        connector: C,
        config: &EngineConfig,
        session_tx: mpsc::UnboundedSender<SessionEvent>,
        events: EventBus,
    ) -> Self {
        Self {
            scheduler: PlaybackScheduler::new(
                output,
                &config.playback,
                config.sample_rate,
                config.total_media_duration,
                events.clone(),
            ),
            connector,
            session_id: config.session_id.clone(),
            session_tx,
            link: None,
            connection_attempted: false,
            ready: false,
            context: MusicalContextSink::new(events.clone()),
            events,
            connection: config.connection.clone(),
        }
    }

    /// Start or resume playback
    ///
    /// Opens the connection on first use. Has no effect while already
    /// playing, buffering or connecting, and is ignored once stopped.
    pub fn play(&mut self) {
        match self.scheduler.state() {
            EngineState::Stopped => self.ignored("play"),
            EngineState::Playing | EngineState::Buffering | EngineState::Connecting => {
                debug!("play() while {}: no change", self.scheduler.state());
            }
            EngineState::Idle => {
                self.scheduler.begin_connecting();
                self.open_connection();
            }
            EngineState::Paused => {
                if self.scheduler.buffered_duration() > 0.0 {
                    self.scheduler.start_playback();
                } else {
                    self.scheduler.begin_connecting();
                    if self.link.is_none() && !self.connection_attempted {
                        self.open_connection();
                    }
                }
                self.forward(ClientCommand::Play);
            }
        }
    }

    /// Hold playback, cancelling every scheduled source
    pub fn pause(&mut self) {
        let was = self.scheduler.state();
        self.scheduler.pause();
        if matches!(
            was,
            EngineState::Playing | EngineState::Buffering | EngineState::Connecting
        ) {
            self.forward(ClientCommand::Pause);
        }
    }

    /// Move to `position` (clamped to what is buffered); returns the new position
    pub fn seek(&mut self, position: f64) -> f64 {
        if self.scheduler.state() == EngineState::Stopped {
            self.ignored("seek");
            return self.scheduler.media_time();
        }
        self.scheduler.seek(position)
    }

    /// Terminal stop: close the connection, drop buffered audio and context
    pub fn stop(&mut self) {
        if let Some(link) = self.link.take() {
            link.close();
        }
        self.ready = false;
        self.context.clear();
        self.scheduler.stop();
    }

    /// Update the authoritative media length
    pub fn set_total_media_duration(&mut self, duration: f64) {
        if self.scheduler.set_total_media_duration(duration) {
            self.finish_stream();
        }
    }

    /// Periodic poll: underrun detection and source pruning
    pub fn tick(&mut self) {
        self.scheduler.tick();
    }

    /// Apply one event from the connection task
    pub fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Opened => info!("Session {} connected", self.session_id),
            SessionEvent::Ready => self.on_ready(),
            SessionEvent::Chunk(bytes) => self.on_chunk(&bytes),
            SessionEvent::Context(context) => {
                if self.link.is_some() {
                    self.context.update(context);
                } else {
                    debug!("Dropping musical context received after disconnect");
                }
            }
            SessionEvent::Malformed { reason } => {
                warn!("Malformed server message discarded: {}", reason);
                self.events.emit_lossy(EngineEvent::MalformedMessage {
                    reason,
                    timestamp: Utc::now(),
                });
            }
            SessionEvent::Closed { reason } => {
                if self.link.is_none() {
                    debug!("Connection closed after client close: {}", reason);
                    return;
                }
                self.on_connection_lost(reason);
            }
        }
    }

    pub fn state(&self) -> EngineState {
        self.scheduler.state()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_buffering(&self) -> bool {
        self.scheduler.is_buffering()
    }

    pub fn buffered_duration(&self) -> f64 {
        self.scheduler.buffered_duration()
    }

    pub fn media_time(&self) -> f64 {
        self.scheduler.media_time()
    }

    pub fn musical_context(&self) -> ContextSnapshot {
        self.context.current()
    }

    pub fn subscribe_context(&self) -> watch::Receiver<ContextSnapshot> {
        self.context.subscribe()
    }

    pub fn scheduler(&self) -> &PlaybackScheduler<O> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut PlaybackScheduler<O> {
        &mut self.scheduler
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.scheduler.state(),
            is_ready: self.ready,
            is_buffering: self.scheduler.is_buffering(),
            media_time: self.scheduler.media_time(),
            buffered_duration: self.scheduler.buffered_duration(),
            total_media_duration: self.scheduler.total_media_duration(),
            scheduled_sources: self.scheduler.scheduled_sources(),
            stream_complete: self.scheduler.stream_complete(),
        }
    }

    fn open_connection(&mut self) {
        self.connection_attempted = true;
        match self
            .connector
            .connect(&self.session_id, self.session_tx.clone())
        {
            Ok(link) => self.link = Some(link),
            Err(e) => {
                error!("Could not open session connection: {}", e);
                self.on_connection_lost(e.to_string());
            }
        }
    }

    fn on_ready(&mut self) {
        if self.scheduler.state() == EngineState::Stopped {
            return;
        }
        info!("Stream is live");
        self.ready = true;
        self.events.emit_lossy(EngineEvent::StreamReady {
            timestamp: Utc::now(),
        });
        if self.scheduler.state() == EngineState::Connecting {
            self.scheduler.start_playback();
        }
    }

    fn on_chunk(&mut self, bytes: &[u8]) {
        let buffer = decode_chunk(bytes);
        if self.scheduler.push_chunk(buffer) == ChunkOutcome::Completed {
            self.finish_stream();
        }
    }

    /// Everything is buffered: tell the server and hang up
    fn finish_stream(&mut self) {
        self.ready = false;
        if let Some(link) = self.link.take() {
            info!("Full media buffered, sending STOP");
            link.send(ClientCommand::Stop);
            link.close();
        }
    }

    fn on_connection_lost(&mut self, reason: String) {
        error!("Session connection lost: {}", reason);
        self.link = None;
        self.ready = false;
        self.context.clear();
        self.events.emit_lossy(EngineEvent::ConnectionLost {
            reason,
            timestamp: Utc::now(),
        });

        if self.scheduler.state() == EngineState::Stopped {
            return;
        }
        match self.connection.on_connection_loss {
            ConnectionLossPolicy::EndStream if self.scheduler.buffered_duration() > 0.0 => {
                self.scheduler.truncate_to_buffered();
            }
            _ => self.scheduler.stop(),
        }
    }

    fn forward(&self, command: ClientCommand) {
        if !self.connection.forward_transport_commands {
            return;
        }
        if let Some(link) = &self.link {
            link.send(command);
        }
    }

    fn ignored(&self, command: &str) {
        let state = self.scheduler.state();
        warn!("{}() ignored while {}", command, state);
        self.events.emit_lossy(EngineEvent::CommandIgnored {
            command: command.to_string(),
            state,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ManualOutput;
    use crate::session::Outbound;

    /// Records connections and keeps each link's outbound receiver
    #[derive(Default)]
    struct RecordingConnector {
        outbound: Vec<mpsc::UnboundedReceiver<Outbound>>,
    }

    impl Connector for RecordingConnector {
        fn connect(
            &mut self,
            _session_id: &str,
            _events: mpsc::UnboundedSender<SessionEvent>,
        ) -> crate::error::Result<SessionLink> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.outbound.push(rx);
            Ok(SessionLink::new(tx, None))
        }
    }

    fn controller(total: f64) -> TransportController<ManualOutput, RecordingConnector> {
        let (tx, _rx) = mpsc::unbounded_channel();
        TransportController::new(
            ManualOutput::new(48_000),
            RecordingConnector::default(),
            &EngineConfig::new("ws://localhost:8000/ws/music", "session-1", total),
            tx,
            EventBus::default(),
        )
    }

    fn one_second() -> SessionEvent {
        SessionEvent::Chunk(vec![0u8; 48_000 * 4])
    }

    #[test]
    fn test_play_connects_once() {
        let mut c = controller(10.0);
        c.play();
        c.play();
        assert_eq!(c.state(), EngineState::Connecting);
        assert_eq!(c.connector().outbound.len(), 1);
        assert!(c.scheduler().output().started().is_empty());
    }

    #[test]
    fn test_ready_sentinel_starts_playing() {
        let mut c = controller(10.0);
        c.play();
        c.on_session_event(SessionEvent::Ready);
        assert!(c.is_ready());
        assert_eq!(c.state(), EngineState::Playing);
    }

    #[test]
    fn test_seek_ignored_after_stop() {
        let mut c = controller(10.0);
        let mut rx = c.events.subscribe();
        c.play();
        c.stop();
        c.seek(3.0);
        c.play();

        let ignored: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| matches!(e, EngineEvent::CommandIgnored { .. }))
            .collect();
        assert_eq!(ignored.len(), 2);
    }

    #[test]
    fn test_malformed_surfaces_event() {
        let mut c = controller(10.0);
        let mut rx = c.events.subscribe();
        c.on_session_event(SessionEvent::Malformed {
            reason: "bad".to_string(),
        });
        assert!(matches!(
            rx.try_recv().unwrap(),
            EngineEvent::MalformedMessage { .. }
        ));
    }

    #[test]
    fn test_connection_loss_without_audio_stops() {
        let mut c = controller(10.0);
        c.play();
        c.on_session_event(SessionEvent::Closed {
            reason: "refused".to_string(),
        });
        assert_eq!(c.state(), EngineState::Stopped);
        assert!(!c.is_ready());
    }

    #[test]
    fn test_connection_loss_ends_stream_with_buffered_audio() {
        let mut c = controller(10.0);
        c.play();
        c.on_session_event(one_second());
        c.on_session_event(one_second());
        c.on_session_event(SessionEvent::Closed {
            reason: "reset".to_string(),
        });

        assert!(c.scheduler().stream_complete());
        assert_eq!(c.state(), EngineState::Playing);
        // Buffered audio still plays out
        assert_eq!(c.scheduler().output().live_sources().len(), 2);
    }

    #[test]
    fn test_transport_still_works_after_stream_complete() {
        let mut c = controller(2.0);
        c.play();
        c.on_session_event(one_second());
        c.on_session_event(one_second());
        assert!(c.scheduler().stream_complete());
        assert!(c.link.is_none());

        c.pause();
        assert_eq!(c.state(), EngineState::Paused);
        assert_eq!(c.seek(1.5), 1.5);
        c.play();
        assert_eq!(c.state(), EngineState::Playing);
        let live = c.scheduler().output().live_sources();
        assert_eq!(live.len(), 1);
        assert!((live[0].offset - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_forwarding_disabled_by_default() {
        let mut c = controller(10.0);
        c.play();
        c.on_session_event(one_second());
        c.pause();
        c.play();
        assert!(c.connector.outbound[0].try_recv().is_err());
    }
}
