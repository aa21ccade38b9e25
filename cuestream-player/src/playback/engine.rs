//! Engine runtime
//!
//! One task owns the [`TransportController`] and drives it from a single
//! `tokio::select!` loop over three inputs:
//! - session events from the connection task (FIFO)
//! - a fixed-rate tick for underrun polling
//! - transport commands from [`EngineHandle`]s, each answered with the
//!   status right after the command was applied
//!
//! Inputs are polled in that order, so a command always sees every session
//! event that arrived before it.
//!
//! Nothing outside the loop touches engine state, so no locks are needed.
//! After every step the loop republishes [`EngineStatus`] on a watch channel.
//!
//! The runner is a plain future: await it on the thread that created the
//! audio output (a cpal stream cannot move between threads), or spawn it
//! when the output is `Send`.

use std::time::Duration;

use cuestream_common::{EngineEvent, EventBus};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::transport::TransportController;
use crate::audio::AudioOutput;
use crate::config::EngineConfig;
use crate::context::ContextSnapshot;
use crate::error::{Error, Result};
use crate::session::{Connector, SessionEvent};
use crate::state::{EngineStatus, StatusPublisher};

/// Capacity of the command queue between handles and the engine
const COMMAND_QUEUE_DEPTH: usize = 64;

/// Operations an owner can request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportCommand {
    Play,
    Pause,
    Seek(f64),
    Stop,
    SetTotalMediaDuration(f64),
    /// No-op; replies with the current status
    Status,
}

struct CommandRequest {
    command: TransportCommand,
    reply: oneshot::Sender<EngineStatus>,
}

/// Cloneable owner-side handle to a running engine
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<CommandRequest>,
    status: watch::Receiver<EngineStatus>,
    context: watch::Receiver<ContextSnapshot>,
    events: EventBus,
}

impl EngineHandle {
    /// Send a command and wait for the status after it was applied
    pub async fn send(&self, command: TransportCommand) -> Result<EngineStatus> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(CommandRequest { command, reply })
            .await
            .map_err(|_| Error::EngineGone(format!("{:?} not delivered", command)))?;
        rx.await
            .map_err(|_| Error::EngineGone(format!("no reply to {:?}", command)))
    }

    pub async fn play(&self) -> Result<EngineStatus> {
        self.send(TransportCommand::Play).await
    }

    pub async fn pause(&self) -> Result<EngineStatus> {
        self.send(TransportCommand::Pause).await
    }

    pub async fn seek(&self, position: f64) -> Result<EngineStatus> {
        self.send(TransportCommand::Seek(position)).await
    }

    pub async fn stop(&self) -> Result<EngineStatus> {
        self.send(TransportCommand::Stop).await
    }

    pub async fn set_total_media_duration(&self, duration: f64) -> Result<EngineStatus> {
        self.send(TransportCommand::SetTotalMediaDuration(duration))
            .await
    }

    /// Fresh status from the engine task
    pub async fn status(&self) -> Result<EngineStatus> {
        self.send(TransportCommand::Status).await
    }

    /// Last published status, without a round trip
    pub fn snapshot(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.status.borrow().is_ready
    }

    pub fn is_buffering(&self) -> bool {
        self.status.borrow().is_buffering
    }

    pub fn buffered_duration(&self) -> f64 {
        self.status.borrow().buffered_duration
    }

    pub fn musical_context(&self) -> ContextSnapshot {
        self.context.borrow().clone()
    }

    /// Watch status changes (e.g. `is_buffering` to hold the video)
    pub fn watch_status(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    pub fn watch_context(&self) -> watch::Receiver<ContextSnapshot> {
        self.context.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }
}

/// The engine loop and everything it owns
pub struct EngineRunner<O: AudioOutput, C: Connector> {
    controller: TransportController<O, C>,
    commands: mpsc::Receiver<CommandRequest>,
    session_events: mpsc::UnboundedReceiver<SessionEvent>,
    status: StatusPublisher,
    tick_interval: Duration,
}

/// Build an engine: the runner to drive and a handle to control it
pub fn build_engine<O: AudioOutput, C: Connector>(
    output: O,
    connector: C,
    config: &EngineConfig,
    events: EventBus,
) -> (EngineRunner<O, C>, EngineHandle) {
    let (session_tx, session_rx) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

    let controller = TransportController::new(output, connector, config, session_tx, events.clone());
    let status = StatusPublisher::new(controller.status());
    let handle = EngineHandle {
        commands: command_tx,
        status: status.subscribe(),
        context: controller.subscribe_context(),
        events,
    };

    let runner = EngineRunner {
        controller,
        commands: command_rx,
        session_events: session_rx,
        status,
        tick_interval: config.tick_interval(),
    };
    (runner, handle)
}

impl<O: AudioOutput, C: Connector> EngineRunner<O, C> {
    /// Run until every [`EngineHandle`] is dropped
    ///
    /// A stopped engine keeps answering status requests; dropping the last
    /// handle stops it if needed and ends the loop.
    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(self.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Engine loop started (tick {:?})", self.tick_interval);

        loop {
            tokio::select! {
                biased;

                Some(event) = self.session_events.recv() => {
                    self.controller.on_session_event(event);
                }
                _ = tick.tick() => {
                    self.controller.tick();
                }
                request = self.commands.recv() => match request {
                    Some(CommandRequest { command, reply }) => {
                        self.apply(command);
                        let status = self.controller.status();
                        self.status.publish(status.clone());
                        if reply.send(status).is_err() {
                            debug!("Caller dropped before {:?} reply", command);
                        }
                        continue;
                    }
                    None => {
                        info!("All engine handles dropped, shutting down");
                        self.controller.stop();
                        self.status.publish(self.controller.status());
                        break;
                    }
                }
            }
            self.status.publish(self.controller.status());
        }
    }

    fn apply(&mut self, command: TransportCommand) {
        debug!("Transport command {:?}", command);
        match command {
            TransportCommand::Play => self.controller.play(),
            TransportCommand::Pause => self.controller.pause(),
            TransportCommand::Seek(position) => {
                self.controller.seek(position);
            }
            TransportCommand::Stop => self.controller.stop(),
            TransportCommand::SetTotalMediaDuration(duration) => {
                self.controller.set_total_media_duration(duration)
            }
            TransportCommand::Status => {}
        }
    }
}
