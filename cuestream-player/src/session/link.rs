//! Session connection seam
//!
//! A [`Connector`] opens the connection for one session and runs it on its
//! own task. The engine only sees typed [`SessionEvent`]s arriving on a
//! channel, and talks back through the returned [`SessionLink`].

use cuestream_common::protocol::ClientCommand;
use cuestream_common::MusicalContext;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;

/// What the connection task reports to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Transport open and handshake sent
    Opened,
    /// Server sent the `PLAYING` sentinel
    Ready,
    /// Binary PCM frame
    Chunk(Vec<u8>),
    /// Musical context metadata
    Context(MusicalContext),
    /// Text frame that could not be interpreted; already dropped
    Malformed { reason: String },
    /// Connection failed or ended without the client asking
    Closed { reason: String },
}

/// Engine to connection task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outbound {
    /// Send a control command as a text frame
    Command(ClientCommand),
    /// Close the transport and end the task
    Close,
}

/// Handle to a running connection task
#[derive(Debug)]
pub struct SessionLink {
    tx: mpsc::UnboundedSender<Outbound>,
    task: Option<JoinHandle<()>>,
}

impl SessionLink {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>, task: Option<JoinHandle<()>>) -> Self {
        Self { tx, task }
    }

    /// Queue a command; false if the connection task has already ended
    pub fn send(&self, command: ClientCommand) -> bool {
        let sent = self.tx.send(Outbound::Command(command)).is_ok();
        if !sent {
            debug!("Dropping {:?}: connection task has ended", command);
        }
        sent
    }

    /// Ask the connection task to close; it finishes on its own
    pub fn close(self) {
        let _ = self.tx.send(Outbound::Close);
    }

    /// True once the connection task has ended
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed() || self.task.as_ref().is_some_and(|task| task.is_finished())
    }
}

/// Opens session connections
pub trait Connector {
    /// Start connecting for `session_id`
    ///
    /// Returns as soon as the connection task is running; failures to reach
    /// the server arrive later as [`SessionEvent::Closed`]. An error here
    /// means no task was started (e.g. an unusable server address).
    fn connect(
        &mut self,
        session_id: &str,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<SessionLink>;
}
