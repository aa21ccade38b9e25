//! WebSocket session connection
//!
//! Connects with a timeout, sends the handshake, then runs one task that
//! multiplexes inbound frames and outbound commands. Heartbeats are answered
//! on this task without a round trip through the engine, so a busy engine
//! never makes the server think the client died.

use std::time::Duration;

use cuestream_common::protocol::{parse_server_text, ClientCommand, Handshake, ServerText};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::link::{Connector, Outbound, SessionEvent, SessionLink};
use crate::error::{Error, Result};

/// What to do with one inbound text frame
#[derive(Debug, Clone, PartialEq)]
pub enum TextRoute {
    /// Pass to the engine
    Forward(SessionEvent),
    /// Answer with `heartbeat_ack` right away
    Heartbeat,
    /// Nothing to do
    Skip(String),
}

/// Classify a text frame
pub fn route_text(text: &str) -> TextRoute {
    match parse_server_text(text) {
        Ok(ServerText::Ready) => TextRoute::Forward(SessionEvent::Ready),
        Ok(ServerText::Heartbeat) => TextRoute::Heartbeat,
        Ok(ServerText::Context(context)) => TextRoute::Forward(SessionEvent::Context(context)),
        Ok(ServerText::Ignored(what)) => TextRoute::Skip(what),
        Err(e) => TextRoute::Forward(SessionEvent::Malformed {
            reason: e.to_string(),
        }),
    }
}

/// Connects to the music server over WebSocket
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: url::Url,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(server_url: &str, connect_timeout: Duration) -> Result<Self> {
        let url = url::Url::parse(server_url)
            .map_err(|e| Error::Connection(format!("Invalid server URL '{}': {}", server_url, e)))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(Error::Connection(format!(
                "Server URL must use ws:// or wss://, got '{}'",
                server_url
            )));
        }
        Ok(Self {
            url,
            connect_timeout,
        })
    }
}

impl Connector for WebSocketConnector {
    fn connect(
        &mut self,
        session_id: &str,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<SessionLink> {
        let handshake = Handshake::new(session_id).to_json()?;
        let (tx, rx) = mpsc::unbounded_channel();

        info!("Connecting to {} for session {}", self.url, session_id);
        let task = tokio::spawn(run_connection(
            self.url.to_string(),
            self.connect_timeout,
            handshake,
            events,
            rx,
        ));
        Ok(SessionLink::new(tx, Some(task)))
    }
}

async fn run_connection(
    url: String,
    connect_timeout: Duration,
    handshake: String,
    events: mpsc::UnboundedSender<SessionEvent>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let closed = |reason: String| SessionEvent::Closed { reason };

    let ws_stream = match tokio::time::timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((stream, _))) => stream,
        Ok(Err(e)) => {
            error!("WebSocket connect to {} failed: {}", url, e);
            let _ = events.send(closed(format!("connect failed: {}", e)));
            return;
        }
        Err(_) => {
            error!("WebSocket connect to {} timed out after {:?}", url, connect_timeout);
            let _ = events.send(closed(format!(
                "connect timed out after {} ms",
                connect_timeout.as_millis()
            )));
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    if let Err(e) = write.send(Message::Text(handshake)).await {
        error!("Failed to send handshake: {}", e);
        let _ = events.send(closed(format!("handshake failed: {}", e)));
        return;
    }
    info!("Session connection open");
    if events.send(SessionEvent::Opened).is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = read.next() => {
                let forward = match msg {
                    Some(Ok(Message::Binary(bytes))) => SessionEvent::Chunk(bytes),
                    Some(Ok(Message::Text(text))) => match route_text(&text) {
                        TextRoute::Forward(event) => {
                            if let SessionEvent::Malformed { reason } = &event {
                                warn!("Discarding malformed text frame: {}", reason);
                            }
                            event
                        }
                        TextRoute::Heartbeat => {
                            let ack = match ClientCommand::HeartbeatAck.to_json() {
                                Ok(json) => json,
                                Err(e) => {
                                    error!("Failed to encode heartbeat ack: {}", e);
                                    continue;
                                }
                            };
                            if let Err(e) = write.send(Message::Text(ack)).await {
                                error!("Failed to answer heartbeat: {}", e);
                                let _ = events.send(closed(format!("heartbeat ack failed: {}", e)));
                                break;
                            }
                            debug!("Heartbeat acknowledged");
                            continue;
                        }
                        TextRoute::Skip(what) => {
                            debug!("Ignoring server frame: {}", what);
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| format!("server closed: {}", f.reason))
                            .unwrap_or_else(|| "server closed".to_string());
                        info!("{}", reason);
                        let _ = events.send(closed(reason));
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        let _ = events.send(closed(e.to_string()));
                        break;
                    }
                    None => {
                        let _ = events.send(closed("connection ended".to_string()));
                        break;
                    }
                };
                if events.send(forward).is_err() {
                    debug!("Engine gone, closing connection");
                    let _ = write.close().await;
                    break;
                }
            }
            out = outbound.recv() => match out {
                Some(Outbound::Command(command)) => {
                    let json = match command.to_json() {
                        Ok(json) => json,
                        Err(e) => {
                            error!("Failed to encode {:?}: {}", command, e);
                            continue;
                        }
                    };
                    debug!("Sending {}", json);
                    if let Err(e) = write.send(Message::Text(json)).await {
                        warn!("Failed to send {:?}: {}", command, e);
                    }
                }
                Some(Outbound::Close) | None => {
                    if let Err(e) = write.close().await {
                        debug!("Close handshake failed: {}", e);
                    }
                    info!("Session connection closed by client");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_sentinel() {
        assert_eq!(route_text("PLAYING"), TextRoute::Forward(SessionEvent::Ready));
    }

    #[test]
    fn test_route_heartbeat() {
        assert_eq!(route_text(r#"{"command":"heartbeat"}"#), TextRoute::Heartbeat);
    }

    #[test]
    fn test_route_malformed() {
        assert!(matches!(
            route_text("{not json"),
            TextRoute::Forward(SessionEvent::Malformed { .. })
        ));
    }

    #[test]
    fn test_route_unknown_message_is_skipped() {
        assert!(matches!(
            route_text(r#"{"type":"progress","value":3}"#),
            TextRoute::Skip(_)
        ));
    }

    #[test]
    fn test_route_context() {
        let route = route_text(r#"{"global_context":"noir","musical_blocks":[]}"#);
        let TextRoute::Forward(SessionEvent::Context(context)) = route else {
            panic!("expected context, got {:?}", route);
        };
        assert_eq!(context.global_context, "noir");
    }

    #[test]
    fn test_rejects_non_websocket_url() {
        assert!(WebSocketConnector::new("http://localhost:8000", Duration::from_secs(1)).is_err());
        assert!(WebSocketConnector::new("not a url", Duration::from_secs(1)).is_err());
        assert!(WebSocketConnector::new("ws://localhost:8000/ws/music", Duration::from_secs(1)).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_closed() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let mut connector =
            WebSocketConnector::new("ws://127.0.0.1:9/ws", Duration::from_millis(500)).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _link = connector.connect("session-1", tx).unwrap();

        match rx.recv().await {
            Some(SessionEvent::Closed { .. }) => {}
            other => panic!("expected Closed, got {:?}", other),
        }
    }
}
