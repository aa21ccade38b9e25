//! Session wire protocol
//!
//! One persistent connection carries two kinds of frames:
//!
//! - **Binary** frames: raw PCM audio (format fixed by [`STREAM_FORMAT`], never
//!   declared per frame).
//! - **Text** frames: the readiness sentinel `PLAYING`, or a small JSON control
//!   vocabulary (heartbeat, session metadata).
//!
//! Client to server traffic is JSON only: the handshake naming the session and
//! `{"command": ...}` messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::MusicalContext;
use crate::{Error, Result};

/// Text sentinel sent by the server when generated audio starts flowing
pub const READY_SENTINEL: &str = "PLAYING";

/// Fixed PCM layout of every binary frame on the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bytes_per_sample: u16,
}

impl PcmFormat {
    /// Bytes occupied by one interleaved frame (all channels)
    pub const fn frame_bytes(&self) -> usize {
        self.channels as usize * self.bytes_per_sample as usize
    }
}

/// 16-bit signed little-endian, interleaved stereo, 48 kHz
pub const STREAM_FORMAT: PcmFormat = PcmFormat {
    sample_rate: 48_000,
    channels: 2,
    bytes_per_sample: 2,
};

/// First message on a new connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub session_id: String,
}

/// Commands the client may send after the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientCommand {
    /// Reply to a server heartbeat
    #[serde(rename = "heartbeat_ack")]
    HeartbeatAck,

    /// End of stream: the client has everything it needs
    #[serde(rename = "STOP")]
    Stop,

    /// Ask the generator to resume
    #[serde(rename = "PLAY")]
    Play,

    /// Ask the generator to hold
    #[serde(rename = "PAUSE")]
    Pause,
}

#[derive(Serialize)]
struct CommandEnvelope {
    command: ClientCommand,
}

impl ClientCommand {
    /// JSON text frame for this command, e.g. `{"command":"STOP"}`
    pub fn to_json(self) -> Result<String> {
        Ok(serde_json::to_string(&CommandEnvelope { command: self })?)
    }
}

impl Handshake {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Interpreted server text frame
#[derive(Debug, Clone, PartialEq)]
pub enum ServerText {
    /// `PLAYING` sentinel: the stream is live
    Ready,

    /// `{"command": "heartbeat"}`: must be acknowledged right away
    Heartbeat,

    /// Session metadata, either wire shape
    Context(MusicalContext),

    /// Valid JSON the client has no use for; carries a short description
    Ignored(String),
}

/// Classify a server text frame
///
/// Malformed JSON and metadata that fails to normalize are reported as
/// [`Error::Protocol`]; the caller decides whether to drop the frame.
pub fn parse_server_text(text: &str) -> Result<ServerText> {
    let trimmed = text.trim();
    if trimmed == READY_SENTINEL {
        return Ok(ServerText::Ready);
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| Error::Protocol(format!("unparseable text frame: {}", e)))?;

    let Value::Object(ref map) = value else {
        return match value {
            Value::String(ref s) if s == READY_SENTINEL => Ok(ServerText::Ready),
            _ => Ok(ServerText::Ignored(format!("non-object frame: {}", value))),
        };
    };

    if let Some(command) = map.get("command").and_then(Value::as_str) {
        return if command.eq_ignore_ascii_case("heartbeat") {
            Ok(ServerText::Heartbeat)
        } else {
            Ok(ServerText::Ignored(format!("command {}", command)))
        };
    }

    if map.get("type").and_then(Value::as_str) == Some("session_data") {
        let data = map
            .get("data")
            .cloned()
            .ok_or_else(|| Error::Protocol("session_data without data".to_string()))?;
        return MusicalContext::from_session_data(data).map(ServerText::Context);
    }

    if map.contains_key("global_context") || map.contains_key("musical_blocks") {
        return MusicalContext::from_legacy(value).map(ServerText::Context);
    }

    let kind = map
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("untyped")
        .to_string();
    Ok(ServerText::Ignored(format!("message type {}", kind)))
}
