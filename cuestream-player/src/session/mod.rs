//! Session connection
//!
//! Socket lifecycle and framing for one music session: handshake, binary
//! PCM frames, control text frames and the heartbeat.

pub mod link;
pub mod websocket;

pub use link::{Connector, Outbound, SessionEvent, SessionLink};
pub use websocket::WebSocketConnector;
