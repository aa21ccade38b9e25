//! cuestream-player specific configuration

use std::time::Duration;

use cuestream_common::config::{ConnectionSettings, PlaybackSettings, TomlConfig};
use cuestream_common::protocol::STREAM_FORMAT;

use crate::error::{Error, Result};

/// Everything an engine instance needs, resolved from CLI, environment and file
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub server_url: String,
    pub session_id: String,
    /// Authoritative media length in seconds; `<= 0` while unknown
    pub total_media_duration: f64,
    /// Rate the buffer timeline counts frames at
    pub sample_rate: u32,
    pub playback: PlaybackSettings,
    pub connection: ConnectionSettings,
}

impl EngineConfig {
    /// Defaults for one session
    pub fn new(
        server_url: impl Into<String>,
        session_id: impl Into<String>,
        total_media_duration: f64,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            session_id: session_id.into(),
            total_media_duration,
            sample_rate: STREAM_FORMAT.sample_rate,
            playback: PlaybackSettings::default(),
            connection: ConnectionSettings::default(),
        }
    }

    /// Resolve from a loaded file plus CLI values (CLI > env > file > default)
    pub fn resolve(
        file: &TomlConfig,
        cli_server_url: Option<&str>,
        cli_session_id: Option<&str>,
        total_media_duration: f64,
    ) -> Result<Self> {
        let session_id = file.resolve_session_id(cli_session_id).ok_or_else(|| {
            Error::Config(
                "No session id: pass --session-id, set CUESTREAM_SESSION_ID or add session_id to the config file"
                    .to_string(),
            )
        })?;
        if !total_media_duration.is_finite() {
            return Err(Error::Config(format!(
                "Media duration must be finite, got {}",
                total_media_duration
            )));
        }

        Ok(Self {
            server_url: file.resolve_server_url(cli_server_url),
            session_id,
            total_media_duration,
            sample_rate: STREAM_FORMAT.sample_rate,
            playback: file.playback.clone(),
            connection: file.connection.clone(),
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.playback.tick_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.connect_timeout_ms)
    }
}
