//! Configuration loading and setting resolution
//!
//! Bootstrap configuration lives in a small TOML file. Every field has a
//! built-in default, so a missing file is a warning, not a failure.
//!
//! Settings that identify the stream (server URL, session ID) resolve in
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding `server_url`
pub const ENV_SERVER_URL: &str = "CUESTREAM_SERVER_URL";

/// Environment variable overriding `session_id`
pub const ENV_SESSION_ID: &str = "CUESTREAM_SESSION_ID";

/// Default streaming endpoint
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8000/ws/music";

/// What the engine does when the connection drops mid-stream
///
/// Reconnecting is not offered: the server cannot resume a generated stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionLossPolicy {
    /// Treat what is buffered as the whole stream and play it out
    #[default]
    EndStream,
    /// Stop the engine as if the owner had called stop()
    Stop,
}

/// Playback timing settings
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackSettings {
    /// Buffered-ahead margin (seconds) below which playback stalls
    #[serde(default = "default_underrun_threshold")]
    pub underrun_threshold_secs: f64,

    /// Buffered-ahead margin (seconds) that must be exceeded to resume
    #[serde(default = "default_resume_threshold")]
    pub resume_threshold_secs: f64,

    /// Underrun polling period
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default)]
    pub on_connection_loss: ConnectionLossPolicy,

    /// Mirror pause/play to the server as PAUSE/PLAY commands
    #[serde(default)]
    pub forward_transport_commands: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server_url: Option<String>,

    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub playback: PlaybackSettings,

    #[serde(default)]
    pub connection: ConnectionSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_underrun_threshold() -> f64 {
    0.2
}

fn default_resume_threshold() -> f64 {
    1.0
}

fn default_tick_interval_ms() -> u64 {
    16
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            underrun_threshold_secs: default_underrun_threshold(),
            resume_threshold_secs: default_resume_threshold(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            on_connection_loss: ConnectionLossPolicy::default(),
            forward_transport_commands: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            session_id: None,
            playback: PlaybackSettings::default(),
            connection: ConnectionSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, or the platform default location
    ///
    /// An explicit path must exist. A missing default file falls back to
    /// built-in defaults with a warning.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading configuration from {}", path.display());
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let p = &self.playback;
        if p.underrun_threshold_secs.is_nan() || p.underrun_threshold_secs < 0.0 {
            return Err(Error::Config(format!(
                "underrun_threshold_secs must be non-negative, got {}",
                p.underrun_threshold_secs
            )));
        }
        if p.resume_threshold_secs.is_nan() || p.resume_threshold_secs <= p.underrun_threshold_secs {
            return Err(Error::Config(format!(
                "resume_threshold_secs ({}) must exceed underrun_threshold_secs ({})",
                p.resume_threshold_secs, p.underrun_threshold_secs
            )));
        }
        if p.tick_interval_ms == 0 {
            return Err(Error::Config("tick_interval_ms must be positive".to_string()));
        }
        if self.connection.connect_timeout_ms == 0 {
            return Err(Error::Config("connect_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Server URL after CLI > env > TOML > default resolution
    pub fn resolve_server_url(&self, cli_arg: Option<&str>) -> String {
        resolve_setting(cli_arg, ENV_SERVER_URL, self.server_url.as_deref())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    /// Session ID after CLI > env > TOML resolution
    pub fn resolve_session_id(&self, cli_arg: Option<&str>) -> Option<String> {
        resolve_setting(cli_arg, ENV_SESSION_ID, self.session_id.as_deref())
    }
}

/// Resolve one setting: CLI argument, then environment variable, then file value
pub fn resolve_setting(
    cli_arg: Option<&str>,
    env_var_name: &str,
    file_value: Option<&str>,
) -> Option<String> {
    // Priority 1: Command-line argument
    if let Some(value) = cli_arg {
        return Some(value.to_string());
    }

    // Priority 2: Environment variable
    if let Ok(value) = std::env::var(env_var_name) {
        if !value.is_empty() {
            return Some(value);
        }
    }

    // Priority 3: TOML config file
    file_value.map(str::to_string)
}

/// Platform config file location: `<config dir>/cuestream/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cuestream").join("config.toml"))
}
