//! Integration tests for configuration loading and setting resolution
//!
//! Tests that touch CUESTREAM_* environment variables are marked #[serial]
//! so they never run in parallel with each other.

use cuestream_common::config::{
    resolve_setting, ConnectionLossPolicy, TomlConfig, DEFAULT_SERVER_URL, ENV_SERVER_URL,
    ENV_SESSION_ID,
};
use serial_test::serial;
use std::env;
use std::io::Write;

#[test]
fn test_load_from_explicit_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
server_url = "ws://stream.test:9000/ws/music"
session_id = "from-file"

[playback]
underrun_threshold_secs = 0.3
resume_threshold_secs = 1.5
tick_interval_ms = 10

[connection]
connect_timeout_ms = 2500
on_connection_loss = "stop"
forward_transport_commands = true

[logging]
level = "debug"
"#
    )
    .unwrap();

    let config = TomlConfig::load_or_default(Some(file.path())).unwrap();
    assert_eq!(config.playback.underrun_threshold_secs, 0.3);
    assert_eq!(config.playback.resume_threshold_secs, 1.5);
    assert_eq!(config.playback.tick_interval_ms, 10);
    assert_eq!(config.connection.connect_timeout_ms, 2500);
    assert_eq!(config.connection.on_connection_loss, ConnectionLossPolicy::Stop);
    assert!(config.connection.forward_transport_commands);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_missing_explicit_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(TomlConfig::load_or_default(Some(&missing)).is_err());
}

#[test]
fn test_unknown_policy_is_rejected() {
    let result = TomlConfig::from_toml_str("[connection]\non_connection_loss = \"retry\"\n");
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_cli_beats_env_and_file() {
    env::set_var(ENV_SERVER_URL, "ws://env.test/ws");
    let config = TomlConfig {
        server_url: Some("ws://file.test/ws".to_string()),
        ..TomlConfig::default()
    };

    assert_eq!(config.resolve_server_url(Some("ws://cli.test/ws")), "ws://cli.test/ws");
    env::remove_var(ENV_SERVER_URL);
}

#[test]
#[serial]
fn test_env_beats_file() {
    env::set_var(ENV_SESSION_ID, "env-session");
    let config = TomlConfig {
        session_id: Some("file-session".to_string()),
        ..TomlConfig::default()
    };

    assert_eq!(config.resolve_session_id(None).as_deref(), Some("env-session"));
    env::remove_var(ENV_SESSION_ID);
}

#[test]
#[serial]
fn test_file_then_compiled_default() {
    env::remove_var(ENV_SERVER_URL);
    env::remove_var(ENV_SESSION_ID);

    let config = TomlConfig {
        server_url: Some("ws://file.test/ws".to_string()),
        ..TomlConfig::default()
    };
    assert_eq!(config.resolve_server_url(None), "ws://file.test/ws");

    let bare = TomlConfig::default();
    assert_eq!(bare.resolve_server_url(None), DEFAULT_SERVER_URL);
    assert_eq!(bare.resolve_session_id(None), None);
}

#[test]
#[serial]
fn test_empty_env_value_is_ignored() {
    env::set_var("CUESTREAM_TEST_EMPTY", "");
    assert_eq!(
        resolve_setting(None, "CUESTREAM_TEST_EMPTY", Some("fallback")).as_deref(),
        Some("fallback")
    );
    env::remove_var("CUESTREAM_TEST_EMPTY");
}
