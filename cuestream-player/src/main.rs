//! cuestream player - command-line front end
//!
//! Connects to a music session, plays the stream and takes transport
//! commands on stdin, printing status and engine events as JSON lines.
//! A video player can drive it over pipes in lock-step with its own
//! controls.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cuestream_common::config::TomlConfig;
use cuestream_common::EventBus;
use cuestream_player::audio::{AudioOutput, HeadlessOutput};
use cuestream_player::session::WebSocketConnector;
use cuestream_player::{build_engine, EngineConfig, EngineHandle, EngineStatus, TransportCommand};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::{parse_line, CliCommand, HELP};

/// Command-line arguments for cuestream-player
#[derive(Parser, Debug)]
#[command(name = "cuestream-player")]
#[command(about = "Plays a generated soundtrack stream in sync with video transport commands")]
#[command(version)]
struct Args {
    /// Music server WebSocket URL (overrides CUESTREAM_SERVER_URL and the config file)
    #[arg(long)]
    server_url: Option<String>,

    /// Session to stream (overrides CUESTREAM_SESSION_ID and the config file)
    #[arg(long)]
    session_id: Option<String>,

    /// Video length in seconds; 0 if not known yet
    #[arg(short, long, default_value = "0")]
    duration: f64,

    /// Config file (default: <config dir>/cuestream/config.toml)
    #[arg(short, long, env = "CUESTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Keep time without an audio device
    #[arg(long)]
    headless: bool,

    /// Output device name (default device if omitted)
    #[arg(long)]
    device: Option<String>,

    /// Wait for a play command instead of starting right away
    #[arg(long)]
    paused: bool,

    /// Print the available output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let file_config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    // RUST_LOG wins over the config file's level
    let level = file_config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("cuestream_player={},cuestream_common={}", level, level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if args.list_devices {
        return list_devices();
    }

    let config = EngineConfig::resolve(
        &file_config,
        args.server_url.as_deref(),
        args.session_id.as_deref(),
        args.duration,
    )
    .context("Invalid configuration")?;

    info!(
        "Starting cuestream player: server {}, session {}, duration {:.1}s",
        config.server_url, config.session_id, config.total_media_duration
    );

    let connector = WebSocketConnector::new(&config.server_url, config.connect_timeout())
        .context("Invalid server URL")?;

    if args.headless {
        return run_session(HeadlessOutput::new(config.sample_rate), connector, &config, &args).await;
    }

    run_with_device(connector, &config, &args).await
}

#[cfg(feature = "device-output")]
async fn run_with_device(connector: WebSocketConnector, config: &EngineConfig, args: &Args) -> Result<()> {
    let output = cuestream_player::audio::DeviceOutput::open(args.device.as_deref(), config.sample_rate)
        .context("Failed to open audio device")?;
    run_session(output, connector, config, args).await
}

#[cfg(not(feature = "device-output"))]
async fn run_with_device(connector: WebSocketConnector, config: &EngineConfig, args: &Args) -> Result<()> {
    if args.device.is_some() {
        warn!("--device given but built without device-output; ignoring");
    }
    warn!("Built without device-output, running headless");
    run_session(HeadlessOutput::new(config.sample_rate), connector, config, args).await
}

#[cfg(feature = "device-output")]
fn list_devices() -> Result<()> {
    let devices = cuestream_player::audio::DeviceOutput::list_devices()
        .context("Failed to list audio devices")?;
    for name in devices {
        println!("{}", name);
    }
    Ok(())
}

#[cfg(not(feature = "device-output"))]
fn list_devices() -> Result<()> {
    anyhow::bail!("built without device-output; no devices to list")
}

/// Run the engine and the stdin command loop until stop, EOF or a signal
async fn run_session<O: AudioOutput>(
    output: O,
    connector: WebSocketConnector,
    config: &EngineConfig,
    args: &Args,
) -> Result<()> {
    let events = EventBus::default();
    let (runner, handle) = build_engine(output, connector, config, events);

    let mut event_rx = handle.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            if let Ok(line) = serde_json::to_string(&json!({ "event": event })) {
                println!("{}", line);
            }
        }
    });

    let autoplay = !args.paused;
    let (_, result) = tokio::join!(runner.run(), drive(handle, autoplay));
    info!("Player shutdown complete");
    result
}

/// Feed stdin commands to the engine; dropping the handle ends the engine
async fn drive(handle: EngineHandle, autoplay: bool) -> Result<()> {
    if autoplay {
        print_status(&handle.play().await?)?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("stdin closed");
                    break;
                };
                match parse_line(&line) {
                    Ok(Some(CliCommand::Transport(command))) => {
                        let status = handle.send(command).await?;
                        print_status(&status)?;
                        if command == TransportCommand::Stop {
                            return Ok(());
                        }
                    }
                    Ok(Some(CliCommand::Context)) => print_context(&handle).await?,
                    Ok(Some(CliCommand::Help)) => eprintln!("{}", HELP),
                    Ok(None) => {}
                    Err(message) => eprintln!("{}", message),
                }
            }
            _ = &mut shutdown => break,
        }
    }

    print_status(&handle.stop().await?)?;
    Ok(())
}

fn print_status(status: &EngineStatus) -> Result<()> {
    let line = serde_json::to_string(&json!({ "status": status }))
        .context("Failed to encode status")?;
    println!("{}", line);
    Ok(())
}

async fn print_context(handle: &EngineHandle) -> Result<()> {
    let status = handle.status().await?;
    let value = match handle.musical_context() {
        Some(context) => json!({
            "context": {
                "global_context": context.global_context,
                "musical_blocks": context.musical_blocks.len(),
                "scenes": context.scene_analysis.len(),
                "media_time": status.media_time,
                "active_block": context.active_block(status.media_time),
                "active_scene": context.active_scene(status.media_time),
            }
        }),
        None => json!({ "context": null }),
    };
    println!("{}", serde_json::to_string(&value).context("Failed to encode context")?);
    Ok(())
}

/// Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
