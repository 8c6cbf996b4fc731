//! Main Entrypoint for the Playtalk terminal client
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and the command line.
//! 2. Opening the audio output device and preparing microphone capture.
//! 3. Running the session controller against the Play.ai talk endpoint.
//! 4. Driving the session from the terminal until quit or Ctrl+C.

use anyhow::{Context, anyhow};
use clap::Parser;
use playai_realtime::PlayAiConnector;
use playtalk::{audio::playback_or_silent, config::Config, console};
use playtalk_core::SessionController;
use playtalk_native_audio::{CpalCapture, CpalPlayback};
use std::{sync::Arc, time::Duration};
use tokio::io::BufReader;
use tracing::{error, info};

/// Talk to a Play.ai agent from the terminal.
#[derive(Parser, Debug)]
#[command(name = "playtalk")]
#[command(version, about, long_about = None)]
struct Args {
    /// Connect as soon as the client starts
    #[arg(long)]
    auto_connect: bool,

    /// Overrides PLAY_AI_BASE_URL
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let result = runtime.block_on(run(Args::parse()));
    // A pending stdin read would otherwise keep the runtime alive.
    runtime.shutdown_timeout(Duration::from_millis(250));
    result
}

async fn run(args: Args) -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    // --- 3. Initialize Audio Devices ---
    let playback = playback_or_silent(CpalPlayback::open().inspect(|playback| {
        info!(sample_rate = playback.sample_rate(), "Audio output ready");
    }));
    let capture = CpalCapture::new();

    // --- 4. Start the Session Controller ---
    let session_config = Arc::new(config.session_config());
    info!(
        agent_id = %session_config.agent_id,
        address = %session_config.talk_url(),
        "Configuration loaded. Starting session controller..."
    );
    let (handle, controller) = SessionController::spawn(
        session_config,
        Arc::new(PlayAiConnector::new()),
        Box::new(capture),
        playback,
    );

    if args.auto_connect {
        handle.connect().await?;
    }

    // --- 5. Run the Console ---
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = console::run(&handle, stdin, tokio::io::stdout()) => {
            if let Err(e) = result {
                error!(error = %e, "Console failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal. Shutting down gracefully...");
        }
    }

    handle.shutdown().await?;
    controller.await.context("Session controller panicked")?;
    info!("Playtalk has shut down.");
    Ok(())
}
