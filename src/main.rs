//! # camstick
//!
//! Camera-relative movement for games with a fixed movement frame.
//!
//! Reads a physical gamepad through evdev, rotates the movement stick by the
//! yaw offset accumulated from the camera stick and presents the result as a
//! virtual controller through uinput.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging with tracing subscriber (optionally to a file too)
//!    - Load or create the settings document
//!    - Open the physical controller and create the virtual devices
//!
//! 2. **Main Loop**
//!    - Run the calibration wizard if no valid profile exists (or `--recalibrate`)
//!    - Otherwise transform controller input at the configured poll rate
//!    - Sync the settings document every 500 ms in the background
//!    - `SIGUSR1` requests recalibration, `SIGUSR2` resets the yaw offset
//!
//! 3. **Graceful Shutdown**
//!    - Ctrl+C centers the virtual controller and flushes the document
//!
//! # Exit Codes
//!
//! - `0`: normal shutdown
//! - `2`: no controller found
//! - `3`: uinput unavailable
//! - `1`: anything else
//!
//! # Examples
//!
//! ```bash
//! camstick --list
//! camstick --config ~/.config/camstick/config.toml --log-file /tmp/camstick.log
//! camstick --recalibrate
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use camstick::config::{ConfigStore, DEFAULT_CONFIG_PATH};
use camstick::controller::evdev_source::{self, EvdevGamepad};
use camstick::error::CamStickError;
use camstick::output::uinput::{VirtualGamepad, VirtualKeyboardMouse};
use camstick::output::OutputDispatcher;
use camstick::persist::{DocumentSync, SYNC_PERIOD};
use camstick::pipeline::Runtime;
use camstick::shared::SharedConfig;

/// Default log file name when `--log-file` points at a directory-like path
const DEFAULT_LOG_FILE: &str = "camstick.log";

#[derive(Debug, Parser)]
#[command(name = "camstick", version)]
#[command(about = "Rotate a gamepad's movement stick to follow the camera")]
struct Cli {
    /// Run the calibration wizard even if a profile exists.
    #[arg(long)]
    recalibrate: bool,

    /// Settings document (.json or .toml).
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print detected controllers and exit.
    #[arg(long)]
    list: bool,

    /// Also write logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Sets up stderr logging plus the optional file sink.
///
/// The returned guard must live until exit so buffered lines get flushed.
fn init_logging(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map_or_else(|| DEFAULT_LOG_FILE.into(), |name| name.to_os_string());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    guard
}

/// Maps external requests delivered as Unix signals onto the shared state.
fn spawn_signal_handlers(shared: SharedConfig) -> Result<()> {
    let mut recalibrate = signal(SignalKind::user_defined1()).context("installing SIGUSR1 handler")?;
    let mut reset_yaw = signal(SignalKind::user_defined2()).context("installing SIGUSR2 handler")?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = recalibrate.recv() => {
                    info!("SIGUSR1: recalibration requested");
                    shared.request_recalibration();
                }
                Some(()) = reset_yaw.recv() => {
                    info!("SIGUSR2: yaw reset requested");
                    shared.request_yaw_reset();
                }
                else => break,
            }
        }
    });
    Ok(())
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl+C handler unavailable ({}), stop with SIGTERM", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down...");
}

async fn run(cli: Cli) -> Result<()> {
    info!("camstick v{} starting...", env!("CARGO_PKG_VERSION"));

    if cli.list {
        let devices = evdev_source::list()?;
        if devices.is_empty() {
            println!("No controllers detected");
        }
        for device in devices {
            println!("{}", device);
        }
        return Ok(());
    }

    let mut store = ConfigStore::new(&cli.config);
    let loaded = store
        .load_or_create()
        .with_context(|| format!("loading {}", cli.config.display()))?;
    for issue in &loaded.issues {
        warn!("Setting {}", issue);
    }
    let document = loaded.document;
    info!("Settings loaded from {}", store.path().display());

    let shared = SharedConfig::new(document.settings.clone(), document.profile.clone());

    let source = EvdevGamepad::open(document.joystick_index)?;
    let gamepad = VirtualGamepad::create()?;
    let injector = VirtualKeyboardMouse::create()?;

    let (stop_sync, sync_stopped) = oneshot::channel::<()>();
    let sync = DocumentSync::new(store, shared.clone(), &document);
    let sync_task = tokio::spawn(sync.run(SYNC_PERIOD, async move {
        let _ = sync_stopped.await;
    }));

    spawn_signal_handlers(shared.clone())?;

    let mut runtime = Runtime::new(
        source,
        OutputDispatcher::new(gamepad, injector),
        shared,
        cli.recalibrate,
    );
    info!("Press Ctrl+C to exit");
    runtime.run(wait_for_ctrl_c()).await;

    let _ = stop_sync.send(());
    if let Err(e) = sync_task.await {
        warn!("Settings sync task ended abnormally: {}", e);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_file.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            match e.downcast_ref::<CamStickError>() {
                Some(err) => {
                    if let Some(help) = err.remediation() {
                        eprintln!("\n{}", help);
                    }
                    ExitCode::from(err.exit_code())
                }
                None => ExitCode::FAILURE,
            }
        }
    }
}
