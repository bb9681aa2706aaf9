//! # Arm Teleop
//!
//! Drive a remote robot-arm simulator with a gamepad.
//!
//! This application reads a gamepad through evdev and streams end-effector
//! commands to the simulator's WebSocket endpoint, reconnecting whenever the
//! link drops.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use arm_teleop::config::{Config, LoggingConfig};
use arm_teleop::controller::device::EvdevGamepads;
use arm_teleop::controller::poller::{DevicePoller, PollerHandle};
use arm_teleop::controller::throttle::{CommandThrottler, ThrottlerHandle};
use arm_teleop::telemetry::TelemetryMonitor;
use arm_teleop::transport::{TransportSession, WsConnector};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// How often the frame statistics are logged
const TELEMETRY_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// File name prefix of the rolling log
const LOG_FILE_PREFIX: &str = "arm-teleop.log";

/// Main entry point for Arm Teleop
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging with tracing subscriber
///    - Open the evdev gamepad backend
///
/// 2. **Pipeline**
///    - Transport session connects to `ws://host:port/path`
///    - Device poller samples the gamepad at `poll_rate_hz`
///    - Throttler turns snapshots into `gamepad_control` messages
///    - Telemetry monitor logs the inbound frame stream
///
/// 3. **Graceful Shutdown**
///    - Ctrl+C stops every task, producers first
///
/// # Errors
///
/// Returns error if:
/// - The configuration file is invalid
/// - `/dev/input` is unavailable, or the configured device is not a gamepad
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
///
/// Expected output:
/// ```text
/// INFO arm_teleop: Arm Teleop v0.1.0 starting...
/// INFO arm_teleop::controller::device: Gamepad 7 detected: Xbox Wireless Controller
/// INFO arm_teleop::transport::session: Connected to simulator
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config_found = Path::new(&config_path).exists();
    let config = if config_found {
        Config::load(&config_path)
            .with_context(|| format!("Failed to load configuration from {}", config_path))?
    } else {
        Config::default()
    };

    let _log_guard = init_logging(&config.logging);

    info!("Arm Teleop v{} starting...", env!("CARGO_PKG_VERSION"));
    if config_found {
        info!("Configuration loaded from {}", config_path);
    } else {
        warn!("{} not found, using defaults", config_path);
    }

    let source = EvdevGamepads::open(&config.controller.device_path)
        .context("Failed to open gamepad backend")?;

    let connector =
        WsConnector::new(config.server.url()).with_connect_timeout(config.server.connect_timeout());
    let (session, mut session_task, initial) = TransportSession::spawn(&config.server, connector);

    let mut telemetry = TelemetryMonitor::spawn(session.subscribe(), TELEMETRY_REPORT_INTERVAL);

    let poller = DevicePoller::new(source, config.controller.conditioning());
    let mut poller_handle = PollerHandle::spawn(poller, config.controller.poll_period());

    let mut throttler = ThrottlerHandle::spawn(
        CommandThrottler::new(config.throttle.clone()),
        poller_handle.subscribe(),
        session.clone(),
    );

    info!("Press Ctrl+C to exit");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let initial = initial.outcome();
    tokio::pin!(initial);
    let mut initial_reported = false;
    let mut state = session.state();

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            outcome = &mut initial, if !initial_reported => {
                initial_reported = true;
                match outcome {
                    Ok(()) => info!("Streaming commands to {}", config.server.url()),
                    Err(e) => warn!(
                        "{}; retrying every {:?}",
                        e,
                        config.server.reconnect_delay()
                    ),
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    warn!("Transport session ended unexpectedly");
                    break;
                }
                let current = *state.borrow_and_update();
                info!("Connection state: {:?}", current);
            }
        }
    }

    throttler.shutdown().await;
    poller_handle.shutdown().await;
    telemetry.shutdown().await;
    session_task.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides the configured level. With `log_dir` set, output goes
/// to a daily rolling file instead of stdout; the returned guard flushes it on
/// drop.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.log_dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    } else {
        let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    }
}
