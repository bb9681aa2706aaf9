//! # Command Throttler Module
//!
//! Turns the poller's snapshot stream into a sparse stream of control
//! commands.
//!
//! ## Suppression Rule
//!
//! A snapshot produces no command when either holds:
//!
//! 1. Less than `max(1 / max_rate_hz, min_send_interval)` has elapsed since
//!    the last sent command
//! 2. The controller is at rest: no stick axis above `movement_threshold`,
//!    no trigger above `trigger_threshold`, and none of A, X, Y, RB changed
//!    since the last *sent* snapshot
//!
//! Releasing a watched button is a change, so letting go of A after a send
//! still produces one final command.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::command_mapper::CommandMapper;
use super::state::{Button, DeviceSnapshot};
use crate::config::ThrottleConfig;
use crate::protocol::messages::ControlCommand;
use crate::transport::SessionHandle;

/// Buttons whose state change forces a command while at rest.
pub const WATCHED_BUTTONS: [Button; 4] = [Button::A, Button::X, Button::Y, Button::RightBumper];

/// Send-suppression state machine.
///
/// Holds the time and snapshot of the last sent command; everything else
/// is derived per decision.
#[derive(Debug)]
pub struct CommandThrottler {
    config: ThrottleConfig,
    mapper: CommandMapper,
    last_sent_at: Option<Instant>,
    last_sent: DeviceSnapshot,
}

impl CommandThrottler {
    #[must_use]
    pub fn new(config: ThrottleConfig) -> Self {
        let mapper = CommandMapper::new(config.normal_speed, config.precision_speed);
        Self {
            config,
            mapper,
            last_sent_at: None,
            last_sent: DeviceSnapshot::default(),
        }
    }

    /// Decide whether `snapshot` observed at `now` should be sent.
    ///
    /// Returns the command to send, and records it as the last sent one,
    /// or `None` when suppressed.
    pub fn decide(&mut self, snapshot: &DeviceSnapshot, now: Instant) -> Option<ControlCommand> {
        if let Some(at) = self.last_sent_at {
            let elapsed = now.saturating_duration_since(at);
            if elapsed < self.config.min_decision_interval()
                || elapsed < self.config.min_send_interval()
            {
                return None;
            }
        }

        if !self.is_active(snapshot) {
            return None;
        }

        let command = self.mapper.map(snapshot);
        self.last_sent_at = Some(now);
        self.last_sent = snapshot.clone();
        Some(command)
    }

    fn is_active(&self, snapshot: &DeviceSnapshot) -> bool {
        snapshot.any_stick_moved(self.config.movement_threshold)
            || snapshot.any_trigger_pressed(self.config.trigger_threshold)
            || WATCHED_BUTTONS
                .iter()
                .any(|&button| snapshot.pressed(button) != self.last_sent.pressed(button))
    }
}

/// Handle to a running throttler task.
#[derive(Debug)]
pub struct ThrottlerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ThrottlerHandle {
    /// Spawns the throttler on the current tokio runtime.
    ///
    /// The task reacts to every snapshot published on `snapshots` and ends
    /// when cancelled or when the poller drops its sender.
    pub fn spawn(
        throttler: CommandThrottler,
        snapshots: watch::Receiver<DeviceSnapshot>,
        session: SessionHandle,
    ) -> Self {
        let cancel = CancellationToken::new();
        info!("Starting command throttler");
        let task = tokio::spawn(run_throttle_loop(
            throttler,
            snapshots,
            session,
            cancel.clone(),
        ));

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Stops the throttler and waits for it to exit. Safe to call more
    /// than once.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Throttler task ended abnormally: {}", e);
            }
            info!("Command throttler stopped");
        }
    }
}

impl Drop for ThrottlerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_throttle_loop(
    mut throttler: CommandThrottler,
    mut snapshots: watch::Receiver<DeviceSnapshot>,
    session: SessionHandle,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    debug!("Snapshot channel closed");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if let Some(command) = throttler.decide(&snapshot, Instant::now()) {
                    debug!(
                        "Command: x={:.3} y={:.3} z={:.3} wrist={:.3} gripper={:?}",
                        command.deltas.x,
                        command.deltas.y,
                        command.deltas.z,
                        command.deltas.wrist,
                        command.gripper
                    );
                    session.send_command(command);
                }
            }
        }
    }
}
