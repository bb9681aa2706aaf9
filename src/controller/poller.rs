//! # Device Poller Module
//!
//! Samples one bound gamepad at a fixed rate and publishes a conditioned
//! [`DeviceSnapshot`] per tick.
//!
//! ## Binding
//!
//! The poller tracks at most one device:
//!
//! ```text
//!            connected event / present at start / first live on poll
//!  Unbound ───────────────────────────────────────────────────────► Bound(i)
//!     ▲                                                                │
//!     └──────────── disconnected event for i / read(i) fails ──────────┘
//! ```
//!
//! The first device discovered wins. Events for other indices are ignored
//! while bound.
//!
//! ## Usage
//!
//! ```no_run
//! use arm_teleop::controller::calibration::ConditioningConfig;
//! use arm_teleop::controller::device::EvdevGamepads;
//! use arm_teleop::controller::poller::{DevicePoller, PollerHandle};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = EvdevGamepads::open("")?;
//! let poller = DevicePoller::new(source, ConditioningConfig::default());
//! let mut handle = PollerHandle::spawn(poller, Duration::from_millis(16));
//!
//! let snapshots = handle.subscribe();
//! println!("{:?}", *snapshots.borrow());
//!
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::calibration::ConditioningConfig;
use super::device::{DeviceEvent, GamepadSource, RawGamepad};
use super::state::{axes, Button, ButtonSlot, DeviceSnapshot, StickPosition, BUTTON_TABLE};

/// Binding state of the poller's single device slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Unbound,
    Bound(usize),
}

/// Samples a [`GamepadSource`] and turns raw readings into snapshots.
#[derive(Debug)]
pub struct DevicePoller<S: GamepadSource> {
    source: S,
    conditioning: ConditioningConfig,
    slot: SlotState,
}

impl<S: GamepadSource> DevicePoller<S> {
    /// Creates a poller and binds any device that is already present.
    pub fn new(mut source: S, conditioning: ConditioningConfig) -> Self {
        let slot = match source.connected().first() {
            Some(&index) => {
                info!("Bound to gamepad {} at startup", index);
                SlotState::Bound(index)
            }
            None => {
                warn!("No gamepad connected, continuing in idle mode");
                SlotState::Unbound
            }
        };

        Self {
            source,
            conditioning,
            slot,
        }
    }

    /// Current binding.
    #[must_use]
    pub fn slot(&self) -> SlotState {
        self.slot
    }

    /// Runs one poll iteration and returns the resulting snapshot.
    ///
    /// Applies pending hot-plug notifications first, then reads the bound
    /// device (binding the first live one if unbound).
    pub fn tick(&mut self) -> DeviceSnapshot {
        for event in self.source.poll_events() {
            self.handle_event(event);
        }

        if self.slot == SlotState::Unbound {
            if let Some(&index) = self.source.connected().first() {
                info!("Bound to gamepad {}", index);
                self.slot = SlotState::Bound(index);
            }
        }

        let SlotState::Bound(index) = self.slot else {
            return DeviceSnapshot::default();
        };

        match self.source.read(index) {
            Some(raw) => self.snapshot_from(&raw),
            None => {
                warn!("Gamepad {} no longer live, unbinding", index);
                self.slot = SlotState::Unbound;
                DeviceSnapshot::default()
            }
        }
    }

    /// Applies one connection notification to the slot.
    pub fn handle_event(&mut self, event: DeviceEvent) {
        match (self.slot, event) {
            (SlotState::Unbound, DeviceEvent::Connected(index)) => {
                info!("Gamepad {} connected, binding", index);
                self.slot = SlotState::Bound(index);
            }
            (SlotState::Bound(bound), DeviceEvent::Disconnected(index)) if bound == index => {
                info!("Gamepad {} disconnected", index);
                self.slot = SlotState::Unbound;
            }
            (slot, event) => {
                debug!("Ignoring {:?} while {:?}", event, slot);
            }
        }
    }

    /// Conditions a raw reading into a snapshot.
    fn snapshot_from(&self, raw: &RawGamepad) -> DeviceSnapshot {
        let cond = &self.conditioning;
        let raw_axis = |i: usize| raw.axes.get(i).copied().unwrap_or(0.0);

        let mut snapshot = DeviceSnapshot {
            connected: true,
            device_index: Some(raw.index),
            left_stick: StickPosition {
                x: cond.stick(raw_axis(axes::LEFT_X)),
                y: cond.stick_y(raw_axis(axes::LEFT_Y)),
            },
            right_stick: StickPosition {
                x: cond.stick(raw_axis(axes::RIGHT_X)),
                y: cond.stick_y(raw_axis(axes::RIGHT_Y)),
            },
            buttons: BTreeMap::new(),
            lt: 0.0,
            rt: 0.0,
        };

        for (slot, button) in BUTTON_TABLE.iter().zip(raw.buttons.iter()) {
            match *slot {
                ButtonSlot::Digital(name) => {
                    snapshot.buttons.insert(name, button.pressed);
                }
                ButtonSlot::Trigger(name) => {
                    let value = cond.trigger(button.value);
                    if name == Button::LeftTrigger {
                        snapshot.lt = value;
                    } else {
                        snapshot.rt = value;
                    }
                }
            }
        }

        snapshot
    }
}

/// Handle to a running poller task.
///
/// Snapshots are published on a `watch` channel, so subscribers always see
/// the latest tick and never queue stale ones.
#[derive(Debug)]
pub struct PollerHandle {
    snapshots: watch::Receiver<DeviceSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Spawns the poll loop on the current tokio runtime.
    ///
    /// `period` is the sampling interval (≈16.7 ms for 60 Hz).
    pub fn spawn<S>(poller: DevicePoller<S>, period: Duration) -> Self
    where
        S: GamepadSource + 'static,
    {
        let (sender, snapshots) = watch::channel(DeviceSnapshot::default());
        let cancel = CancellationToken::new();

        info!("Starting device poller at {:?} interval", period);
        let task = tokio::spawn(run_poll_loop(poller, period, sender, cancel.clone()));

        Self {
            snapshots,
            cancel,
            task: Some(task),
        }
    }

    /// Receiver for the latest snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DeviceSnapshot> {
        self.snapshots.clone()
    }

    /// Stops the poll loop and waits for it to exit.
    ///
    /// No iteration runs after this returns. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Poller task ended abnormally: {}", e);
            }
            info!("Device poller stopped");
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_poll_loop<S: GamepadSource>(
    mut poller: DevicePoller<S>,
    period: Duration,
    sender: watch::Sender<DeviceSnapshot>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let snapshot = poller.tick();
                // send_replace never fails, even with no receivers left
                sender.send_replace(snapshot);
            }
        }
    }
}
