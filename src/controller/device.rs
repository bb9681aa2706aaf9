//! # Gamepad Device Module
//!
//! Gamepad discovery and raw state reads using the Linux evdev interface.
//!
//! ## Device Detection
//!
//! Any `/dev/input/event*` node that advertises `BTN_SOUTH` is treated as a
//! gamepad. The number in the node name is the device index, so
//! `/dev/input/event7` is index 7.
//!
//! ## Input Axes
//!
//! Axes follow the kernel gamepad layout:
//!
//! - Left stick: ABS_X, ABS_Y
//! - Right stick: ABS_RX, ABS_RY
//! - Triggers: ABS_Z (LT), ABS_RZ (RT)
//! - D-Pad: ABS_HAT0X / ABS_HAT0Y, or BTN_DPAD_* on some drivers
//!
//! Reads are non-blocking ioctls of the current state, so the poller can
//! sample at a fixed rate without draining the event queue.

use evdev::{AbsoluteAxisType, Device, Key};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::calibration::{normalize_axis, normalize_trigger};
use crate::error::{Result, TeleopError};

/// How often the evdev backend re-enumerates `/dev/input`.
const RESCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Number of raw button slots in the standard layout.
pub const RAW_BUTTON_COUNT: usize = 17;

/// Number of raw axes in the standard layout.
pub const RAW_AXIS_COUNT: usize = 4;

/// One raw button slot: digital state plus analog value (0.0 or 1.0 for
/// digital-only buttons).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawButton {
    pub pressed: bool,
    pub value: f32,
}

impl RawButton {
    #[must_use]
    pub fn digital(pressed: bool) -> Self {
        Self {
            pressed,
            value: if pressed { 1.0 } else { 0.0 },
        }
    }
}

/// Unconditioned state of one device in the standard layout.
///
/// `axes` are normalized to `[-1, 1]` but carry no deadzone or gain.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawGamepad {
    pub index: usize,
    pub axes: Vec<f32>,
    pub buttons: Vec<RawButton>,
}

/// Hot-plug notification from a gamepad source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Connected(usize),
    Disconnected(usize),
}

/// Source of gamepad state consumed by the poller.
///
/// Implemented by [`EvdevGamepads`] for real hardware; mocked in tests.
#[cfg_attr(test, mockall::automock)]
pub trait GamepadSource: Send {
    /// Connection changes observed since the previous call.
    fn poll_events(&mut self) -> Vec<DeviceEvent>;

    /// Indices of the devices currently present, in discovery order.
    fn connected(&mut self) -> Vec<usize>;

    /// Current state of device `index`, or `None` if it no longer reports
    /// a live device.
    fn read(&mut self, index: usize) -> Option<RawGamepad>;
}

/// evdev-backed gamepad source.
///
/// Keeps every detected gamepad open and rescans `/dev/input` at most once
/// per second to notice hot-plugged devices.
pub struct EvdevGamepads {
    devices: BTreeMap<usize, Device>,
    fixed_path: Option<PathBuf>,
    last_scan: Option<Instant>,
}

impl std::fmt::Debug for EvdevGamepads {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevGamepads")
            .field("devices", &self.devices.keys().collect::<Vec<_>>())
            .field("fixed_path", &self.fixed_path)
            .finish_non_exhaustive()
    }
}

impl EvdevGamepads {
    /// Opens the evdev backend.
    ///
    /// With an empty `device_path` all gamepads under `/dev/input` are
    /// tracked; otherwise only the given node is.
    ///
    /// # Errors
    ///
    /// - `Controller`: `/dev/input` does not exist
    /// - `ControllerNotFound`: `device_path` is set but is not a gamepad
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use arm_teleop::controller::device::{EvdevGamepads, GamepadSource};
    ///
    /// let mut source = EvdevGamepads::open("")?;
    /// println!("Gamepads: {:?}", source.connected());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(device_path: &str) -> Result<Self> {
        if !Path::new("/dev/input").exists() {
            return Err(TeleopError::Controller(
                "/dev/input directory not found".to_string(),
            ));
        }

        let fixed_path = if device_path.is_empty() {
            None
        } else {
            Some(PathBuf::from(device_path))
        };

        let mut source = Self {
            devices: BTreeMap::new(),
            fixed_path,
            last_scan: None,
        };
        source.scan();

        if let Some(path) = &source.fixed_path {
            if source.devices.is_empty() {
                warn!("{} is not an available gamepad", path.display());
                return Err(TeleopError::ControllerNotFound);
            }
        }

        info!("evdev backend ready, {} gamepad(s) present", source.devices.len());
        Ok(source)
    }

    /// Re-enumerates devices and returns the connection changes.
    fn scan(&mut self) -> Vec<DeviceEvent> {
        self.last_scan = Some(Instant::now());

        let found: Vec<(usize, Device)> = match &self.fixed_path {
            Some(path) => match Device::open(path) {
                Ok(device) => device_index(path)
                    .filter(|_| is_gamepad(&device))
                    .map(|index| vec![(index, device)])
                    .unwrap_or_default(),
                Err(e) => {
                    debug!("Could not open {}: {}", path.display(), e);
                    Vec::new()
                }
            },
            None => evdev::enumerate()
                .filter(|(_, device)| is_gamepad(device))
                .filter_map(|(path, device)| device_index(&path).map(|index| (index, device)))
                .collect(),
        };

        let mut events = Vec::new();

        let present: Vec<usize> = found.iter().map(|(index, _)| *index).collect();
        let gone: Vec<usize> = self
            .devices
            .keys()
            .filter(|index| !present.contains(index))
            .copied()
            .collect();
        for index in gone {
            info!("Gamepad {} removed", index);
            self.devices.remove(&index);
            events.push(DeviceEvent::Disconnected(index));
        }

        for (index, device) in found {
            if self.devices.contains_key(&index) {
                continue;
            }
            info!(
                "Gamepad {} detected: {}",
                index,
                device.name().unwrap_or("unknown")
            );
            self.devices.insert(index, device);
            events.push(DeviceEvent::Connected(index));
        }

        events
    }
}

impl GamepadSource for EvdevGamepads {
    fn poll_events(&mut self) -> Vec<DeviceEvent> {
        let due = self
            .last_scan
            .map_or(true, |at| at.elapsed() >= RESCAN_INTERVAL);
        if due {
            self.scan()
        } else {
            Vec::new()
        }
    }

    fn connected(&mut self) -> Vec<usize> {
        self.devices.keys().copied().collect()
    }

    fn read(&mut self, index: usize) -> Option<RawGamepad> {
        let result = {
            let device = self.devices.get(&index)?;
            read_state(index, device)
        };

        match result {
            Ok(gamepad) => Some(gamepad),
            Err(e) => {
                // ENODEV once the controller is unplugged
                warn!("Gamepad {} stopped responding: {}", index, e);
                self.devices.remove(&index);
                None
            }
        }
    }
}

/// True if the device looks like a gamepad.
fn is_gamepad(device: &Device) -> bool {
    device
        .supported_keys()
        .map_or(false, |keys| keys.contains(Key::BTN_SOUTH))
}

/// Extracts N from `/dev/input/eventN`.
fn device_index(path: &Path) -> Option<usize> {
    path.file_name()?
        .to_str()?
        .strip_prefix("event")?
        .parse()
        .ok()
}

/// Reads the current axis and key state into the standard layout.
fn read_state(index: usize, device: &Device) -> std::io::Result<RawGamepad> {
    let abs = device.get_abs_state()?;
    let keys = device.get_key_state()?;

    let axis = |code: AbsoluteAxisType| {
        let info = abs[code.0 as usize];
        normalize_axis(info.value, info.minimum, info.maximum)
    };
    let trigger = |code: AbsoluteAxisType, click: Key| {
        let info = abs[code.0 as usize];
        if info.maximum > info.minimum {
            normalize_trigger(info.value, info.minimum, info.maximum)
        } else if keys.contains(click) {
            1.0
        } else {
            0.0
        }
    };
    let hat = |code: AbsoluteAxisType| abs[code.0 as usize].value.signum();

    let axes = vec![
        axis(AbsoluteAxisType::ABS_X),
        axis(AbsoluteAxisType::ABS_Y),
        axis(AbsoluteAxisType::ABS_RX),
        axis(AbsoluteAxisType::ABS_RY),
    ];

    let buttons = standard_buttons(
        |code| keys.contains(code),
        trigger(AbsoluteAxisType::ABS_Z, Key::BTN_TL2),
        trigger(AbsoluteAxisType::ABS_RZ, Key::BTN_TR2),
        hat(AbsoluteAxisType::ABS_HAT0X),
        hat(AbsoluteAxisType::ABS_HAT0Y),
    );

    Ok(RawGamepad {
        index,
        axes,
        buttons,
    })
}

/// Lays out key, trigger and hat state in raw-index order.
///
/// Face buttons follow the kernel gamepad layout: `BTN_SOUTH` is A,
/// `BTN_EAST` is B, `BTN_WEST` is X and `BTN_NORTH` is Y.
fn standard_buttons(
    pressed: impl Fn(Key) -> bool,
    lt: f32,
    rt: f32,
    hat_x: i32,
    hat_y: i32,
) -> Vec<RawButton> {
    let key = |code: Key| RawButton::digital(pressed(code));

    vec![
        key(Key::BTN_SOUTH),
        key(Key::BTN_EAST),
        key(Key::BTN_WEST),
        key(Key::BTN_NORTH),
        key(Key::BTN_TL),
        key(Key::BTN_TR),
        RawButton {
            pressed: lt > 0.5 || pressed(Key::BTN_TL2),
            value: lt,
        },
        RawButton {
            pressed: rt > 0.5 || pressed(Key::BTN_TR2),
            value: rt,
        },
        key(Key::BTN_SELECT),
        key(Key::BTN_START),
        key(Key::BTN_THUMBL),
        key(Key::BTN_THUMBR),
        RawButton::digital(hat_y < 0 || pressed(Key::BTN_DPAD_UP)),
        RawButton::digital(hat_y > 0 || pressed(Key::BTN_DPAD_DOWN)),
        RawButton::digital(hat_x < 0 || pressed(Key::BTN_DPAD_LEFT)),
        RawButton::digital(hat_x > 0 || pressed(Key::BTN_DPAD_RIGHT)),
        key(Key::BTN_MODE),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_index_from_path() {
        assert_eq!(device_index(Path::new("/dev/input/event0")), Some(0));
        assert_eq!(device_index(Path::new("/dev/input/event17")), Some(17));
    }

    #[test]
    fn test_device_index_rejects_other_nodes() {
        assert_eq!(device_index(Path::new("/dev/input/js0")), None);
        assert_eq!(device_index(Path::new("/dev/input/mice")), None);
        assert_eq!(device_index(Path::new("/dev/input/eventX")), None);
    }

    #[test]
    fn test_face_buttons_follow_kernel_layout() {
        use crate::controller::state::{Button, ButtonSlot, BUTTON_TABLE};

        for (code, expected) in [
            (Key::BTN_SOUTH, Button::A),
            (Key::BTN_EAST, Button::B),
            (Key::BTN_WEST, Button::X),
            (Key::BTN_NORTH, Button::Y),
        ] {
            let buttons = standard_buttons(|k| k == code, 0.0, 0.0, 0, 0);
            let lit: Vec<usize> = (0..buttons.len()).filter(|&i| buttons[i].pressed).collect();
            assert_eq!(lit.len(), 1);
            assert_eq!(BUTTON_TABLE[lit[0]], ButtonSlot::Digital(expected));
        }
    }

    #[test]
    fn test_standard_buttons_triggers_and_hat() {
        let buttons = standard_buttons(|_| false, 0.7, 0.2, -1, 1);
        assert_eq!(buttons.len(), RAW_BUTTON_COUNT);
        assert!(buttons[6].pressed);
        assert_eq!(buttons[6].value, 0.7);
        assert!(!buttons[7].pressed);
        assert!(!buttons[12].pressed);
        assert!(buttons[13].pressed);
        assert!(buttons[14].pressed);
        assert!(!buttons[15].pressed);
    }

    #[test]
    fn test_raw_button_digital() {
        assert_eq!(RawButton::digital(true).value, 1.0);
        assert!(RawButton::digital(true).pressed);
        assert_eq!(RawButton::digital(false), RawButton::default());
    }

    #[test]
    fn test_layout_sizes_match_table() {
        assert_eq!(RAW_BUTTON_COUNT, crate::controller::state::BUTTON_TABLE.len());
        assert_eq!(RAW_AXIS_COUNT, 4);
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_read_with_real_hardware() {
        let mut source = EvdevGamepads::open("").expect("evdev backend");
        let index = *source.connected().first().expect("No gamepad connected");

        let gamepad = source.read(index).expect("Gamepad should be readable");
        assert_eq!(gamepad.axes.len(), RAW_AXIS_COUNT);
        assert_eq!(gamepad.buttons.len(), RAW_BUTTON_COUNT);
        for value in &gamepad.axes {
            assert!((-1.0..=1.0).contains(value));
        }
    }
}
