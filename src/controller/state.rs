//! # Device Snapshot Module
//!
//! The conditioned, per-tick view of one controller and the fixed table
//! that maps raw button indices to named buttons.
//!
//! ## Raw Button Layout
//!
//! Raw indices follow the standard gamepad layout:
//!
//! | Index | Button | Wire name | Kind |
//! |-------|--------|-----------|------|
//! | 0 | South face | `a` | digital |
//! | 1 | East face | `b` | digital |
//! | 2 | West face | `x` | digital |
//! | 3 | North face | `y` | digital |
//! | 4 | Left bumper | `lb` | digital |
//! | 5 | Right bumper | `rb` | digital (precision mode) |
//! | 6 | Left trigger | `lt` | analog |
//! | 7 | Right trigger | `rt` | analog |
//! | 8 | Back / Select | `back` | digital |
//! | 9 | Start | `start` | digital |
//! | 10 | Left stick click | `leftStick` | digital |
//! | 11 | Right stick click | `rightStick` | digital |
//! | 12-15 | D-Pad | `dpadUp` `dpadDown` `dpadLeft` `dpadRight` | digital |
//! | 16 | Home / Guide | `home` | digital |

use std::collections::BTreeMap;

/// Named gamepad buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Button {
    A,
    B,
    X,
    Y,
    LeftBumper,
    RightBumper,
    LeftTrigger,
    RightTrigger,
    Back,
    Start,
    LeftStick,
    RightStick,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
    Home,
}

impl Button {
    /// Name used on the wire in `gamepad_control.buttons`.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Button::A => "a",
            Button::B => "b",
            Button::X => "x",
            Button::Y => "y",
            Button::LeftBumper => "lb",
            Button::RightBumper => "rb",
            Button::LeftTrigger => "lt",
            Button::RightTrigger => "rt",
            Button::Back => "back",
            Button::Start => "start",
            Button::LeftStick => "leftStick",
            Button::RightStick => "rightStick",
            Button::DPadUp => "dpadUp",
            Button::DPadDown => "dpadDown",
            Button::DPadLeft => "dpadLeft",
            Button::DPadRight => "dpadRight",
            Button::Home => "home",
        }
    }
}

/// How a raw button slot is stored in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonSlot {
    /// Boolean pressed state goes into `buttons`.
    Digital(Button),
    /// Analog value goes into `lt` / `rt`.
    Trigger(Button),
}

/// Raw-index to named-button table. Position in the array is the raw index.
pub const BUTTON_TABLE: [ButtonSlot; 17] = [
    ButtonSlot::Digital(Button::A),
    ButtonSlot::Digital(Button::B),
    ButtonSlot::Digital(Button::X),
    ButtonSlot::Digital(Button::Y),
    ButtonSlot::Digital(Button::LeftBumper),
    ButtonSlot::Digital(Button::RightBumper),
    ButtonSlot::Trigger(Button::LeftTrigger),
    ButtonSlot::Trigger(Button::RightTrigger),
    ButtonSlot::Digital(Button::Back),
    ButtonSlot::Digital(Button::Start),
    ButtonSlot::Digital(Button::LeftStick),
    ButtonSlot::Digital(Button::RightStick),
    ButtonSlot::Digital(Button::DPadUp),
    ButtonSlot::Digital(Button::DPadDown),
    ButtonSlot::Digital(Button::DPadLeft),
    ButtonSlot::Digital(Button::DPadRight),
    ButtonSlot::Digital(Button::Home),
];

/// Raw axis indices in the standard layout.
pub mod axes {
    pub const LEFT_X: usize = 0;
    pub const LEFT_Y: usize = 1;
    pub const RIGHT_X: usize = 2;
    pub const RIGHT_Y: usize = 3;
}

/// One analog stick, both axes in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StickPosition {
    pub x: f32,
    pub y: f32,
}

impl StickPosition {
    /// True if either axis exceeds `threshold` in magnitude.
    #[must_use]
    pub fn moved(&self, threshold: f32) -> bool {
        self.x.abs() > threshold || self.y.abs() > threshold
    }
}

/// Complete conditioned state of the bound controller for one poll tick.
///
/// A default snapshot is the disconnected rest state: sticks centered,
/// triggers released, no button pressed.
///
/// # Examples
///
/// ```
/// use arm_teleop::controller::state::{Button, DeviceSnapshot};
///
/// let snapshot = DeviceSnapshot::default();
/// assert!(!snapshot.connected);
/// assert!(!snapshot.pressed(Button::A));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceSnapshot {
    pub connected: bool,
    /// Index of the device this snapshot was read from.
    pub device_index: Option<usize>,
    pub left_stick: StickPosition,
    pub right_stick: StickPosition,
    /// Pressed state of every digital button seen this tick.
    pub buttons: BTreeMap<Button, bool>,
    /// Left trigger, `[0, 1]`.
    pub lt: f32,
    /// Right trigger, `[0, 1]`.
    pub rt: f32,
}

impl DeviceSnapshot {
    /// Pressed state of a named button; absent entries read as released.
    #[must_use]
    pub fn pressed(&self, button: Button) -> bool {
        self.buttons.get(&button).copied().unwrap_or(false)
    }

    /// True if either stick exceeds `threshold` on any axis.
    #[must_use]
    pub fn any_stick_moved(&self, threshold: f32) -> bool {
        self.left_stick.moved(threshold) || self.right_stick.moved(threshold)
    }

    /// True if either trigger exceeds `threshold`.
    #[must_use]
    pub fn any_trigger_pressed(&self, threshold: f32) -> bool {
        self.lt > threshold || self.rt > threshold
    }
}
