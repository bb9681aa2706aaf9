//! # Command Mapper Module
//!
//! Maps a conditioned [`DeviceSnapshot`] to an end-effector [`ControlCommand`].
//!
//! ## Axis Assignments
//!
//! | Delta | Input | Sign |
//! |-------|-------|------|
//! | x | Left Stick X | as read |
//! | y | Left Stick Y | negated (stick up is +y) |
//! | z | Right Stick Y | negated (stick up is +z) |
//! | wrist | Right Stick X | as read |
//!
//! Every delta is multiplied by the active speed: `normal_speed` (0.15)
//! or `precision_speed` (0.03) while RB is held.
//!
//! ## Gripper
//!
//! RT above half travel opens, otherwise LT above half travel closes,
//! otherwise the gripper stays. RT wins when both are pulled.
//!
//! ## Usage
//!
//! ```
//! use arm_teleop::controller::command_mapper::CommandMapper;
//! use arm_teleop::controller::state::DeviceSnapshot;
//! use arm_teleop::protocol::messages::Gripper;
//!
//! let mapper = CommandMapper::new(0.15, 0.03);
//! let command = mapper.map(&DeviceSnapshot::default());
//!
//! assert_eq!(command.deltas.x, 0.0);
//! assert_eq!(command.gripper, Gripper::Stay);
//! ```

use std::collections::BTreeMap;

use super::state::{Button, DeviceSnapshot};
use crate::protocol::messages::{ControlCommand, Deltas, Gripper};

/// Trigger travel beyond which the gripper acts.
pub const GRIPPER_THRESHOLD: f32 = 0.5;

/// Buttons forwarded in `gamepad_control.buttons`.
pub const CONSUMER_BUTTONS: [Button; 10] = [
    Button::A,
    Button::B,
    Button::X,
    Button::Y,
    Button::LeftBumper,
    Button::RightBumper,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
];

/// Builds control commands from snapshots.
#[derive(Debug, Clone, Copy)]
pub struct CommandMapper {
    normal_speed: f32,
    precision_speed: f32,
}

impl CommandMapper {
    #[must_use]
    pub fn new(normal_speed: f32, precision_speed: f32) -> Self {
        Self {
            normal_speed,
            precision_speed,
        }
    }

    /// Speed multiplier for this snapshot: precision while RB is held.
    #[must_use]
    pub fn speed(&self, snapshot: &DeviceSnapshot) -> f32 {
        if snapshot.pressed(Button::RightBumper) {
            self.precision_speed
        } else {
            self.normal_speed
        }
    }

    /// Map a snapshot to a control command
    #[must_use]
    pub fn map(&self, snapshot: &DeviceSnapshot) -> ControlCommand {
        let speed = self.speed(snapshot);

        let deltas = Deltas {
            x: snapshot.left_stick.x * speed,
            y: -snapshot.left_stick.y * speed,
            z: -snapshot.right_stick.y * speed,
            wrist: snapshot.right_stick.x * speed,
        };

        ControlCommand {
            deltas,
            gripper: gripper_action(snapshot.lt, snapshot.rt),
            buttons: consumer_buttons(snapshot),
        }
    }
}

/// Resolve the gripper action from trigger travel.
#[must_use]
pub fn gripper_action(lt: f32, rt: f32) -> Gripper {
    if rt > GRIPPER_THRESHOLD {
        Gripper::Open
    } else if lt > GRIPPER_THRESHOLD {
        Gripper::Close
    } else {
        Gripper::Stay
    }
}

fn consumer_buttons(snapshot: &DeviceSnapshot) -> BTreeMap<String, bool> {
    CONSUMER_BUTTONS
        .iter()
        .map(|&button| (button.wire_name().to_string(), snapshot.pressed(button)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::state::StickPosition;

    fn mapper() -> CommandMapper {
        CommandMapper::new(0.15, 0.03)
    }

    fn snapshot_with_sticks(left: (f32, f32), right: (f32, f32)) -> DeviceSnapshot {
        DeviceSnapshot {
            connected: true,
            left_stick: StickPosition { x: left.0, y: left.1 },
            right_stick: StickPosition { x: right.0, y: right.1 },
            ..DeviceSnapshot::default()
        }
    }

    #[test]
    fn test_rest_snapshot_maps_to_zero() {
        let command = mapper().map(&DeviceSnapshot::default());
        assert_eq!(command.deltas, Deltas::default());
        assert_eq!(command.gripper, Gripper::Stay);
    }

    #[test]
    fn test_normal_speed_axes() {
        let command = mapper().map(&snapshot_with_sticks((1.0, -1.0), (0.5, 0.5)));
        assert!((command.deltas.x - 0.15).abs() < 1e-6);
        assert!((command.deltas.y - 0.15).abs() < 1e-6);
        assert!((command.deltas.z + 0.075).abs() < 1e-6);
        assert!((command.deltas.wrist - 0.075).abs() < 1e-6);
    }

    #[test]
    fn test_precision_speed_with_rb() {
        let mut snapshot = snapshot_with_sticks((1.0, 0.0), (0.0, 0.0));
        snapshot.buttons.insert(Button::RightBumper, true);

        let command = mapper().map(&snapshot);
        assert!((command.deltas.x - 0.03).abs() < 1e-6);
    }

    #[test]
    fn test_speed_selection() {
        let mut snapshot = DeviceSnapshot::default();
        assert_eq!(mapper().speed(&snapshot), 0.15);
        snapshot.buttons.insert(Button::RightBumper, true);
        assert_eq!(mapper().speed(&snapshot), 0.03);
    }

    #[test]
    fn test_gripper_open_wins_over_close() {
        assert_eq!(gripper_action(0.6, 0.6), Gripper::Open);
    }

    #[test]
    fn test_gripper_close() {
        assert_eq!(gripper_action(0.6, 0.0), Gripper::Close);
    }

    #[test]
    fn test_gripper_threshold_is_exclusive() {
        assert_eq!(gripper_action(0.5, 0.5), Gripper::Stay);
    }

    #[test]
    fn test_buttons_are_consumer_subset() {
        let mut snapshot = DeviceSnapshot::default();
        snapshot.buttons.insert(Button::A, true);
        snapshot.buttons.insert(Button::Start, true);
        snapshot.buttons.insert(Button::DPadLeft, true);

        let command = mapper().map(&snapshot);
        assert_eq!(command.buttons.len(), CONSUMER_BUTTONS.len());
        assert_eq!(command.buttons.get("a"), Some(&true));
        assert_eq!(command.buttons.get("dpadLeft"), Some(&true));
        assert_eq!(command.buttons.get("b"), Some(&false));
        assert!(!command.buttons.contains_key("start"));
        assert!(!command.buttons.contains_key("lt"));
    }
}
