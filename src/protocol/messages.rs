//! # Wire Message Definitions
//!
//! Typed JSON messages exchanged with the simulator over the WebSocket.
//!
//! ## Outbound
//!
//! | `type` | Payload | Purpose |
//! |--------|---------|---------|
//! | `control` | `data: {joint: value}` | Absolute joint targets |
//! | `camera` | `data: {lookat?, distance?, elevation?, azimuth?}` | Viewpoint |
//! | `gamepad_control` | `deltas`, `gripper`, `buttons` | End-effector deltas |
//!
//! ## Inbound
//!
//! | `type` | Payload |
//! |--------|---------|
//! | `frame` | `image` (base64 JPEG), `state {time, qpos, qvel, joints}` |

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

/// Gripper action carried by every gamepad command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gripper {
    Open,
    Close,
    #[default]
    Stay,
}

/// End-effector deltas, already scaled by the speed multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Deltas {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub wrist: f32,
}

/// One teleoperation command.
///
/// Built once per throttle decision and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ControlCommand {
    pub deltas: Deltas,
    pub gripper: Gripper,
    /// Consumer subset of button states, keyed by wire name.
    pub buttons: BTreeMap<String, bool>,
}

/// Camera viewpoint change. Absent fields are left unchanged by the
/// simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CameraUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookat: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azimuth: Option<f64>,
}

/// Messages sent to the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Joint name to target value.
    Control { data: BTreeMap<String, f64> },
    Camera { data: CameraUpdate },
    GamepadControl(ControlCommand),
}

impl From<ControlCommand> for OutboundMessage {
    fn from(command: ControlCommand) -> Self {
        OutboundMessage::GamepadControl(command)
    }
}

impl From<CameraUpdate> for OutboundMessage {
    fn from(data: CameraUpdate) -> Self {
        OutboundMessage::Camera { data }
    }
}

/// Simulator state attached to every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SimState {
    pub time: f64,
    #[serde(default)]
    pub qpos: Vec<f64>,
    #[serde(default)]
    pub qvel: Vec<f64>,
    #[serde(default)]
    pub joints: BTreeMap<String, f64>,
}

/// One rendered frame plus the state it was rendered from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Base64-encoded JPEG.
    pub image: String,
    pub state: SimState,
}

impl Frame {
    /// Decodes the JPEG bytes of this frame.
    ///
    /// # Errors
    ///
    /// Returns `Image` if the payload is not valid base64.
    pub fn decode_image(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(&self.image)?)
    }
}

/// Messages received from the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    Frame(Frame),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TeleopError;

    #[test]
    fn test_gripper_default_is_stay() {
        assert_eq!(Gripper::default(), Gripper::Stay);
    }

    #[test]
    fn test_control_command_default_is_rest() {
        let command = ControlCommand::default();
        assert_eq!(command.deltas, Deltas::default());
        assert_eq!(command.gripper, Gripper::Stay);
        assert!(command.buttons.is_empty());
    }

    #[test]
    fn test_from_command() {
        let message: OutboundMessage = ControlCommand::default().into();
        assert!(matches!(message, OutboundMessage::GamepadControl(_)));
    }

    #[test]
    fn test_from_camera() {
        let update = CameraUpdate {
            distance: Some(1.2),
            ..CameraUpdate::default()
        };
        let message: OutboundMessage = update.clone().into();
        assert_eq!(message, OutboundMessage::Camera { data: update });
    }

    #[test]
    fn test_decode_image() {
        let frame = Frame {
            image: "/9j/4A==".to_string(),
            state: SimState::default(),
        };
        assert_eq!(frame.decode_image().unwrap(), vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[test]
    fn test_decode_image_invalid() {
        let frame = Frame {
            image: "not base64!".to_string(),
            state: SimState::default(),
        };
        assert!(matches!(frame.decode_image(), Err(TeleopError::Image(_))));
    }
}
