//! # Wire Codec
//!
//! Encodes outbound messages to JSON text frames and decodes inbound ones.

use super::messages::{InboundMessage, OutboundMessage};
use crate::error::Result;

/// Encode an outbound message as a JSON text frame
///
/// # Errors
///
/// Returns `Protocol` if serialization fails.
///
/// # Examples
///
/// ```
/// use arm_teleop::protocol::codec::encode;
/// use arm_teleop::protocol::messages::{ControlCommand, OutboundMessage};
///
/// let text = encode(&OutboundMessage::GamepadControl(ControlCommand::default()))?;
/// assert!(text.contains(r#""type":"gamepad_control""#));
/// # Ok::<(), arm_teleop::error::TeleopError>(())
/// ```
pub fn encode(message: &OutboundMessage) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Decode an inbound JSON text frame
///
/// # Errors
///
/// Returns `Protocol` if:
/// - The text is not valid JSON
/// - `type` is missing or unknown
/// - Required payload fields are missing or mistyped
pub fn decode(text: &str) -> Result<InboundMessage> {
    Ok(serde_json::from_str(text)?)
}
