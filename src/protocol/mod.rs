//! # Protocol Module
//!
//! JSON wire protocol spoken with the simulator's `/ws` endpoint.
//!
//! This module handles:
//! - Outbound `control`, `camera` and `gamepad_control` messages
//! - Inbound `frame` messages carrying a JPEG and the simulator state
//! - Encoding to and decoding from JSON text frames

pub mod messages;
pub mod codec;
