//! # Arm Teleop Library
//!
//! Drive a remote robot-arm simulator with a gamepad.
//!
//! This library provides the input-to-protocol pipeline: gamepad polling and
//! signal conditioning, throttled end-effector commands, and a persistent
//! auto-reconnecting WebSocket session that also delivers the simulator's
//! frame stream.

pub mod config;
pub mod error;
pub mod protocol;
pub mod controller;
pub mod transport;
pub mod telemetry;
