//! # Controller Module
//!
//! Gamepad input handling.
//!
//! This module handles:
//! - Gamepad detection, hot-plug and state reads via evdev
//! - Applying deadzones, sensitivity and Y inversion
//! - Sampling the bound gamepad at a fixed rate
//! - Throttling snapshots into end-effector commands

pub mod calibration;
pub mod state;
pub mod device;
pub mod poller;
pub mod command_mapper;
pub mod throttle;
