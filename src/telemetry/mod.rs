//! # Telemetry Module
//!
//! Observes the simulator's inbound frame stream.
//!
//! This module handles:
//! - Subscribing to frames broadcast by the transport session
//! - Tracking frame count, frame rate and the latest simulator state
//! - Logging a periodic summary

pub mod monitor;

pub use monitor::{FrameStats, TelemetryMonitor};
