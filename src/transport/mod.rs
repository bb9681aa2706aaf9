//! # Transport Module
//!
//! Persistent, auto-reconnecting WebSocket session with the simulator.
//!
//! This module handles:
//! - Opening the link (`ws://host:port/path`)
//! - Queueing outbound messages while disconnected
//! - Reconnecting after a fixed delay on close or error
//! - Parsing inbound frames and fanning them out to subscribers

pub mod link;
pub mod queue;
pub mod reconnect;
pub mod session;

pub use link::{Connector, FrameSink, FrameSource, WsConnector};
pub use session::{ConnectionState, InitialConnect, SessionHandle, SessionTask, TransportSession};

#[cfg(test)]
pub(crate) use session::SessionCommand;
