//! # Error Types
//!
//! Custom error types for Arm Teleop using `thiserror`.

use thiserror::Error;

/// Main error type for Arm Teleop
#[derive(Debug, Error)]
pub enum TeleopError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Controller access errors (enumeration, state reads)
    #[error("Controller error: {0}")]
    Controller(String),

    /// No gamepad at the configured path or none found while scanning
    #[error("No gamepad found")]
    ControllerNotFound,

    /// WebSocket / link failures. Recoverable: the session reconnects.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The very first connection attempt of a session failed
    #[error("Initial connection failed: {0}")]
    InitialConnect(String),

    /// Malformed or unserializable wire message
    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// Frame image payload is not valid base64
    #[error("Image decode error: {0}")]
    Image(#[from] base64::DecodeError),
}

/// Result type alias for Arm Teleop
pub type Result<T> = std::result::Result<T, TeleopError>;
