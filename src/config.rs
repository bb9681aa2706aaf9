//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::controller::calibration::ConditioningConfig;
use crate::error::{Result, TeleopError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub controller: ControllerConfig,
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Simulator endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Upper bound on TCP connect plus WebSocket handshake
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_max_queued_messages")]
    pub max_queued_messages: usize,
}

/// Controller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_deadzone")]
    pub deadzone: f32,

    #[serde(default = "default_sensitivity")]
    pub stick_sensitivity: f32,

    #[serde(default = "default_sensitivity")]
    pub trigger_sensitivity: f32,

    #[serde(default)]
    pub invert_y: bool,

    #[serde(default = "default_poll_rate_hz")]
    pub poll_rate_hz: u32,
}

/// Command throttling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ThrottleConfig {
    #[serde(default = "default_max_rate_hz")]
    pub max_rate_hz: u32,

    #[serde(default = "default_min_send_interval_ms")]
    pub min_send_interval_ms: u64,

    #[serde(default = "default_movement_threshold")]
    pub movement_threshold: f32,

    #[serde(default = "default_trigger_threshold")]
    pub trigger_threshold: f32,

    #[serde(default = "default_normal_speed")]
    pub normal_speed: f32,

    #[serde(default = "default_precision_speed")]
    pub precision_speed: f32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 1337 }
fn default_path() -> String { "/ws".to_string() }
fn default_reconnect_delay_ms() -> u64 { 1000 }
fn default_connect_timeout_ms() -> u64 { 5000 }
fn default_max_queued_messages() -> usize { 256 }

fn default_deadzone() -> f32 { 0.1 }
fn default_sensitivity() -> f32 { 1.0 }
fn default_poll_rate_hz() -> u32 { 60 }

fn default_max_rate_hz() -> u32 { 60 }
fn default_min_send_interval_ms() -> u64 { 60 }
fn default_movement_threshold() -> f32 { 0.01 }
fn default_trigger_threshold() -> f32 { 0.1 }
fn default_normal_speed() -> f32 { 0.15 }
fn default_precision_speed() -> f32 { 0.03 }

fn default_log_level() -> String { "info".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_queued_messages: default_max_queued_messages(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            deadzone: default_deadzone(),
            stick_sensitivity: default_sensitivity(),
            trigger_sensitivity: default_sensitivity(),
            invert_y: false,
            poll_rate_hz: default_poll_rate_hz(),
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_rate_hz: default_max_rate_hz(),
            min_send_interval_ms: default_min_send_interval_ms(),
            movement_threshold: default_movement_threshold(),
            trigger_threshold: default_trigger_threshold(),
            normal_speed: default_normal_speed(),
            precision_speed: default_precision_speed(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

impl ServerConfig {
    /// WebSocket URL of the simulator, e.g. `ws://127.0.0.1:1337/ws`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://{}:{}{}", self.host, self.port, self.path)
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl ControllerConfig {
    /// Builds the read-only conditioning parameters used by the poller.
    #[must_use]
    pub fn conditioning(&self) -> ConditioningConfig {
        ConditioningConfig {
            deadzone: self.deadzone,
            stick_sensitivity: self.stick_sensitivity,
            trigger_sensitivity: self.trigger_sensitivity,
            invert_y: self.invert_y,
        }
    }

    /// Sampling interval. A rate of 0 is treated as 1 Hz.
    #[must_use]
    pub fn poll_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.poll_rate_hz.max(1)))
    }
}

impl ThrottleConfig {
    /// Minimum spacing between two decisions (the rate ceiling). A rate
    /// of 0 is treated as 1 Hz.
    #[must_use]
    pub fn min_decision_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.max_rate_hz.max(1)))
    }

    #[must_use]
    pub fn min_send_interval(&self) -> Duration {
        Duration::from_millis(self.min_send_interval_ms)
    }
}

fn invalid(msg: impl std::fmt::Display) -> TeleopError {
    TeleopError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use arm_teleop::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(invalid("server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(invalid("server port must be greater than 0"));
        }

        if !self.server.path.starts_with('/') {
            return Err(invalid("server path must start with '/'"));
        }

        if self.server.reconnect_delay_ms == 0 || self.server.reconnect_delay_ms > 60000 {
            return Err(invalid("reconnect_delay_ms must be between 1 and 60000"));
        }

        if self.server.connect_timeout_ms == 0 || self.server.connect_timeout_ms > 60000 {
            return Err(invalid("connect_timeout_ms must be between 1 and 60000"));
        }

        if self.server.max_queued_messages == 0 {
            return Err(invalid("max_queued_messages must be greater than 0"));
        }

        // Deadzone of exactly 1.0 would divide by zero in the rescale
        if !(0.0..1.0).contains(&self.controller.deadzone) {
            return Err(invalid("deadzone must be in [0.0, 1.0)"));
        }

        for (name, value) in [
            ("stick_sensitivity", self.controller.stick_sensitivity),
            ("trigger_sensitivity", self.controller.trigger_sensitivity),
        ] {
            if value <= 0.0 || value > 10.0 {
                return Err(invalid(format!("{} must be in (0.0, 10.0]", name)));
            }
        }

        if self.controller.poll_rate_hz == 0 || self.controller.poll_rate_hz > 1000 {
            return Err(invalid("poll_rate_hz must be between 1 and 1000"));
        }

        if self.throttle.max_rate_hz == 0 || self.throttle.max_rate_hz > 1000 {
            return Err(invalid("max_rate_hz must be between 1 and 1000"));
        }

        if self.throttle.min_send_interval_ms > 10000 {
            return Err(invalid("min_send_interval_ms must be at most 10000"));
        }

        for (name, value) in [
            ("movement_threshold", self.throttle.movement_threshold),
            ("trigger_threshold", self.throttle.trigger_threshold),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(invalid(format!("{} must be in [0.0, 1.0)", name)));
            }
        }

        for (name, value) in [
            ("normal_speed", self.throttle.normal_speed),
            ("precision_speed", self.throttle.precision_speed),
        ] {
            if value <= 0.0 || value > 1.0 {
                return Err(invalid(format!("{} must be in (0.0, 1.0]", name)));
            }
        }

        if self.throttle.precision_speed > self.throttle.normal_speed {
            return Err(invalid("precision_speed must not exceed normal_speed"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "logging level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }
}
