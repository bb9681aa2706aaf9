//! # Calibration Module
//!
//! Conditions raw analog readings before they reach the snapshot.
//!
//! ## Deadzone
//!
//! Readings whose magnitude is below the deadzone are treated as rest and
//! become exactly 0.0. Readings outside are rescaled so that the deadzone
//! edge maps to 0.0 and full deflection maps to the configured gain, which
//! keeps the response continuous at the boundary.
//!
//! The formula used is: `output = sign(raw) * (|raw| - deadzone) / (1 - deadzone) * gain`
//!
//! ## Usage
//!
//! ```
//! use arm_teleop::controller::calibration::condition;
//!
//! // Inside the deadzone
//! assert_eq!(condition(0.05, 0.1, 1.0), 0.0);
//!
//! // Halfway, rescaled past the deadzone
//! assert!((condition(0.5, 0.1, 1.0) - 0.444).abs() < 0.001);
//! ```

/// Applies deadzone, rescale and gain to one raw axis reading.
///
/// `deadzone` must be in `[0, 1)`; the caller guarantees this (config
/// validation rejects anything else).
///
/// # Examples
///
/// ```
/// use arm_teleop::controller::calibration::condition;
///
/// assert_eq!(condition(-0.09, 0.1, 2.0), 0.0);
/// assert!((condition(-1.0, 0.1, 2.0) - (-2.0)).abs() < 1e-6);
/// ```
#[must_use]
pub fn condition(raw: f32, deadzone: f32, gain: f32) -> f32 {
    let magnitude = raw.abs();
    if magnitude < deadzone {
        return 0.0;
    }
    raw.signum() * ((magnitude - deadzone) / (1.0 - deadzone)) * gain
}

/// Process-wide conditioning parameters.
///
/// Built once from the `[controller]` config section and shared read-only
/// with the poller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditioningConfig {
    /// Deadzone as a fraction, in `[0, 1)`.
    pub deadzone: f32,
    /// Gain applied to both sticks.
    pub stick_sensitivity: f32,
    /// Gain applied to both analog triggers.
    pub trigger_sensitivity: f32,
    /// Flip the sign of both vertical stick axes.
    pub invert_y: bool,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            deadzone: 0.1,
            stick_sensitivity: 1.0,
            trigger_sensitivity: 1.0,
            invert_y: false,
        }
    }
}

impl ConditioningConfig {
    /// Conditions a horizontal stick axis. Output is clamped to `[-1, 1]`.
    #[must_use]
    pub fn stick(&self, raw: f32) -> f32 {
        condition(raw, self.deadzone, self.stick_sensitivity).clamp(-1.0, 1.0)
    }

    /// Conditions a vertical stick axis, honouring `invert_y`.
    #[must_use]
    pub fn stick_y(&self, raw: f32) -> f32 {
        let value = self.stick(raw);
        if self.invert_y {
            -value
        } else {
            value
        }
    }

    /// Scales an analog trigger reading by the trigger sensitivity.
    ///
    /// Triggers are not deadzoned here; the throttler applies its own
    /// activation threshold. Output is clamped to `[0, 1]`.
    #[must_use]
    pub fn trigger(&self, raw: f32) -> f32 {
        (raw * self.trigger_sensitivity).clamp(0.0, 1.0)
    }
}

/// Converts a raw absolute-axis value to a normalized value (-1.0 to 1.0).
///
/// # Arguments
///
/// * `raw` - Raw axis value as reported by the device
/// * `min` / `max` - Axis range from the device's absinfo
///
/// # Examples
///
/// ```
/// use arm_teleop::controller::calibration::normalize_axis;
///
/// assert!((normalize_axis(0, 0, 255) - (-1.0)).abs() < 0.01);
/// assert!((normalize_axis(128, 0, 255) - 0.0).abs() < 0.01);
/// assert!((normalize_axis(32767, -32768, 32767) - 1.0).abs() < 0.01);
/// ```
#[must_use]
pub fn normalize_axis(raw: i32, min: i32, max: i32) -> f32 {
    if max <= min {
        return 0.0;
    }
    let span = (max as f32) - (min as f32);
    let normalized = ((raw as f32) - (min as f32)) / span * 2.0 - 1.0;
    normalized.clamp(-1.0, 1.0)
}

/// Converts a raw trigger value to a normalized value (0.0 to 1.0).
///
/// # Examples
///
/// ```
/// use arm_teleop::controller::calibration::normalize_trigger;
///
/// assert_eq!(normalize_trigger(0, 0, 255), 0.0);
/// assert_eq!(normalize_trigger(255, 0, 255), 1.0);
/// assert_eq!(normalize_trigger(300, 0, 255), 1.0);
/// ```
#[must_use]
pub fn normalize_trigger(raw: i32, min: i32, max: i32) -> f32 {
    if max <= min {
        return 0.0;
    }
    let span = (max as f32) - (min as f32);
    (((raw as f32) - (min as f32)) / span).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    // ==================== condition() ====================

    #[test]
    fn test_inside_deadzone_is_exact_zero() {
        for raw in [0.0, 0.01, -0.01, 0.05, -0.05, 0.0999, -0.0999] {
            assert_eq!(condition(raw, 0.1, 1.0), 0.0, "raw {} should be zero", raw);
            assert_eq!(condition(raw, 0.1, 5.0), 0.0, "gain must not leak into deadzone");
        }
    }

    #[test]
    fn test_reference_value() {
        let value = condition(0.5, 0.1, 1.0);
        assert!((value - 0.4 / 0.9).abs() < EPSILON);
        assert!((value - 0.444).abs() < 0.001);
    }

    #[test]
    fn test_sign_preserved() {
        assert!((condition(-0.5, 0.1, 1.0) + 0.4 / 0.9).abs() < EPSILON);
    }

    #[test]
    fn test_full_deflection_maps_to_gain() {
        assert!((condition(1.0, 0.1, 1.0) - 1.0).abs() < EPSILON);
        assert!((condition(1.0, 0.2, 0.5) - 0.5).abs() < EPSILON);
        assert!((condition(-1.0, 0.2, 3.0) + 3.0).abs() < EPSILON);
    }

    #[test]
    fn test_continuous_at_boundary() {
        for deadzone in [0.0_f32, 0.05, 0.1, 0.25, 0.5, 0.9] {
            for gain in [0.5_f32, 1.0, 2.0] {
                let at = condition(deadzone, deadzone, gain);
                let just_above = condition(deadzone + 1e-4, deadzone, gain);
                assert_eq!(at, 0.0);
                assert!(just_above.abs() < 0.01, "jump at deadzone {} gain {}", deadzone, gain);
            }
        }
    }

    #[test]
    fn test_zero_deadzone_is_linear() {
        assert!((condition(0.3, 0.0, 1.0) - 0.3).abs() < EPSILON);
        assert!((condition(-0.7, 0.0, 2.0) + 1.4).abs() < EPSILON);
    }

    // ==================== ConditioningConfig ====================

    #[test]
    fn test_stick_clamps_overshoot() {
        let cfg = ConditioningConfig {
            stick_sensitivity: 2.0,
            ..ConditioningConfig::default()
        };
        assert_eq!(cfg.stick(1.0), 1.0);
        assert_eq!(cfg.stick(-1.2), -1.0);
    }

    #[test]
    fn test_stick_y_inversion() {
        let normal = ConditioningConfig::default();
        let inverted = ConditioningConfig {
            invert_y: true,
            ..ConditioningConfig::default()
        };
        assert!(normal.stick_y(0.8) > 0.0);
        assert!(inverted.stick_y(0.8) < 0.0);
        assert_eq!(inverted.stick_y(0.05), 0.0);
    }

    #[test]
    fn test_trigger_scaled_and_clamped() {
        let cfg = ConditioningConfig {
            trigger_sensitivity: 1.5,
            ..ConditioningConfig::default()
        };
        assert!((cfg.trigger(0.4) - 0.6).abs() < EPSILON);
        assert_eq!(cfg.trigger(0.9), 1.0);
        assert_eq!(cfg.trigger(-0.2), 0.0);
    }

    // ==================== Normalization ====================

    #[test]
    fn test_normalize_axis_endpoints() {
        assert_eq!(normalize_axis(-32768, -32768, 32767), -1.0);
        assert_eq!(normalize_axis(32767, -32768, 32767), 1.0);
        assert!(normalize_axis(0, -32768, 32767).abs() < 0.001);
    }

    #[test]
    fn test_normalize_axis_clamps() {
        assert_eq!(normalize_axis(400, 0, 255), 1.0);
        assert_eq!(normalize_axis(-5, 0, 255), -1.0);
    }

    #[test]
    fn test_normalize_degenerate_range() {
        assert_eq!(normalize_axis(10, 5, 5), 0.0);
        assert_eq!(normalize_trigger(10, 5, 5), 0.0);
    }

    #[test]
    fn test_normalize_trigger_midpoint() {
        assert!((normalize_trigger(511, 0, 1023) - 0.5).abs() < 0.01);
    }
}
