//! Movement stick rotation.
//!
//! Positive yaw rotates the stick counter-clockwise:
//!
//! ```text
//! x' = x·cos(θ) − y·sin(θ)
//! y' = x·sin(θ) + y·cos(θ)
//! ```
//!
//! so full "up" `(0, 1)` at θ = π/2 becomes full "left" `(−1, 0)`.

use crate::config::RuntimeSettings;
use crate::transform::shaping::{RadialDeadzone, StickVector};

/// Largest smoothing factor actually applied.
pub const MAX_SMOOTHING: f32 = 0.95;

/// Rotates a vector counter-clockwise by `angle` radians.
///
/// # Examples
///
/// ```
/// use camstick::transform::rotator::rotate;
/// use camstick::transform::shaping::StickVector;
/// use std::f32::consts::FRAC_PI_2;
///
/// let out = rotate(StickVector::new(0.0, 1.0), FRAC_PI_2);
/// assert!((out.x + 1.0).abs() < 1e-6);
/// assert!(out.y.abs() < 1e-6);
/// ```
#[must_use]
pub fn rotate(v: StickVector, angle: f32) -> StickVector {
    let (sin, cos) = angle.sin_cos();
    StickVector::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Deadzone, rotate, clamp and smooth the movement stick.
#[derive(Debug, Clone, Default)]
pub struct StickRotator {
    smoothed: StickVector,
}

impl StickRotator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed = StickVector::ZERO;
    }

    /// Processes one tick of the left stick.
    ///
    /// # Arguments
    ///
    /// * `left` - Logical left stick, before deadzone
    /// * `yaw` - Current yaw offset in radians
    /// * `settings` - Tick snapshot (deadzone, smoothing)
    ///
    /// # Returns
    ///
    /// The output vector, always within the unit disk.
    pub fn process(&mut self, left: StickVector, yaw: f32, settings: &RuntimeSettings) -> StickVector {
        let shaped = RadialDeadzone::new(settings.deadzone_left as f32).apply(left);
        let rotated = rotate(shaped, yaw).clamp_magnitude(1.0).sanitized();

        let k = (settings.output_smoothing as f32).clamp(0.0, MAX_SMOOTHING);
        self.smoothed = if k > 0.0 {
            (self.smoothed * k + rotated * (1.0 - k)).clamp_magnitude(1.0)
        } else {
            rotated
        };
        self.smoothed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    const EPS: f32 = 1e-5;

    fn settings(deadzone: f64, smoothing: f64) -> RuntimeSettings {
        RuntimeSettings {
            deadzone_left: deadzone,
            output_smoothing: smoothing,
            ..RuntimeSettings::default()
        }
    }

    // ==================== rotate Tests ====================

    #[test]
    fn test_rotation_is_invertible() {
        let vectors = [
            StickVector::new(0.0, 1.0),
            StickVector::new(0.3, -0.7),
            StickVector::new(-0.5, 0.5),
            StickVector::new(1.0, 0.0),
        ];
        let mut theta = -2.0 * PI;
        while theta <= 2.0 * PI {
            for v in vectors {
                let back = rotate(rotate(v, theta), -theta);
                assert!((back.x - v.x).abs() < EPS && (back.y - v.y).abs() < EPS);
            }
            theta += 0.37;
        }
    }

    #[test]
    fn test_up_at_quarter_turn_is_left() {
        let out = rotate(StickVector::new(0.0, 1.0), FRAC_PI_2);
        assert!((out.x + 1.0).abs() < EPS);
        assert!(out.y.abs() < EPS);
    }

    #[test]
    fn test_rotation_preserves_magnitude() {
        let v = StickVector::new(0.6, 0.2);
        assert!((rotate(v, 1.234).magnitude() - v.magnitude()).abs() < EPS);
    }

    // ==================== StickRotator Tests ====================

    #[test]
    fn test_process_applies_deadzone() {
        let mut rotator = StickRotator::new();
        let out = rotator.process(StickVector::new(0.05, 0.05), 1.0, &settings(0.12, 0.0));
        assert_eq!(out, StickVector::ZERO);
    }

    #[test]
    fn test_process_stays_in_unit_disk() {
        let mut rotator = StickRotator::new();
        let out = rotator.process(StickVector::new(1.0, 1.0), 0.3, &settings(0.0, 0.0));
        assert!(out.magnitude() <= 1.0 + EPS);
    }

    #[test]
    fn test_process_rotates() {
        let mut rotator = StickRotator::new();
        let out = rotator.process(StickVector::new(0.0, 1.0), FRAC_PI_2, &settings(0.12, 0.0));
        assert!((out.x + 1.0).abs() < EPS);
    }

    #[test]
    fn test_smoothing_filters_steps() {
        let mut rotator = StickRotator::new();
        let cfg = settings(0.0, 0.5);
        let first = rotator.process(StickVector::new(1.0, 0.0), 0.0, &cfg);
        assert!((first.x - 0.5).abs() < EPS);
        let second = rotator.process(StickVector::new(1.0, 0.0), 0.0, &cfg);
        assert!((second.x - 0.75).abs() < EPS);

        rotator.reset();
        let after_reset = rotator.process(StickVector::new(1.0, 0.0), 0.0, &cfg);
        assert!((after_reset.x - 0.5).abs() < EPS);
    }

    #[test]
    fn test_smoothing_is_capped() {
        let mut rotator = StickRotator::new();
        // 0.99 behaves like 0.95
        let out = rotator.process(StickVector::new(1.0, 0.0), 0.0, &settings(0.0, 0.99));
        assert!((out.x - 0.05).abs() < EPS);
    }
}
