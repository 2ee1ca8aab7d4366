//! # Deadzone Shaping
//!
//! Radial deadzone shared by the movement stick, the yaw input and the
//! pointer.
//!
//! A vector whose magnitude is below the deadzone maps to zero. Outside the
//! deadzone the magnitude is remapped linearly so the output grows
//! continuously from 0 at the deadzone edge to 1 at full deflection, keeping
//! the original direction:
//!
//! `m' = (m - dz) / (1 - dz)`
//!
//! ## Usage
//!
//! ```
//! use camstick::transform::shaping::{RadialDeadzone, StickVector};
//!
//! let dz = RadialDeadzone::new(0.1);
//!
//! // Inside the deadzone
//! assert_eq!(dz.apply(StickVector::new(0.05, 0.0)), StickVector::ZERO);
//!
//! // Full deflection is preserved
//! let full = dz.apply(StickVector::new(0.0, 1.0));
//! assert!((full.y - 1.0).abs() < 1e-6);
//! ```

use std::ops::{Add, Mul};

/// Upper bound for a usable deadzone radius.
pub const MAX_DEADZONE: f32 = 0.99;

/// A 2D analog stick vector, +x = right, +y = up.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StickVector {
    pub x: f32,
    pub y: f32,
}

impl StickVector {
    pub const ZERO: StickVector = StickVector { x: 0.0, y: 0.0 };

    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean length.
    #[must_use]
    pub fn magnitude(&self) -> f32 {
        self.x.hypot(self.y)
    }

    /// Scales the vector down so its length is at most `max`.
    #[must_use]
    pub fn clamp_magnitude(self, max: f32) -> Self {
        let mag = self.magnitude();
        if mag > max && mag > 0.0 {
            self * (max / mag)
        } else {
            self
        }
    }

    /// Replaces non-finite components with 0.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let fix = |v: f32| if v.is_finite() { v } else { 0.0 };
        Self::new(fix(self.x), fix(self.y))
    }
}

impl Add for StickVector {
    type Output = StickVector;

    fn add(self, rhs: StickVector) -> StickVector {
        StickVector::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Mul<f32> for StickVector {
    type Output = StickVector;

    fn mul(self, rhs: f32) -> StickVector {
        StickVector::new(self.x * rhs, self.y * rhs)
    }
}

/// Radial deadzone with continuous rescaling.
#[derive(Debug, Clone, Copy)]
pub struct RadialDeadzone {
    /// Deadzone radius (0.0 to [`MAX_DEADZONE`]).
    radius: f32,
}

impl Default for RadialDeadzone {
    fn default() -> Self {
        Self { radius: 0.0 }
    }
}

impl RadialDeadzone {
    /// Creates a deadzone of the given radius.
    ///
    /// # Arguments
    ///
    /// * `radius` - Deadzone radius. Values outside 0.0..=0.99 are clamped,
    ///   non-finite values become 0.
    #[must_use]
    pub fn new(radius: f32) -> Self {
        let radius = if radius.is_finite() {
            radius.clamp(0.0, MAX_DEADZONE)
        } else {
            0.0
        };
        Self { radius }
    }

    /// Returns the configured radius.
    #[must_use]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Applies the deadzone to a stick vector.
    ///
    /// # Arguments
    ///
    /// * `input` - Stick vector, normally within the unit disk
    ///
    /// # Returns
    ///
    /// Zero inside the deadzone, otherwise the same direction with magnitude
    /// remapped onto 0..=1.
    #[must_use]
    pub fn apply(&self, input: StickVector) -> StickVector {
        let input = input.sanitized();
        let mag = input.magnitude();
        if mag < self.radius || mag <= f32::EPSILON {
            return StickVector::ZERO;
        }
        let shaped = ((mag - self.radius) / (1.0 - self.radius)).clamp(0.0, 1.0);
        input * (shaped / mag)
    }

    /// Applies the deadzone to a single axis, treating it as a 1D vector.
    #[must_use]
    pub fn apply_axis(&self, input: f32) -> f32 {
        self.apply(StickVector::new(input, 0.0)).x
    }
}

/// Convenience for a one-off shape call.
///
/// # Examples
///
/// ```
/// use camstick::transform::shaping::{shape, StickVector};
///
/// let v = shape(StickVector::new(1.0, 0.0), 0.2);
/// assert!((v.x - 1.0).abs() < 1e-6);
/// ```
#[must_use]
pub fn shape(input: StickVector, deadzone: f32) -> StickVector {
    RadialDeadzone::new(deadzone).apply(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    // ==================== StickVector Tests ====================

    #[test]
    fn test_magnitude() {
        assert!((StickVector::new(3.0, 4.0).magnitude() - 5.0).abs() < EPS);
        assert_eq!(StickVector::ZERO.magnitude(), 0.0);
    }

    #[test]
    fn test_clamp_magnitude() {
        let v = StickVector::new(1.0, 1.0).clamp_magnitude(1.0);
        assert!((v.magnitude() - 1.0).abs() < EPS);
        assert!((v.x - v.y).abs() < EPS);

        let inside = StickVector::new(0.3, 0.4);
        assert_eq!(inside.clamp_magnitude(1.0), inside);
    }

    #[test]
    fn test_sanitized() {
        let v = StickVector::new(f32::NAN, f32::INFINITY).sanitized();
        assert_eq!(v, StickVector::ZERO);
    }

    // ==================== RadialDeadzone Tests ====================

    #[test]
    fn test_deadzone_clamps_radius() {
        assert_eq!(RadialDeadzone::new(-0.5).radius(), 0.0);
        assert!((RadialDeadzone::new(3.0).radius() - MAX_DEADZONE).abs() < EPS);
        assert_eq!(RadialDeadzone::new(f32::NAN).radius(), 0.0);
    }

    #[test]
    fn test_inside_deadzone_is_zero() {
        let dz = RadialDeadzone::new(0.12);
        assert_eq!(dz.apply(StickVector::new(0.08, 0.08)), StickVector::ZERO);
        assert_eq!(dz.apply(StickVector::new(0.0, -0.11)), StickVector::ZERO);
    }

    #[test]
    fn test_continuous_at_boundary() {
        let dz = RadialDeadzone::new(0.2);
        for eps in [1e-2_f32, 1e-3, 1e-4] {
            let v = dz.apply(StickVector::new(0.2 + eps, 0.0));
            assert!(v.x < eps * 2.0, "shape(dz + {}) = {}", eps, v.x);
        }
    }

    #[test]
    fn test_full_deflection_is_one() {
        let dz = RadialDeadzone::new(0.3);
        let v = dz.apply(StickVector::new(-1.0, 0.0));
        assert!((v.x + 1.0).abs() < EPS);

        let diag = std::f32::consts::FRAC_1_SQRT_2;
        let v = dz.apply(StickVector::new(diag, diag));
        assert!((v.magnitude() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_direction_preserved() {
        let dz = RadialDeadzone::new(0.1);
        let v = dz.apply(StickVector::new(0.3, -0.4));
        assert!((v.y / v.x - (-0.4 / 0.3)).abs() < 1e-4);
        // (0.5 - 0.1) / 0.9
        assert!((v.magnitude() - 0.444_444).abs() < 1e-4);
    }

    #[test]
    fn test_zero_deadzone_is_identity() {
        let dz = RadialDeadzone::default();
        let v = StickVector::new(0.25, -0.5);
        let out = dz.apply(v);
        assert!((out.x - v.x).abs() < EPS);
        assert!((out.y - v.y).abs() < EPS);
    }

    #[test]
    fn test_apply_axis() {
        let dz = RadialDeadzone::new(0.5);
        assert_eq!(dz.apply_axis(0.4), 0.0);
        assert!((dz.apply_axis(-0.75) + 0.5).abs() < EPS);
    }
}
