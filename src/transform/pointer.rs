//! Right stick to relative pointer motion.
//!
//! Per axis: `speed * sign(v) * |v|^accel * dt` pixels, after the pointer's
//! own radial deadzone. Fractional pixels are carried over to the next tick
//! so slow deflections still move the pointer.

use crate::config::{PointerActivation, RuntimeSettings};
use crate::controller::sampler::FrameSample;
use crate::transform::shaping::RadialDeadzone;

/// Smallest exponent used for the response curve.
const MIN_ACCEL: f32 = 0.01;

/// Whole-pixel pointer motion for one tick, screen coordinates (+y = down).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerDelta {
    pub dx: i32,
    pub dy: i32,
}

impl PointerDelta {
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

/// Applies `sign(v) * |v|^accel`.
///
/// # Examples
///
/// ```
/// use camstick::transform::pointer::response_curve;
///
/// assert_eq!(response_curve(1.0, 2.0), 1.0);
/// assert!((response_curve(-0.5, 2.0) + 0.25).abs() < 1e-6);
/// ```
#[must_use]
pub fn response_curve(v: f32, accel: f32) -> f32 {
    if v == 0.0 || !v.is_finite() {
        return 0.0;
    }
    v.signum() * v.abs().powf(accel.max(MIN_ACCEL))
}

/// Converts the right stick into pointer deltas.
#[derive(Debug, Clone, Default)]
pub struct PointerMapper {
    remainder_x: f32,
    remainder_y: f32,
}

impl PointerMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops any accumulated sub-pixel motion.
    pub fn reset(&mut self) {
        self.remainder_x = 0.0;
        self.remainder_y = 0.0;
    }

    /// True if the pointer should move this tick.
    #[must_use]
    pub fn is_active(sample: &FrameSample, settings: &RuntimeSettings) -> bool {
        if !settings.mouse_enabled {
            return false;
        }
        match settings.mouse_activation_mode {
            PointerActivation::Always => true,
            PointerActivation::Hold => sample.buttons.contains(settings.mouse_hold_key),
        }
    }

    /// Computes this tick's pointer delta.
    ///
    /// Inactive ticks emit zero and clear the remainder.
    pub fn map(&mut self, sample: &FrameSample, settings: &RuntimeSettings, dt: f32) -> PointerDelta {
        if !Self::is_active(sample, settings) {
            self.reset();
            return PointerDelta::default();
        }

        let shaped = RadialDeadzone::new(settings.mouse_deadzone as f32).apply(sample.right);
        let speed = settings.mouse_speed_px_per_sec as f32;
        let accel = settings.mouse_accel as f32;

        let move_x = speed * response_curve(shaped.x, accel) * dt;
        // Stick up is +y, screen up is -y
        let mut move_y = -speed * response_curve(shaped.y, accel) * dt;
        if settings.mouse_invert_y {
            move_y = -move_y;
        }

        if !move_x.is_finite() || !move_y.is_finite() {
            self.reset();
            return PointerDelta::default();
        }

        self.remainder_x += move_x;
        self.remainder_y += move_y;
        let dx = self.remainder_x.round();
        let dy = self.remainder_y.round();
        self.remainder_x -= dx;
        self.remainder_y -= dy;

        PointerDelta {
            dx: dx as i32,
            dy: dy as i32,
        }
    }
}
