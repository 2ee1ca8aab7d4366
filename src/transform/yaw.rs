//! Yaw offset integration.
//!
//! The yaw offset is the angle between the camera and the game's fixed
//! movement frame. It grows while the camera stick is held sideways:
//!
//! `yaw += right_x * speed_rad_per_sec * invert_sign * dt`
//!
//! where `right_x` is the right stick X after deadzone shaping, so stick
//! noise near center adds no drift.

use std::f32::consts::{PI, TAU};

use crate::config::RuntimeSettings;

/// Reduces an angle into (-π, π].
///
/// Angles already in range are returned unchanged, so the function is
/// idempotent. Non-finite input maps to 0.
///
/// # Examples
///
/// ```
/// use camstick::transform::yaw::wrap_angle;
/// use std::f32::consts::PI;
///
/// assert_eq!(wrap_angle(PI), PI);
/// assert!((wrap_angle(-PI) - PI).abs() < 1e-6);
/// assert!((wrap_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-5);
/// ```
#[must_use]
pub fn wrap_angle(theta: f32) -> f32 {
    if !theta.is_finite() {
        return 0.0;
    }
    if theta > -PI && theta <= PI {
        return theta;
    }
    let wrapped = (theta + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Accumulates the yaw offset from the camera stick.
#[derive(Debug, Clone, Default)]
pub struct YawIntegrator {
    offset: f32,
}

impl YawIntegrator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current yaw offset in radians.
    #[must_use]
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Manual resync: zero the offset.
    pub fn reset(&mut self) {
        self.offset = 0.0;
    }

    /// Integrates one tick.
    ///
    /// # Arguments
    ///
    /// * `right_x` - Deadzone-shaped right stick X (-1.0 to 1.0)
    /// * `settings` - Tick snapshot (speed, invert, wrap)
    /// * `dt` - Seconds since the previous tick
    ///
    /// # Returns
    ///
    /// The updated offset.
    pub fn advance(&mut self, right_x: f32, settings: &RuntimeSettings, dt: f32) -> f32 {
        let speed = (settings.rotation_speed_deg_per_sec as f32).to_radians();
        let direction = if settings.invert_rotation { -1.0 } else { 1.0 };
        let delta = right_x * speed * direction * dt;
        if delta.is_finite() {
            self.offset += delta;
        }
        if settings.wrap_yaw {
            self.offset = wrap_angle(self.offset);
        }
        self.offset
    }
}
