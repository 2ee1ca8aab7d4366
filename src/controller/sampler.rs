//! # Input Sampler Module
//!
//! Translates one [`RawFrame`] into a [`FrameSample`] of logical controls
//! through the active [`CalibrationProfile`].
//!
//! ## Translation
//!
//! | Binding | Logical value |
//! |---------|---------------|
//! | Stick axis | `AxisBinding::normalize`, -1.0 to 1.0 |
//! | Trigger axis | `AxisBinding::normalize` floored at 0, 0.0 to 1.0 |
//! | Trigger button | 0.0 or 1.0 |
//! | Button | pressed / released |
//! | Hat direction | pressed while the hat points that way (diagonals press both) |
//!
//! Controls with no binding read as neutral. A trigger counts as held once it
//! passes [`TRIGGER_HELD_THRESHOLD`].

use std::time::Duration;
use tracing::{info, warn};

use crate::config::RuntimeSettings;
use crate::controller::profile::{
    ButtonBinding, ButtonSet, CalibrationProfile, LogicalAxis, LogicalButton,
};
use crate::controller::raw::{FrameSource, RawFrame};
use crate::error::{CamStickError, Result};
use crate::transform::shaping::StickVector;

/// Analog trigger level above which the trigger is reported as held (8/255).
pub const TRIGGER_HELD_THRESHOLD: f32 = 8.0 / 255.0;

/// Logical controller state for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSample {
    /// Left stick, +x right, +y up, before deadzone.
    pub left: StickVector,
    /// Right stick, +x right, +y up, before deadzone.
    pub right: StickVector,
    /// Left trigger, 0.0 to 1.0.
    pub trigger_left: f32,
    /// Right trigger, 0.0 to 1.0.
    pub trigger_right: f32,
    pub buttons: ButtonSet,
    /// Time since the runtime started.
    pub timestamp: Duration,
    /// Seconds since the previous tick.
    pub dt: f32,
}

impl FrameSample {
    /// Logical axis value.
    #[must_use]
    pub fn axis(&self, axis: LogicalAxis) -> f32 {
        match axis {
            LogicalAxis::LeftX => self.left.x,
            LogicalAxis::LeftY => self.left.y,
            LogicalAxis::RightX => self.right.x,
            LogicalAxis::RightY => self.right.y,
        }
    }

    #[must_use]
    pub fn is_held(&self, button: LogicalButton) -> bool {
        self.buttons.contains(button)
    }
}

/// Reads frames from a source and translates them.
#[derive(Debug)]
pub struct InputSampler {
    connected: bool,
}

impl Default for InputSampler {
    fn default() -> Self {
        Self { connected: true }
    }
}

impl InputSampler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the last poll found a controller.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Polls `source` once and translates the frame.
    ///
    /// # Errors
    ///
    /// Propagates `NoControllerConnected` (and any other source error) so the
    /// caller can hold its output neutral.
    pub fn sample<S>(
        &mut self,
        source: &mut S,
        profile: &CalibrationProfile,
        settings: &RuntimeSettings,
        timestamp: Duration,
        dt: f32,
    ) -> Result<FrameSample>
    where
        S: FrameSource + ?Sized,
    {
        match source.poll() {
            Ok(raw) => {
                if !self.connected {
                    info!("Controller connected, resuming output");
                    self.connected = true;
                }
                let mut sample = Self::translate(&raw, profile, settings);
                sample.timestamp = timestamp;
                sample.dt = dt;
                Ok(sample)
            }
            Err(CamStickError::NoControllerConnected) => {
                if self.connected {
                    warn!("Controller disconnected, holding output neutral until it returns");
                    self.connected = false;
                }
                Err(CamStickError::NoControllerConnected)
            }
            Err(e) => Err(e),
        }
    }

    /// Translates a raw frame without polling.
    #[must_use]
    pub fn translate(
        raw: &RawFrame,
        profile: &CalibrationProfile,
        settings: &RuntimeSettings,
    ) -> FrameSample {
        let axis = |logical: LogicalAxis| -> f32 {
            profile
                .axis(logical)
                .and_then(|binding| raw.axis(binding.index).map(|v| binding.normalize(v)))
                .unwrap_or(0.0)
        };

        let mut left = StickVector::new(axis(LogicalAxis::LeftX), axis(LogicalAxis::LeftY));
        let mut right = StickVector::new(axis(LogicalAxis::RightX), axis(LogicalAxis::RightY));
        if settings.invert_left_y {
            left.y = -left.y;
        }
        if settings.invert_right_y {
            right.y = -right.y;
        }

        let mut buttons = ButtonSet::empty();
        let mut trigger_left = 0.0;
        let mut trigger_right = 0.0;

        for button in LogicalButton::ALL {
            let Some(binding) = profile.button(button) else {
                continue;
            };
            let level = match *binding {
                ButtonBinding::Button { index } => {
                    if raw.button(index) {
                        1.0
                    } else {
                        0.0
                    }
                }
                ButtonBinding::Hat { hat, x, y } => {
                    let (hx, hy) = raw.hat(hat);
                    let pressed = (x != 0 || y != 0)
                        && (x == 0 || hx == x)
                        && (y == 0 || hy == y);
                    if pressed {
                        1.0
                    } else {
                        0.0
                    }
                }
                ButtonBinding::Axis(axis_binding) => raw
                    .axis(axis_binding.index)
                    .map_or(0.0, |v| axis_binding.normalize(v).max(0.0)),
            };

            match button {
                LogicalButton::TriggerL => trigger_left = level,
                LogicalButton::TriggerR => trigger_right = level,
                _ => {}
            }
            let held = if button.is_trigger() {
                level > TRIGGER_HELD_THRESHOLD
            } else {
                level > 0.5
            };
            buttons.set(button, held);
        }

        FrameSample {
            left,
            right,
            trigger_left,
            trigger_right,
            buttons,
            timestamp: Duration::ZERO,
            dt: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::profile::fixtures::xbox_like_profile;
    use crate::controller::profile::{AxisBinding, DpadMode};
    use crate::controller::raw::mocks::ScriptedSource;

    fn neutral_raw() -> RawFrame {
        let mut raw = RawFrame::neutral(6, 12, 1);
        // Triggers rest at -1
        raw.axes[4] = -1.0;
        raw.axes[5] = -1.0;
        raw
    }

    // ==================== Translation Tests ====================

    #[test]
    fn test_neutral_frame_is_neutral() {
        let sample =
            InputSampler::translate(&neutral_raw(), &xbox_like_profile(), &RuntimeSettings::default());
        assert_eq!(sample.left, StickVector::ZERO);
        assert_eq!(sample.right, StickVector::ZERO);
        assert_eq!(sample.trigger_left, 0.0);
        assert!(sample.buttons.is_empty());
    }

    #[test]
    fn test_axes_follow_profile_signs() {
        let mut raw = neutral_raw();
        raw.axes[0] = 0.5;
        raw.axes[1] = -1.0; // physical up
        raw.axes[3] = 0.25; // physical down
        let sample =
            InputSampler::translate(&raw, &xbox_like_profile(), &RuntimeSettings::default());
        assert!((sample.left.x - 0.5).abs() < 1e-6);
        assert!((sample.left.y - 1.0).abs() < 1e-6);
        assert!((sample.right.y + 0.25).abs() < 1e-6);
        assert!((sample.axis(LogicalAxis::RightY) + 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_invert_y_flags() {
        let mut raw = neutral_raw();
        raw.axes[1] = -1.0;
        let settings = RuntimeSettings {
            invert_left_y: true,
            ..RuntimeSettings::default()
        };
        let sample = InputSampler::translate(&raw, &xbox_like_profile(), &settings);
        assert!((sample.left.y + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_triggers_are_analog_and_held_above_threshold() {
        let mut raw = neutral_raw();
        raw.axes[4] = 0.0; // half pulled
        raw.axes[5] = -1.0 + 2.0 * (4.0 / 255.0);
        let sample =
            InputSampler::translate(&raw, &xbox_like_profile(), &RuntimeSettings::default());
        assert!((sample.trigger_left - 0.5).abs() < 1e-6);
        assert!(sample.is_held(LogicalButton::TriggerL));
        assert!(sample.trigger_right > 0.0);
        assert!(!sample.is_held(LogicalButton::TriggerR));
    }

    #[test]
    fn test_buttons_and_hat() {
        let mut raw = neutral_raw();
        raw.buttons[4] = true; // bumper_l
        raw.hats[0] = (1, 1); // up-right diagonal
        let sample =
            InputSampler::translate(&raw, &xbox_like_profile(), &RuntimeSettings::default());
        assert!(sample.is_held(LogicalButton::BumperL));
        assert!(sample.is_held(LogicalButton::DpadUp));
        assert!(sample.is_held(LogicalButton::DpadRight));
        assert!(!sample.is_held(LogicalButton::DpadLeft));
        assert!(!sample.is_held(LogicalButton::DpadDown));
    }

    #[test]
    fn test_unbound_and_missing_controls_are_neutral() {
        let mut profile = CalibrationProfile::new(DpadMode::Buttons);
        profile.axes.insert(LogicalAxis::LeftX, AxisBinding::new(42, 1, 0.0));
        profile
            .buttons
            .insert(LogicalButton::Start, ButtonBinding::Button { index: 99 });
        let sample = InputSampler::translate(&neutral_raw(), &profile, &RuntimeSettings::default());
        assert_eq!(sample.left, StickVector::ZERO);
        assert!(sample.buttons.is_empty());
    }

    // ==================== Polling Tests ====================

    #[test]
    fn test_sample_stamps_time() {
        let mut source = ScriptedSource::new(1);
        source.push(neutral_raw());
        let mut sampler = InputSampler::new();
        let sample = sampler
            .sample(
                &mut source,
                &xbox_like_profile(),
                &RuntimeSettings::default(),
                Duration::from_millis(40),
                0.004,
            )
            .unwrap();
        assert_eq!(sample.timestamp, Duration::from_millis(40));
        assert_eq!(sample.dt, 0.004);
    }

    #[test]
    fn test_disconnect_is_reported() {
        let mut source = ScriptedSource::new(1);
        source.push_disconnect();
        source.push(neutral_raw());
        let mut sampler = InputSampler::new();
        let profile = xbox_like_profile();
        let settings = RuntimeSettings::default();

        let err = sampler
            .sample(&mut source, &profile, &settings, Duration::ZERO, 0.0)
            .unwrap_err();
        assert!(matches!(err, CamStickError::NoControllerConnected));
        assert!(!sampler.is_connected());

        assert!(sampler
            .sample(&mut source, &profile, &settings, Duration::ZERO, 0.0)
            .is_ok());
        assert!(sampler.is_connected());
    }
}
