//! # Calibration Profile Module
//!
//! Learned mapping from logical controls to the physical indices of one
//! specific controller.
//!
//! ## Logical Controls
//!
//! | Kind | Controls |
//! |------|----------|
//! | Axes | `left_x`, `left_y`, `right_x`, `right_y` |
//! | Face | `face_a`, `face_b`, `face_x`, `face_y` |
//! | Shoulder | `bumper_l`, `bumper_r`, `trigger_l`, `trigger_r` |
//! | System | `start`, `select` |
//! | Stick clicks | `stick_click_l`, `stick_click_r` |
//! | D-Pad | `dpad_up`, `dpad_down`, `dpad_left`, `dpad_right` |
//!
//! Axis bindings record a sign so that "push right" and "push up" always read
//! as +1 after normalization, whatever the physical controller reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CamStickError, Result};

/// Logical analog stick axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalAxis {
    /// Left stick, +1 = right.
    LeftX,
    /// Left stick, +1 = up.
    LeftY,
    /// Right stick, +1 = right.
    RightX,
    /// Right stick, +1 = up.
    RightY,
}

impl LogicalAxis {
    /// All logical axes in calibration order.
    pub const ALL: [LogicalAxis; 4] = [
        LogicalAxis::LeftX,
        LogicalAxis::LeftY,
        LogicalAxis::RightX,
        LogicalAxis::RightY,
    ];

    /// Snake-case identifier as used in the settings document.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            LogicalAxis::LeftX => "left_x",
            LogicalAxis::LeftY => "left_y",
            LogicalAxis::RightX => "right_x",
            LogicalAxis::RightY => "right_y",
        }
    }
}

impl fmt::Display for LogicalAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Logical digital controls (and the two triggers, which may be analog).
///
/// Deserialization also accepts the short names used by older settings
/// documents (`r3`, `l1_lb`, `cross_a`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalButton {
    #[serde(alias = "cross_a")]
    FaceA,
    #[serde(alias = "circle_b")]
    FaceB,
    #[serde(alias = "square_x")]
    FaceX,
    #[serde(alias = "triangle_y")]
    FaceY,
    #[serde(alias = "l1_lb")]
    BumperL,
    #[serde(alias = "r1_rb")]
    BumperR,
    #[serde(alias = "l2_lt")]
    TriggerL,
    #[serde(alias = "r2_rt")]
    TriggerR,
    Start,
    #[serde(alias = "select_back")]
    Select,
    #[serde(alias = "l3")]
    StickClickL,
    #[serde(alias = "r3")]
    StickClickR,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
}

impl LogicalButton {
    /// Every logical button, in bit order of [`ButtonSet`].
    pub const ALL: [LogicalButton; 16] = [
        LogicalButton::FaceA,
        LogicalButton::FaceB,
        LogicalButton::FaceX,
        LogicalButton::FaceY,
        LogicalButton::BumperL,
        LogicalButton::BumperR,
        LogicalButton::TriggerL,
        LogicalButton::TriggerR,
        LogicalButton::Start,
        LogicalButton::Select,
        LogicalButton::StickClickL,
        LogicalButton::StickClickR,
        LogicalButton::DpadUp,
        LogicalButton::DpadDown,
        LogicalButton::DpadLeft,
        LogicalButton::DpadRight,
    ];

    /// Snake-case identifier as used in the settings document.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            LogicalButton::FaceA => "face_a",
            LogicalButton::FaceB => "face_b",
            LogicalButton::FaceX => "face_x",
            LogicalButton::FaceY => "face_y",
            LogicalButton::BumperL => "bumper_l",
            LogicalButton::BumperR => "bumper_r",
            LogicalButton::TriggerL => "trigger_l",
            LogicalButton::TriggerR => "trigger_r",
            LogicalButton::Start => "start",
            LogicalButton::Select => "select",
            LogicalButton::StickClickL => "stick_click_l",
            LogicalButton::StickClickR => "stick_click_r",
            LogicalButton::DpadUp => "dpad_up",
            LogicalButton::DpadDown => "dpad_down",
            LogicalButton::DpadLeft => "dpad_left",
            LogicalButton::DpadRight => "dpad_right",
        }
    }

    /// True for the four d-pad directions.
    #[must_use]
    pub fn is_dpad(self) -> bool {
        matches!(
            self,
            LogicalButton::DpadUp
                | LogicalButton::DpadDown
                | LogicalButton::DpadLeft
                | LogicalButton::DpadRight
        )
    }

    /// True for the two triggers.
    #[must_use]
    pub fn is_trigger(self) -> bool {
        matches!(self, LogicalButton::TriggerL | LogicalButton::TriggerR)
    }

    #[inline]
    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl fmt::Display for LogicalButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Either kind of logical control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogicalControl {
    Axis(LogicalAxis),
    Button(LogicalButton),
}

impl fmt::Display for LogicalControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalControl::Axis(axis) => axis.fmt(f),
            LogicalControl::Button(button) => button.fmt(f),
        }
    }
}

/// Compact set of held logical buttons.
///
/// # Examples
///
/// ```
/// use camstick::controller::profile::{ButtonSet, LogicalButton};
///
/// let mut held = ButtonSet::empty();
/// held.insert(LogicalButton::BumperL);
/// assert!(held.contains(LogicalButton::BumperL));
/// assert!(!held.contains(LogicalButton::BumperR));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonSet(u32);

impl ButtonSet {
    /// A set with no buttons held.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, button: LogicalButton) {
        self.0 |= button.bit();
    }

    pub fn remove(&mut self, button: LogicalButton) {
        self.0 &= !button.bit();
    }

    /// Sets or clears a button.
    pub fn set(&mut self, button: LogicalButton, held: bool) {
        if held {
            self.insert(button);
        } else {
            self.remove(button);
        }
    }

    #[must_use]
    pub fn contains(&self, button: LogicalButton) -> bool {
        self.0 & button.bit() != 0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterates held buttons in [`LogicalButton::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = LogicalButton> + '_ {
        LogicalButton::ALL
            .into_iter()
            .filter(move |button| self.contains(*button))
    }
}

impl FromIterator<LogicalButton> for ButtonSet {
    fn from_iter<I: IntoIterator<Item = LogicalButton>>(iter: I) -> Self {
        let mut set = ButtonSet::empty();
        for button in iter {
            set.insert(button);
        }
        set
    }
}

/// Binding of a logical axis to a physical axis.
///
/// `rest` is the raw value the axis reported while untouched during
/// calibration; `sign` is +1 or -1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisBinding {
    pub index: usize,
    pub sign: i8,
    #[serde(default)]
    pub rest: f32,
}

impl AxisBinding {
    /// Creates a binding; any negative `sign` becomes -1, anything else +1.
    #[must_use]
    pub fn new(index: usize, sign: i8, rest: f32) -> Self {
        Self {
            index,
            sign: if sign < 0 { -1 } else { 1 },
            rest: if rest.is_finite() { rest.clamp(-1.0, 1.0) } else { 0.0 },
        }
    }

    /// Remaps a raw physical value in [-1, 1] to a logical value in [-1, 1].
    ///
    /// The distance from `rest` is divided by the room left on that side of
    /// `rest`, so a trigger resting at -1 maps its full travel onto 0..1 and a
    /// centered stick maps onto -1..1.
    ///
    /// # Examples
    ///
    /// ```
    /// use camstick::controller::profile::AxisBinding;
    ///
    /// let stick = AxisBinding::new(0, -1, 0.0);
    /// assert!((stick.normalize(-1.0) - 1.0).abs() < 1e-6);
    ///
    /// let trigger = AxisBinding::new(4, 1, -1.0);
    /// assert!((trigger.normalize(0.0) - 0.5).abs() < 1e-6);
    /// ```
    #[must_use]
    pub fn normalize(&self, raw: f32) -> f32 {
        if !raw.is_finite() {
            return 0.0;
        }
        let delta = raw - self.rest;
        let span = if delta >= 0.0 {
            1.0 - self.rest
        } else {
            1.0 + self.rest
        };
        if span <= f32::EPSILON {
            return 0.0;
        }
        (f32::from(self.sign) * delta / span).clamp(-1.0, 1.0)
    }
}

/// Binding of a logical button to a physical source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ButtonBinding {
    /// A physical button index.
    Button { index: usize },
    /// A hat direction, `x`/`y` in -1..=1 with +y = up.
    Hat { hat: usize, x: i32, y: i32 },
    /// An analog axis (triggers).
    Axis(AxisBinding),
}

impl ButtonBinding {
    /// The physical source this binding reads.
    #[must_use]
    pub fn source(&self) -> PhysicalSource {
        match *self {
            ButtonBinding::Button { index } => PhysicalSource::Button(index),
            ButtonBinding::Hat { hat, x, y } => PhysicalSource::Hat { hat, x, y },
            ButtonBinding::Axis(binding) => PhysicalSource::Axis(binding.index),
        }
    }
}

/// A physical input on the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalSource {
    Axis(usize),
    Button(usize),
    Hat { hat: usize, x: i32, y: i32 },
}

impl fmt::Display for PhysicalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalSource::Axis(index) => write!(f, "axis {}", index),
            PhysicalSource::Button(index) => write!(f, "button {}", index),
            PhysicalSource::Hat { hat, x, y } => write!(f, "hat {} ({},{})", hat, x, y),
        }
    }
}

/// How the controller reports its d-pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DpadMode {
    #[default]
    Hat,
    Buttons,
}

/// Learned controller layout.
///
/// `calibrated` is the completeness flag; it is not part of the serialized
/// `calibration` section (the settings document keeps it at top level).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationProfile {
    #[serde(default)]
    pub axes: BTreeMap<LogicalAxis, AxisBinding>,
    #[serde(default)]
    pub buttons: BTreeMap<LogicalButton, ButtonBinding>,
    #[serde(default)]
    pub dpad_mode: DpadMode,
    #[serde(skip)]
    pub calibrated: bool,
}

impl CalibrationProfile {
    /// Creates an empty, uncalibrated profile.
    #[must_use]
    pub fn new(dpad_mode: DpadMode) -> Self {
        Self {
            dpad_mode,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn axis(&self, axis: LogicalAxis) -> Option<&AxisBinding> {
        self.axes.get(&axis)
    }

    #[must_use]
    pub fn button(&self, button: LogicalButton) -> Option<&ButtonBinding> {
        self.buttons.get(&button)
    }

    /// Returns the logical control already bound to `source`, if any.
    #[must_use]
    pub fn owner_of(&self, source: PhysicalSource) -> Option<LogicalControl> {
        self.axes
            .iter()
            .find(|(_, binding)| PhysicalSource::Axis(binding.index) == source)
            .map(|(axis, _)| LogicalControl::Axis(*axis))
            .or_else(|| {
                self.buttons
                    .iter()
                    .find(|(_, binding)| binding.source() == source)
                    .map(|(button, _)| LogicalControl::Button(*button))
            })
    }

    /// Physical axis index per stick axis, `-1` when unbound.
    ///
    /// Order: left X, left Y, right X, right Y.
    #[must_use]
    pub fn stick_axis_indices(&self) -> [i64; 4] {
        LogicalAxis::ALL.map(|axis| {
            self.axes
                .get(&axis)
                .map_or(-1, |binding| binding.index as i64)
        })
    }

    /// Checks that every logical control has exactly one non-conflicting
    /// physical binding.
    ///
    /// # Errors
    ///
    /// Returns `Config` describing the first missing or conflicting binding.
    pub fn validate(&self) -> Result<()> {
        for axis in LogicalAxis::ALL {
            if !self.axes.contains_key(&axis) {
                return Err(CamStickError::Config(format!("axis {} is not bound", axis)));
            }
        }
        for button in LogicalButton::ALL {
            let Some(binding) = self.buttons.get(&button) else {
                return Err(CamStickError::Config(format!("button {} is not bound", button)));
            };
            if button.is_dpad() {
                let matches_mode = match self.dpad_mode {
                    DpadMode::Hat => matches!(binding, ButtonBinding::Hat { .. }),
                    DpadMode::Buttons => matches!(binding, ButtonBinding::Button { .. }),
                };
                if !matches_mode {
                    return Err(CamStickError::Config(format!(
                        "{} binding does not match dpad_mode {:?}",
                        button, self.dpad_mode
                    )));
                }
            }
        }

        let mut seen: Vec<(PhysicalSource, LogicalControl)> = Vec::new();
        let sources = self
            .axes
            .iter()
            .map(|(axis, b)| (PhysicalSource::Axis(b.index), LogicalControl::Axis(*axis)))
            .chain(
                self.buttons
                    .iter()
                    .map(|(button, b)| (b.source(), LogicalControl::Button(*button))),
            );
        for (source, control) in sources {
            if let Some((_, other)) = seen.iter().find(|(s, _)| *s == source) {
                return Err(CamStickError::Config(format!(
                    "{} is bound to both {} and {}",
                    source, other, control
                )));
            }
            seen.push((source, control));
        }
        Ok(())
    }

    /// Marks the profile complete if it validates.
    ///
    /// # Errors
    ///
    /// Propagates the validation failure and leaves `calibrated` false.
    pub fn finalize(&mut self) -> Result<()> {
        self.calibrated = false;
        self.validate()?;
        self.calibrated = true;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A complete hat-mode profile: axes 0..=3 for the sticks (Y axes
    /// down-positive), triggers on axes 4 and 5 resting at -1, buttons 0..=11.
    pub fn xbox_like_profile() -> CalibrationProfile {
        let mut profile = CalibrationProfile::new(DpadMode::Hat);
        profile.axes.insert(LogicalAxis::LeftX, AxisBinding::new(0, 1, 0.0));
        profile.axes.insert(LogicalAxis::LeftY, AxisBinding::new(1, -1, 0.0));
        profile.axes.insert(LogicalAxis::RightX, AxisBinding::new(2, 1, 0.0));
        profile.axes.insert(LogicalAxis::RightY, AxisBinding::new(3, -1, 0.0));

        let digital = [
            LogicalButton::FaceA,
            LogicalButton::FaceB,
            LogicalButton::FaceX,
            LogicalButton::FaceY,
            LogicalButton::BumperL,
            LogicalButton::BumperR,
            LogicalButton::Start,
            LogicalButton::Select,
            LogicalButton::StickClickL,
            LogicalButton::StickClickR,
        ];
        for (index, button) in digital.into_iter().enumerate() {
            profile.buttons.insert(button, ButtonBinding::Button { index });
        }
        profile.buttons.insert(
            LogicalButton::TriggerL,
            ButtonBinding::Axis(AxisBinding::new(4, 1, -1.0)),
        );
        profile.buttons.insert(
            LogicalButton::TriggerR,
            ButtonBinding::Axis(AxisBinding::new(5, 1, -1.0)),
        );
        for (button, x, y) in [
            (LogicalButton::DpadUp, 0, 1),
            (LogicalButton::DpadDown, 0, -1),
            (LogicalButton::DpadLeft, -1, 0),
            (LogicalButton::DpadRight, 1, 0),
        ] {
            profile.buttons.insert(button, ButtonBinding::Hat { hat: 0, x, y });
        }
        profile.calibrated = true;
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::xbox_like_profile;
    use super::*;

    // ==================== AxisBinding Tests ====================

    #[test]
    fn test_axis_binding_sign_is_normalized() {
        assert_eq!(AxisBinding::new(0, -7, 0.0).sign, -1);
        assert_eq!(AxisBinding::new(0, 0, 0.0).sign, 1);
        assert_eq!(AxisBinding::new(0, 3, 0.0).sign, 1);
    }

    #[test]
    fn test_normalize_centered_stick() {
        let binding = AxisBinding::new(0, 1, 0.0);
        assert_eq!(binding.normalize(0.0), 0.0);
        assert!((binding.normalize(0.5) - 0.5).abs() < 1e-6);
        assert!((binding.normalize(-1.0) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_inverted_stick() {
        let binding = AxisBinding::new(1, -1, 0.0);
        assert!((binding.normalize(-1.0) - 1.0).abs() < 1e-6);
        assert!((binding.normalize(1.0) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_off_center_rest() {
        // A slightly off-center stick still reaches both endpoints.
        let binding = AxisBinding::new(0, 1, 0.1);
        assert!(binding.normalize(0.1).abs() < 1e-6);
        assert!((binding.normalize(1.0) - 1.0).abs() < 1e-6);
        assert!((binding.normalize(-1.0) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_trigger_modes() {
        // Rests at -1, pulled to +1.
        let minus_one = AxisBinding::new(4, 1, -1.0);
        assert_eq!(minus_one.normalize(-1.0), 0.0);
        assert!((minus_one.normalize(1.0) - 1.0).abs() < 1e-6);

        // Rests at 0, pulled to +1.
        let zero = AxisBinding::new(4, 1, 0.0);
        assert!((zero.normalize(0.25) - 0.25).abs() < 1e-6);

        // Rests at +1, pulled to -1.
        let one = AxisBinding::new(4, -1, 1.0);
        assert_eq!(one.normalize(1.0), 0.0);
        assert!((one.normalize(-1.0) - 1.0).abs() < 1e-6);
        assert!((one.normalize(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_rejects_non_finite() {
        let binding = AxisBinding::new(0, 1, 0.0);
        assert_eq!(binding.normalize(f32::NAN), 0.0);
    }

    // ==================== ButtonSet Tests ====================

    #[test]
    fn test_button_set_insert_remove() {
        let mut set = ButtonSet::empty();
        assert!(set.is_empty());
        set.insert(LogicalButton::Start);
        set.set(LogicalButton::DpadRight, true);
        assert!(set.contains(LogicalButton::Start));
        assert!(set.contains(LogicalButton::DpadRight));
        set.remove(LogicalButton::Start);
        assert!(!set.contains(LogicalButton::Start));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![LogicalButton::DpadRight]);
    }

    #[test]
    fn test_button_set_from_iter() {
        let set: ButtonSet = [LogicalButton::BumperL, LogicalButton::StickClickR]
            .into_iter()
            .collect();
        assert_eq!(set.iter().count(), 2);
    }

    // ==================== Identifier Tests ====================

    #[test]
    fn test_logical_button_accepts_legacy_names() {
        let parsed: LogicalButton = serde_json::from_str("\"r3\"").unwrap();
        assert_eq!(parsed, LogicalButton::StickClickR);
        let parsed: LogicalButton = serde_json::from_str("\"l2_lt\"").unwrap();
        assert_eq!(parsed, LogicalButton::TriggerL);
        let parsed: LogicalButton = serde_json::from_str("\"select\"").unwrap();
        assert_eq!(parsed, LogicalButton::Select);
    }

    #[test]
    fn test_ids_match_serde_names() {
        for button in LogicalButton::ALL {
            let json = serde_json::to_string(&button).unwrap();
            assert_eq!(json, format!("\"{}\"", button.id()));
        }
        for axis in LogicalAxis::ALL {
            let json = serde_json::to_string(&axis).unwrap();
            assert_eq!(json, format!("\"{}\"", axis.id()));
        }
    }

    // ==================== Profile Tests ====================

    #[test]
    fn test_complete_profile_validates() {
        let mut profile = xbox_like_profile();
        assert!(profile.validate().is_ok());
        assert!(profile.finalize().is_ok());
        assert!(profile.calibrated);
    }

    #[test]
    fn test_missing_binding_fails_validation() {
        let mut profile = xbox_like_profile();
        profile.buttons.remove(&LogicalButton::Select);
        let err = profile.finalize().unwrap_err();
        assert!(err.to_string().contains("select"));
        assert!(!profile.calibrated);
    }

    #[test]
    fn test_shared_axis_fails_validation() {
        let mut profile = xbox_like_profile();
        profile.axes.insert(LogicalAxis::RightX, AxisBinding::new(0, 1, 0.0));
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("axis 0"));
    }

    #[test]
    fn test_trigger_on_stick_axis_fails_validation() {
        let mut profile = xbox_like_profile();
        profile.buttons.insert(
            LogicalButton::TriggerL,
            ButtonBinding::Axis(AxisBinding::new(1, 1, -1.0)),
        );
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_dpad_mode_mismatch_fails_validation() {
        let mut profile = xbox_like_profile();
        profile.dpad_mode = DpadMode::Buttons;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_owner_of() {
        let profile = xbox_like_profile();
        assert_eq!(
            profile.owner_of(PhysicalSource::Axis(2)),
            Some(LogicalControl::Axis(LogicalAxis::RightX))
        );
        assert_eq!(
            profile.owner_of(PhysicalSource::Axis(5)),
            Some(LogicalControl::Button(LogicalButton::TriggerR))
        );
        assert_eq!(
            profile.owner_of(PhysicalSource::Hat { hat: 0, x: -1, y: 0 }),
            Some(LogicalControl::Button(LogicalButton::DpadLeft))
        );
        assert_eq!(profile.owner_of(PhysicalSource::Button(42)), None);
    }

    #[test]
    fn test_stick_axis_indices() {
        let mut profile = xbox_like_profile();
        assert_eq!(profile.stick_axis_indices(), [0, 1, 2, 3]);
        profile.axes.remove(&LogicalAxis::RightY);
        assert_eq!(profile.stick_axis_indices(), [0, 1, 2, -1]);
    }

    #[test]
    fn test_profile_json_shape() {
        let profile = xbox_like_profile();
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["dpad_mode"], "hat");
        assert_eq!(value["axes"]["left_y"]["sign"], -1);
        assert_eq!(value["buttons"]["face_a"]["type"], "button");
        assert_eq!(value["buttons"]["trigger_l"]["type"], "axis");
        assert_eq!(value["buttons"]["dpad_up"]["y"], 1);
        assert!(value.get("calibrated").is_none());

        let back: CalibrationProfile = serde_json::from_value(value).unwrap();
        assert_eq!(back.axes, profile.axes);
        assert_eq!(back.buttons, profile.buttons);
        assert!(!back.calibrated);
    }
}
