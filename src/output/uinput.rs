//! # uinput Sinks
//!
//! Linux virtual devices created through `/dev/uinput`.
//!
//! ## Virtual Gamepad Layout (Xbox 360 style)
//!
//! | Control | evdev Code | Range |
//! |---------|------------|-------|
//! | Left stick | ABS_X / ABS_Y | -32768..32767 (Y down-positive) |
//! | Right stick | ABS_RX / ABS_RY | -32768..32767 (Y down-positive) |
//! | Left trigger | ABS_Z | 0..255 |
//! | Right trigger | ABS_RZ | 0..255 |
//! | D-Pad | ABS_HAT0X / ABS_HAT0Y | -1/0/1 (Y down-positive) |
//! | A / B | BTN_SOUTH / BTN_EAST | 0/1 |
//! | X / Y | BTN_NORTH / BTN_WEST | 0/1 (`BTN_X` / `BTN_Y` aliases) |
//! | LB / RB | BTN_TL / BTN_TR | 0/1 |
//! | Back / Start | BTN_SELECT / BTN_START | 0/1 |
//! | L3 / R3 | BTN_THUMBL / BTN_THUMBR | 0/1 |
//!
//! ## Keyboard/Mouse
//!
//! REL_X / REL_Y motion, `BTN_LEFT` (so the device is classified as a
//! mouse) and the macro keys.

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{
    AbsInfo, AbsoluteAxisType, AttributeSet, BusType, EventType, InputEvent, InputId, Key,
    RelativeAxisType, UinputAbsSetup,
};
use std::io;
use tracing::info;

use crate::combo::MacroKey;
use crate::controller::profile::{ButtonSet, LogicalButton};
use crate::error::{CamStickError, Result};
use crate::output::{GamepadReport, GamepadSink, KeyInjector};

/// Name of the virtual controller.
pub const GAMEPAD_NAME: &str = "camstick virtual pad";

/// Name of the virtual keyboard/mouse.
pub const KEYBOARD_MOUSE_NAME: &str = "camstick virtual keyboard-mouse";

/// Stick axis maximum.
pub const STICK_MAX: i32 = 32767;

/// Trigger axis maximum.
pub const TRIGGER_MAX: i32 = 255;

const GAMEPAD_BUTTONS: [(LogicalButton, Key); 10] = [
    (LogicalButton::FaceA, Key::BTN_SOUTH),
    (LogicalButton::FaceB, Key::BTN_EAST),
    (LogicalButton::FaceX, Key::BTN_NORTH),
    (LogicalButton::FaceY, Key::BTN_WEST),
    (LogicalButton::BumperL, Key::BTN_TL),
    (LogicalButton::BumperR, Key::BTN_TR),
    (LogicalButton::Select, Key::BTN_SELECT),
    (LogicalButton::Start, Key::BTN_START),
    (LogicalButton::StickClickL, Key::BTN_THUMBL),
    (LogicalButton::StickClickR, Key::BTN_THUMBR),
];

/// Converts a normalized stick value (-1.0 to 1.0) to a signed 16-bit axis.
///
/// # Examples
///
/// ```
/// use camstick::output::uinput::to_short_axis;
///
/// assert_eq!(to_short_axis(1.0), 32767);
/// assert_eq!(to_short_axis(-1.0), -32767);
/// assert_eq!(to_short_axis(0.0), 0);
/// assert_eq!(to_short_axis(7.0), 32767);
/// ```
#[must_use]
pub fn to_short_axis(value: f32) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    (value.clamp(-1.0, 1.0) * STICK_MAX as f32).round() as i32
}

/// Converts a normalized trigger value (0.0 to 1.0) to 0..255.
///
/// # Examples
///
/// ```
/// use camstick::output::uinput::to_trigger_byte;
///
/// assert_eq!(to_trigger_byte(0.0), 0);
/// assert_eq!(to_trigger_byte(0.5), 128);
/// assert_eq!(to_trigger_byte(1.0), 255);
/// ```
#[must_use]
pub fn to_trigger_byte(value: f32) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * TRIGGER_MAX as f32).round() as i32
}

/// D-pad buttons to evdev hat values `(x, y)`, y down-positive.
#[must_use]
pub fn hat_from_buttons(buttons: &ButtonSet) -> (i32, i32) {
    let axis = |negative: LogicalButton, positive: LogicalButton| {
        i32::from(buttons.contains(positive)) - i32::from(buttons.contains(negative))
    };
    (
        axis(LogicalButton::DpadLeft, LogicalButton::DpadRight),
        axis(LogicalButton::DpadUp, LogicalButton::DpadDown),
    )
}

fn abs_event(axis: AbsoluteAxisType, value: i32) -> InputEvent {
    InputEvent::new(EventType::ABSOLUTE, axis.0, value)
}

fn key_event(key: Key, pressed: bool) -> InputEvent {
    InputEvent::new(EventType::KEY, key.code(), i32::from(pressed))
}

fn rel_event(axis: RelativeAxisType, value: i32) -> InputEvent {
    InputEvent::new(EventType::RELATIVE, axis.0, value)
}

/// Builds the evdev events describing one report.
#[must_use]
pub fn report_events(report: &GamepadReport) -> Vec<InputEvent> {
    let (hat_x, hat_y) = hat_from_buttons(&report.buttons);
    let mut events = vec![
        abs_event(AbsoluteAxisType::ABS_X, to_short_axis(report.left_stick.x)),
        abs_event(AbsoluteAxisType::ABS_Y, to_short_axis(-report.left_stick.y)),
        abs_event(AbsoluteAxisType::ABS_RX, to_short_axis(report.right_stick.x)),
        abs_event(AbsoluteAxisType::ABS_RY, to_short_axis(-report.right_stick.y)),
        abs_event(AbsoluteAxisType::ABS_Z, to_trigger_byte(report.left_trigger)),
        abs_event(AbsoluteAxisType::ABS_RZ, to_trigger_byte(report.right_trigger)),
        abs_event(AbsoluteAxisType::ABS_HAT0X, hat_x),
        abs_event(AbsoluteAxisType::ABS_HAT0Y, hat_y),
    ];
    events.extend(
        GAMEPAD_BUTTONS
            .iter()
            .map(|(button, key)| key_event(*key, report.buttons.contains(*button))),
    );
    events
}

fn build_gamepad() -> io::Result<VirtualDevice> {
    let mut keys = AttributeSet::<Key>::new();
    for (_, key) in GAMEPAD_BUTTONS {
        keys.insert(key);
    }

    let stick = AbsInfo::new(0, -STICK_MAX - 1, STICK_MAX, 16, 128, 0);
    let trigger = AbsInfo::new(0, 0, TRIGGER_MAX, 0, 0, 0);
    let hat = AbsInfo::new(0, -1, 1, 0, 0, 0);

    let mut builder = VirtualDeviceBuilder::new()?
        .name(GAMEPAD_NAME)
        .input_id(InputId::new(BusType::BUS_USB, 0x045e, 0x028e, 0x0110))
        .with_keys(&keys)?;
    for (axis, info) in [
        (AbsoluteAxisType::ABS_X, stick),
        (AbsoluteAxisType::ABS_Y, stick),
        (AbsoluteAxisType::ABS_RX, stick),
        (AbsoluteAxisType::ABS_RY, stick),
        (AbsoluteAxisType::ABS_Z, trigger),
        (AbsoluteAxisType::ABS_RZ, trigger),
        (AbsoluteAxisType::ABS_HAT0X, hat),
        (AbsoluteAxisType::ABS_HAT0Y, hat),
    ] {
        builder = builder.with_absolute_axis(&UinputAbsSetup::new(axis, info))?;
    }
    builder.build()
}

/// Virtual Xbox-360-style controller.
pub struct VirtualGamepad {
    device: VirtualDevice,
}

impl VirtualGamepad {
    /// Creates the uinput device.
    ///
    /// # Errors
    ///
    /// Returns `DriverMissing` if `/dev/uinput` is absent or not writable.
    pub fn create() -> Result<Self> {
        let device = build_gamepad()
            .map_err(|e| CamStickError::DriverMissing(format!("cannot create {}: {}", GAMEPAD_NAME, e)))?;
        info!("Created virtual controller '{}'", GAMEPAD_NAME);
        Ok(Self { device })
    }
}

impl GamepadSink for VirtualGamepad {
    fn emit(&mut self, report: &GamepadReport) -> Result<()> {
        self.device
            .emit(&report_events(report))
            .map_err(|e| CamStickError::SinkUnavailable(e.to_string()))
    }
}

fn macro_key_code(key: MacroKey) -> Key {
    match key {
        MacroKey::F8 => Key::KEY_F8,
        MacroKey::F11 => Key::KEY_F11,
        MacroKey::F12 => Key::KEY_F12,
        MacroKey::ArrowUp => Key::KEY_UP,
        MacroKey::ArrowDown => Key::KEY_DOWN,
    }
}

fn build_keyboard_mouse() -> io::Result<VirtualDevice> {
    let mut keys = AttributeSet::<Key>::new();
    keys.insert(Key::BTN_LEFT);
    for key in [
        MacroKey::F8,
        MacroKey::F11,
        MacroKey::F12,
        MacroKey::ArrowUp,
        MacroKey::ArrowDown,
    ] {
        keys.insert(macro_key_code(key));
    }

    let mut axes = AttributeSet::<RelativeAxisType>::new();
    axes.insert(RelativeAxisType::REL_X);
    axes.insert(RelativeAxisType::REL_Y);

    VirtualDeviceBuilder::new()?
        .name(KEYBOARD_MOUSE_NAME)
        .input_id(InputId::new(BusType::BUS_VIRTUAL, 0x1209, 0x0c57, 1))
        .with_keys(&keys)?
        .with_relative_axes(&axes)?
        .build()
}

/// Virtual keyboard and relative mouse.
pub struct VirtualKeyboardMouse {
    device: VirtualDevice,
}

impl VirtualKeyboardMouse {
    /// Creates the uinput device.
    ///
    /// # Errors
    ///
    /// Returns `DriverMissing` if `/dev/uinput` is absent or not writable.
    pub fn create() -> Result<Self> {
        let device = build_keyboard_mouse().map_err(|e| {
            CamStickError::DriverMissing(format!("cannot create {}: {}", KEYBOARD_MOUSE_NAME, e))
        })?;
        info!("Created virtual keyboard/mouse '{}'", KEYBOARD_MOUSE_NAME);
        Ok(Self { device })
    }
}

impl KeyInjector for VirtualKeyboardMouse {
    fn move_pointer(&mut self, dx: i32, dy: i32) -> Result<()> {
        let mut events = Vec::with_capacity(2);
        if dx != 0 {
            events.push(rel_event(RelativeAxisType::REL_X, dx));
        }
        if dy != 0 {
            events.push(rel_event(RelativeAxisType::REL_Y, dy));
        }
        if events.is_empty() {
            return Ok(());
        }
        self.device
            .emit(&events)
            .map_err(|e| CamStickError::SinkUnavailable(e.to_string()))
    }

    fn tap_key(&mut self, key: MacroKey) -> Result<()> {
        let code = macro_key_code(key);
        self.device
            .emit(&[key_event(code, true)])
            .and_then(|()| self.device.emit(&[key_event(code, false)]))
            .map_err(|e| CamStickError::SinkUnavailable(e.to_string()))
    }
}
