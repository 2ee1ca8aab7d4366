//! # evdev Gamepad Source
//!
//! Reads a physical controller through the Linux evdev interface and exposes
//! it as a [`FrameSource`].
//!
//! ## Controller Detection
//!
//! Any `/dev/input/event*` device is treated as a game controller when it
//! reports:
//! - a gamepad or joystick button (`BTN_SOUTH`, `BTN_TRIGGER`, ... range 0x120-0x13f)
//! - an `ABS_X` axis
//!
//! Devices are enumerated in path order so `joystick_index` is stable across
//! runs with the same hardware.
//!
//! ## Frame Layout
//!
//! - Axes: every non-hat absolute axis in code order, normalized from the
//!   device's `[minimum, maximum]` to -1.0..1.0
//! - Buttons: every supported key in code order
//! - Hats: `ABS_HAT{n}X` / `ABS_HAT{n}Y` pairs, y flipped so +1 is up
//!
//! A read failure marks the controller disconnected; reconnection by device
//! name is attempted every [`RECONNECT_INTERVAL`].

use evdev::{AbsoluteAxisType, Device, Key};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::controller::raw::{FrameSource, RawFrame};
use crate::error::{CamStickError, Result};

/// Directory scanned for event devices.
const INPUT_DIR: &str = "/dev/input";

/// Key codes of the joystick and gamepad button blocks.
const CONTROLLER_BUTTON_CODES: std::ops::Range<u16> = 0x120..0x140;

/// First hat axis code (`ABS_HAT0X`).
const HAT_FIRST_CODE: u16 = 0x10;

/// Number of hats evdev can describe.
const MAX_HATS: u16 = 4;

/// Delay between reconnection scans.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

/// Converts an evdev absolute value to -1.0..1.0.
///
/// # Examples
///
/// ```
/// use camstick::controller::evdev_source::normalize_abs;
///
/// assert_eq!(normalize_abs(0, 0, 255), -1.0);
/// assert_eq!(normalize_abs(255, 0, 255), 1.0);
/// assert_eq!(normalize_abs(0, -32768, 32767).abs() < 0.001, true);
/// ```
#[must_use]
pub fn normalize_abs(value: i32, minimum: i32, maximum: i32) -> f32 {
    if maximum <= minimum {
        return 0.0;
    }
    let span = f64::from(maximum) - f64::from(minimum);
    let v = 2.0 * (f64::from(value) - f64::from(minimum)) / span - 1.0;
    v.clamp(-1.0, 1.0) as f32
}

/// Converts an evdev hat pair (y down-positive) to `(x, y)` with +y up.
#[must_use]
pub fn hat_value(x: i32, y: i32) -> (i32, i32) {
    (x.signum(), -y.signum())
}

fn is_hat_axis(axis: AbsoluteAxisType) -> bool {
    (HAT_FIRST_CODE..HAT_FIRST_CODE + 2 * MAX_HATS).contains(&axis.0)
}

/// Mapping from evdev codes to frame positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    axes: Vec<AbsoluteAxisType>,
    keys: Vec<Key>,
    hats: Vec<(AbsoluteAxisType, AbsoluteAxisType)>,
}

impl Layout {
    /// Builds the layout from the device's capabilities.
    pub fn new(
        axes: impl IntoIterator<Item = AbsoluteAxisType>,
        keys: impl IntoIterator<Item = Key>,
    ) -> Self {
        let all_axes: Vec<AbsoluteAxisType> = axes.into_iter().collect();

        let mut stick_axes: Vec<AbsoluteAxisType> = all_axes
            .iter()
            .copied()
            .filter(|axis| !is_hat_axis(*axis))
            .collect();
        stick_axes.sort_by_key(|axis| axis.0);

        let mut keys: Vec<Key> = keys.into_iter().collect();
        keys.sort_by_key(|key| key.code());

        let hats = (0..MAX_HATS)
            .map(|n| {
                (
                    AbsoluteAxisType(HAT_FIRST_CODE + 2 * n),
                    AbsoluteAxisType(HAT_FIRST_CODE + 2 * n + 1),
                )
            })
            .filter(|(x, _)| all_axes.contains(x))
            .collect();

        Self {
            axes: stick_axes,
            keys,
            hats,
        }
    }

    fn of(device: &Device) -> Self {
        Self::new(
            device
                .supported_absolute_axes()
                .map(|axes| axes.iter().collect::<Vec<_>>())
                .unwrap_or_default(),
            device
                .supported_keys()
                .map(|keys| keys.iter().collect::<Vec<_>>())
                .unwrap_or_default(),
        )
    }

    #[must_use]
    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    #[must_use]
    pub fn button_count(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn hat_count(&self) -> usize {
        self.hats.len()
    }
}

/// Summary of one detected controller, as printed by `--list`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub index: usize,
    pub path: PathBuf,
    pub name: String,
    pub axes: usize,
    pub buttons: usize,
    pub hats: usize,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {} axes, {} buttons, {} hats",
            self.index,
            self.name,
            self.path.display(),
            self.axes,
            self.buttons,
            self.hats
        )
    }
}

fn is_game_controller(device: &Device) -> bool {
    let has_buttons = device.supported_keys().map_or(false, |keys| {
        keys.iter()
            .any(|key| CONTROLLER_BUTTON_CODES.contains(&key.code()))
    });
    let has_stick = device
        .supported_absolute_axes()
        .map_or(false, |axes| axes.contains(AbsoluteAxisType::ABS_X));
    has_buttons && has_stick
}

/// Opens every game controller under `/dev/input`, in path order.
fn scan() -> Result<Vec<(PathBuf, Device)>> {
    let input_dir = Path::new(INPUT_DIR);
    if !input_dir.exists() {
        return Err(CamStickError::ControllerNotFound(format!(
            "{} directory not found",
            INPUT_DIR
        )));
    }

    let mut entries: Vec<_> = std::fs::read_dir(input_dir)
        .map_err(|e| CamStickError::Controller(format!("Failed to read {}: {}", INPUT_DIR, e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CamStickError::Controller(format!("Failed to read directory entry: {}", e)))?;
    entries.sort_by_key(|entry| entry.path());

    let mut found = Vec::new();
    for entry in entries {
        let path = entry.path();
        let is_event = path
            .file_name()
            .map_or(false, |name| name.to_string_lossy().starts_with("event"));
        if !is_event {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                if is_game_controller(&device) {
                    debug!(
                        "Found controller {} at {}",
                        device.name().unwrap_or("unnamed"),
                        path.display()
                    );
                    found.push((path, device));
                }
            }
            Err(e) => {
                // Permission denied or other errors - skip device
                debug!("Could not open {}: {}", path.display(), e);
            }
        }
    }
    Ok(found)
}

/// Lists detected controllers.
///
/// # Errors
///
/// Returns an error if `/dev/input` cannot be read.
pub fn list() -> Result<Vec<DeviceInfo>> {
    Ok(scan()?
        .into_iter()
        .enumerate()
        .map(|(index, (path, device))| {
            let layout = Layout::of(&device);
            DeviceInfo {
                index,
                path,
                name: device.name().unwrap_or("unnamed").to_string(),
                axes: layout.axis_count(),
                buttons: layout.button_count(),
                hats: layout.hat_count(),
            }
        })
        .collect())
}

fn read_frame(device: &Device, layout: &Layout) -> std::io::Result<RawFrame> {
    let abs = device.get_abs_state()?;
    let pressed = device.get_key_state()?;

    let axes = layout
        .axes
        .iter()
        .map(|axis| {
            let info = &abs[axis.0 as usize];
            normalize_abs(info.value, info.minimum, info.maximum)
        })
        .collect();
    let buttons = layout.keys.iter().map(|key| pressed.contains(*key)).collect();
    let hats = layout
        .hats
        .iter()
        .map(|(x, y)| hat_value(abs[x.0 as usize].value, abs[y.0 as usize].value))
        .collect();

    Ok(RawFrame {
        axes,
        buttons,
        hats,
    })
}

/// Physical controller read through evdev.
pub struct EvdevGamepad {
    index: usize,
    device: Option<Device>,
    device_path: PathBuf,
    name: String,
    layout: Layout,
    last_reconnect: Option<Instant>,
}

impl EvdevGamepad {
    /// Opens the `index`-th detected controller.
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: no controller, or fewer than `index + 1`
    /// - `Controller`: `/dev/input` could not be read
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use camstick::controller::evdev_source::EvdevGamepad;
    ///
    /// let pad = EvdevGamepad::open(0)?;
    /// println!("Using {} at {}", pad.name(), pad.device_path().display());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(index: usize) -> Result<Self> {
        let mut found = scan()?;
        if found.is_empty() {
            return Err(CamStickError::ControllerNotFound(
                "no input device exposes gamepad buttons and an analog stick".to_string(),
            ));
        }
        if index >= found.len() {
            return Err(CamStickError::ControllerNotFound(format!(
                "joystick_index {} requested but only {} controller(s) detected",
                index,
                found.len()
            )));
        }

        let (device_path, device) = found.swap_remove(index);
        let name = device.name().unwrap_or("unnamed").to_string();
        let layout = Layout::of(&device);

        let pad = Self {
            index,
            device: Some(device),
            device_path,
            name,
            layout,
            last_reconnect: None,
        };
        info!("Using controller {}", pad.describe());
        Ok(pad)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn device_path(&self) -> &Path {
        &self.device_path
    }

    /// Name, path and layout summary of the open controller.
    #[must_use]
    pub fn describe(&self) -> DeviceInfo {
        DeviceInfo {
            index: self.index,
            path: self.device_path.clone(),
            name: self.name.clone(),
            axes: self.layout.axis_count(),
            buttons: self.layout.button_count(),
            hats: self.layout.hat_count(),
        }
    }

    fn try_reconnect(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_reconnect {
            if now.duration_since(last) < RECONNECT_INTERVAL {
                return;
            }
        }
        self.last_reconnect = Some(now);

        let found = match scan() {
            Ok(found) => found,
            Err(e) => {
                debug!("Reconnect scan failed: {}", e);
                return;
            }
        };
        if let Some((path, device)) = found
            .into_iter()
            .find(|(_, device)| device.name() == Some(self.name.as_str()))
        {
            self.layout = Layout::of(&device);
            info!("Reopened controller '{}' at {}", self.name, path.display());
            self.device_path = path;
            self.device = Some(device);
        }
    }
}

impl FrameSource for EvdevGamepad {
    fn poll(&mut self) -> Result<RawFrame> {
        if self.device.is_none() {
            self.try_reconnect();
        }
        let Some(device) = self.device.as_ref() else {
            return Err(CamStickError::NoControllerConnected);
        };

        match read_frame(device, &self.layout) {
            Ok(frame) => Ok(frame),
            Err(e) => {
                warn!("Lost controller '{}': {}", self.name, e);
                self.device = None;
                self.last_reconnect = Some(Instant::now());
                Err(CamStickError::NoControllerConnected)
            }
        }
    }

    fn hat_count(&self) -> usize {
        self.layout.hat_count()
    }
}
