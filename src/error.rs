//! # Error Types
//!
//! Custom error types for camstick using `thiserror`.
//!
//! The variants follow the runtime fault taxonomy:
//!
//! - **Startup fatal**: [`CamStickError::ControllerNotFound`], [`CamStickError::DriverMissing`]
//! - **Transient input**: [`CamStickError::NoControllerConnected`]
//! - **Transient sink**: [`CamStickError::SinkUnavailable`]
//! - **Calibration**: [`CamStickError::CalibrationAmbiguous`]
//! - **Configuration**: [`CamStickError::Config`] and the codec errors

use thiserror::Error;

/// Main error type for camstick
#[derive(Debug, Error)]
pub enum CamStickError {
    /// No physical controller could be found at launch
    #[error("No game controller found: {0}")]
    ControllerNotFound(String),

    /// The physical controller went away mid-session
    #[error("No controller connected")]
    NoControllerConnected,

    /// Other controller I/O failures
    #[error("Controller error: {0}")]
    Controller(String),

    /// The virtual-controller or injection device cannot be created at all
    #[error("Virtual device driver unavailable: {0}")]
    DriverMissing(String),

    /// The virtual-controller sink rejected a frame
    #[error("Virtual controller sink unavailable: {0}")]
    SinkUnavailable(String),

    /// The calibration wizard could not isolate a single control
    #[error("Calibration ambiguous: {0}")]
    CalibrationAmbiguous(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON settings document errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML settings document parse errors
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML settings document write errors
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CamStickError {
    /// Returns true for conditions that must stop the process at launch.
    #[must_use]
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            CamStickError::ControllerNotFound(_) | CamStickError::DriverMissing(_)
        )
    }

    /// Actionable guidance printed next to fatal errors.
    #[must_use]
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            CamStickError::ControllerNotFound(_) => Some(
                "Connect the controller (USB or Bluetooth), check that it shows up under \
                 /dev/input/event*, make sure your user can read it (e.g. member of the \
                 'input' group), then rerun. Use --list to see detected controllers and \
                 pick one with joystick_index.",
            ),
            CamStickError::DriverMissing(_) => Some(
                "The uinput driver is required to create the virtual controller. Load it \
                 with 'sudo modprobe uinput' and grant write access to /dev/uinput \
                 (e.g. a udev rule with GROUP=\"input\", MODE=\"0660\"), then rerun.",
            ),
            CamStickError::Config(_) => Some(
                "Fix or delete the settings document; missing fields fall back to defaults.",
            ),
            _ => None,
        }
    }

    /// Process exit code used by the binary for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            CamStickError::ControllerNotFound(_) => 2,
            CamStickError::DriverMissing(_) => 3,
            _ => 1,
        }
    }
}

/// Result type alias for camstick
pub type Result<T> = std::result::Result<T, CamStickError>;
