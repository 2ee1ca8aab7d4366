//! # Configuration Module
//!
//! Runtime settings and the persisted settings/calibration document.
//!
//! The document is JSON by default; a `.toml` extension switches the codec
//! to TOML. Loading is tolerant: every field that fails to parse or fails its
//! range check falls back to its default and is reported as a
//! [`ConfigIssue`], while the rest of the document is honored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::controller::profile::{CalibrationProfile, LogicalButton};
use crate::error::{CamStickError, Result};

/// Upper bound accepted for `poll_hz`.
pub const MAX_POLL_HZ: f64 = 1000.0;

/// Default settings document path.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// When the pointer follows the right stick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerActivation {
    /// Deltas are emitted on every tick.
    #[default]
    Always,
    /// Deltas are emitted only while the hold key is held.
    Hold,
}

/// Tunables consumed by the pipeline.
///
/// The field names are the keys of the persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    #[serde(default = "default_rotation_speed")]
    pub rotation_speed_deg_per_sec: f64,

    #[serde(default = "default_invert_rotation")]
    pub invert_rotation: bool,

    #[serde(default = "default_deadzone_left")]
    pub deadzone_left: f64,

    #[serde(default = "default_deadzone_right")]
    pub deadzone_right: f64,

    #[serde(default = "default_wrap_yaw")]
    pub wrap_yaw: bool,

    #[serde(default)]
    pub invert_left_y: bool,

    #[serde(default)]
    pub invert_right_y: bool,

    #[serde(default)]
    pub output_smoothing: f64,

    #[serde(default = "default_poll_hz")]
    pub poll_hz: f64,

    #[serde(default = "default_mouse_enabled")]
    pub mouse_enabled: bool,

    #[serde(default = "default_mouse_speed")]
    pub mouse_speed_px_per_sec: f64,

    #[serde(default = "default_mouse_deadzone")]
    pub mouse_deadzone: f64,

    #[serde(default = "default_mouse_accel")]
    pub mouse_accel: f64,

    #[serde(default)]
    pub mouse_invert_y: bool,

    #[serde(default)]
    pub mouse_activation_mode: PointerActivation,

    #[serde(default = "default_mouse_hold_key")]
    pub mouse_hold_key: LogicalButton,
}

// Default value functions
fn default_rotation_speed() -> f64 { 180.0 }
fn default_invert_rotation() -> bool { true }
fn default_deadzone_left() -> f64 { 0.12 }
fn default_deadzone_right() -> f64 { 0.10 }
fn default_wrap_yaw() -> bool { true }
fn default_poll_hz() -> f64 { 240.0 }

fn default_mouse_enabled() -> bool { true }
fn default_mouse_speed() -> f64 { 1200.0 }
fn default_mouse_deadzone() -> f64 { 0.18 }
fn default_mouse_accel() -> f64 { 1.35 }
fn default_mouse_hold_key() -> LogicalButton { LogicalButton::StickClickR }

fn default_legacy_axes() -> [i64; 4] { [0, 1, 2, 3] }

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            rotation_speed_deg_per_sec: default_rotation_speed(),
            invert_rotation: default_invert_rotation(),
            deadzone_left: default_deadzone_left(),
            deadzone_right: default_deadzone_right(),
            wrap_yaw: default_wrap_yaw(),
            invert_left_y: false,
            invert_right_y: false,
            output_smoothing: 0.0,
            poll_hz: default_poll_hz(),
            mouse_enabled: default_mouse_enabled(),
            mouse_speed_px_per_sec: default_mouse_speed(),
            mouse_deadzone: default_mouse_deadzone(),
            mouse_accel: default_mouse_accel(),
            mouse_invert_y: false,
            mouse_activation_mode: PointerActivation::Always,
            mouse_hold_key: default_mouse_hold_key(),
        }
    }
}

/// One field that was replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: String,
    pub reason: String,
}

impl ConfigIssue {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

fn unit_interval(v: f64) -> bool {
    v.is_finite() && (0.0..1.0).contains(&v)
}

fn non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

impl RuntimeSettings {
    /// Resets every out-of-range field to its default.
    ///
    /// # Returns
    ///
    /// One issue per field that was reset.
    pub fn sanitize(&mut self) -> Vec<ConfigIssue> {
        let defaults = RuntimeSettings::default();
        let mut issues = Vec::new();

        let checks: [(&str, &mut f64, f64, fn(f64) -> bool, &str); 8] = [
            (
                "rotation_speed_deg_per_sec",
                &mut self.rotation_speed_deg_per_sec,
                defaults.rotation_speed_deg_per_sec,
                non_negative,
                "must be a finite number >= 0",
            ),
            (
                "deadzone_left",
                &mut self.deadzone_left,
                defaults.deadzone_left,
                unit_interval,
                "must be in [0, 1)",
            ),
            (
                "deadzone_right",
                &mut self.deadzone_right,
                defaults.deadzone_right,
                unit_interval,
                "must be in [0, 1)",
            ),
            (
                "output_smoothing",
                &mut self.output_smoothing,
                defaults.output_smoothing,
                unit_interval,
                "must be in [0, 1)",
            ),
            (
                "poll_hz",
                &mut self.poll_hz,
                defaults.poll_hz,
                |v| v.is_finite() && v > 0.0 && v <= MAX_POLL_HZ,
                "must be in (0, 1000]",
            ),
            (
                "mouse_speed_px_per_sec",
                &mut self.mouse_speed_px_per_sec,
                defaults.mouse_speed_px_per_sec,
                non_negative,
                "must be a finite number >= 0",
            ),
            (
                "mouse_deadzone",
                &mut self.mouse_deadzone,
                defaults.mouse_deadzone,
                unit_interval,
                "must be in [0, 1)",
            ),
            (
                "mouse_accel",
                &mut self.mouse_accel,
                defaults.mouse_accel,
                |v| v.is_finite() && v > 0.0,
                "must be a finite number > 0",
            ),
        ];

        for (field, value, default, valid, rule) in checks {
            if !valid(*value) {
                issues.push(ConfigIssue::new(
                    field,
                    format!("{} (got {}), using default {}", rule, value, default),
                ));
                *value = default;
            }
        }
        issues
    }

    /// Validates all fields without modifying them.
    ///
    /// # Errors
    ///
    /// Returns `Config` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let mut copy = self.clone();
        match copy.sanitize().into_iter().next() {
            Some(issue) => Err(CamStickError::Config(issue.to_string())),
            None => Ok(()),
        }
    }
}

/// The full persisted document.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDocument {
    pub settings: RuntimeSettings,
    pub joystick_index: usize,
    /// `left_x_axis`, `left_y_axis`, `right_x_axis`, `right_y_axis`.
    pub legacy_axes: [i64; 4],
    pub profile: CalibrationProfile,
}

impl Default for SettingsDocument {
    fn default() -> Self {
        Self {
            settings: RuntimeSettings::default(),
            joystick_index: 0,
            legacy_axes: default_legacy_axes(),
            profile: CalibrationProfile::default(),
        }
    }
}

const LEGACY_AXIS_KEYS: [&str; 4] = ["left_x_axis", "left_y_axis", "right_x_axis", "right_y_axis"];

impl SettingsDocument {
    /// Converts the document to its generic value tree.
    ///
    /// The legacy axis fields mirror the profile's stick bindings when the
    /// profile has them.
    ///
    /// # Errors
    ///
    /// Returns `Json` if a section cannot be represented.
    pub fn to_value(&self) -> Result<Value> {
        let mut map = match serde_json::to_value(&self.settings)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        map.insert("joystick_index".into(), Value::from(self.joystick_index));

        let mirrored = self.profile.stick_axis_indices();
        for (i, key) in LEGACY_AXIS_KEYS.iter().enumerate() {
            let index = if mirrored[i] >= 0 {
                mirrored[i]
            } else {
                self.legacy_axes[i]
            };
            map.insert((*key).into(), Value::from(index));
        }

        map.insert("calibrated".into(), Value::Bool(self.profile.calibrated));
        map.insert("calibration".into(), serde_json::to_value(&self.profile)?);
        Ok(Value::Object(map))
    }

    /// Reads a document from a generic value tree, field by field.
    ///
    /// Never fails: anything unusable is replaced by its default and reported.
    #[must_use]
    pub fn from_value(value: &Value) -> (Self, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut doc = SettingsDocument::default();

        let Some(map) = value.as_object() else {
            issues.push(ConfigIssue::new("<document>", "not an object, using defaults"));
            return (doc, issues);
        };

        doc.settings = read_settings(map, &mut issues);
        issues.extend(doc.settings.sanitize());

        if let Some(raw) = map.get("joystick_index") {
            match serde_json::from_value::<usize>(raw.clone()) {
                Ok(index) => doc.joystick_index = index,
                Err(_) => issues.push(ConfigIssue::new(
                    "joystick_index",
                    "must be an integer >= 0, using default 0",
                )),
            }
        }

        for (i, key) in LEGACY_AXIS_KEYS.iter().enumerate() {
            if let Some(raw) = map.get(*key) {
                match raw.as_i64() {
                    Some(index) => doc.legacy_axes[i] = index,
                    None => issues.push(ConfigIssue::new(*key, "must be an integer")),
                }
            }
        }

        let calibrated = match map.get("calibrated") {
            None => false,
            Some(Value::Bool(flag)) => *flag,
            Some(_) => {
                issues.push(ConfigIssue::new("calibrated", "must be a boolean, using false"));
                false
            }
        };

        if let Some(raw) = map.get("calibration") {
            match serde_json::from_value::<CalibrationProfile>(raw.clone()) {
                Ok(profile) => doc.profile = profile,
                Err(e) => issues.push(ConfigIssue::new(
                    "calibration",
                    format!("unreadable ({}), recalibration required", e),
                )),
            }
        }

        if calibrated {
            if let Err(e) = doc.profile.finalize() {
                issues.push(ConfigIssue::new(
                    "calibration",
                    format!("incomplete ({}), recalibration required", e),
                ));
            }
        }

        (doc, issues)
    }
}

/// Reads [`RuntimeSettings`] one field at a time on top of the defaults.
fn read_settings(map: &Map<String, Value>, issues: &mut Vec<ConfigIssue>) -> RuntimeSettings {
    let defaults = RuntimeSettings::default();
    let mut accepted = match serde_json::to_value(&defaults) {
        Ok(Value::Object(fields)) => fields,
        _ => return defaults,
    };

    let keys: Vec<String> = accepted.keys().cloned().collect();
    for key in keys {
        let Some(candidate) = map.get(&key) else {
            continue;
        };
        let mut trial = accepted.clone();
        trial.insert(key.clone(), candidate.clone());
        match serde_json::from_value::<RuntimeSettings>(Value::Object(trial.clone())) {
            Ok(_) => accepted = trial,
            Err(e) => issues.push(ConfigIssue::new(
                key,
                format!("invalid value {} ({}), using default", candidate, e),
            )),
        }
    }

    serde_json::from_value(Value::Object(accepted)).unwrap_or(defaults)
}

/// Document codec, selected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Toml,
}

impl DocumentFormat {
    /// `.toml` selects TOML, anything else JSON.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => DocumentFormat::Toml,
            _ => DocumentFormat::Json,
        }
    }

    /// Renders a document as text.
    ///
    /// # Errors
    ///
    /// Returns the codec error if the document cannot be encoded.
    pub fn render(self, doc: &SettingsDocument) -> Result<String> {
        let value = doc.to_value()?;
        let mut text = match self {
            DocumentFormat::Json => serde_json::to_string_pretty(&value)?,
            DocumentFormat::Toml => toml::to_string_pretty(&value)?,
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }

    /// Parses document text.
    ///
    /// Syntax errors yield the default document plus an issue.
    #[must_use]
    pub fn parse(self, text: &str) -> LoadedDocument {
        let parsed: std::result::Result<Value, String> = match self {
            DocumentFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            DocumentFormat::Toml => toml::from_str::<toml::Value>(text)
                .map_err(|e| e.to_string())
                .and_then(|v| serde_json::to_value(v).map_err(|e| e.to_string())),
        };
        match parsed {
            Ok(value) => {
                let (document, issues) = SettingsDocument::from_value(&value);
                LoadedDocument { document, issues }
            }
            Err(reason) => LoadedDocument {
                document: SettingsDocument::default(),
                issues: vec![ConfigIssue::new(
                    "<document>",
                    format!("parse error ({}), using defaults", reason),
                )],
            },
        }
    }
}

/// Result of reading a document.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: SettingsDocument,
    pub issues: Vec<ConfigIssue>,
}

/// File-backed document with change detection.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    format: DocumentFormat,
    last_text: Option<String>,
}

impl ConfigStore {
    /// Creates a store for `path`; nothing is read yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = DocumentFormat::from_path(&path);
        Self {
            path,
            format,
            last_text: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Loads the document, writing defaults first if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file exists but cannot be read, or if the default
    /// document cannot be written.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use camstick::config::ConfigStore;
    ///
    /// let mut store = ConfigStore::new("config.json");
    /// let loaded = store.load_or_create()?;
    /// println!("poll rate: {} Hz", loaded.document.settings.poll_hz);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_or_create(&mut self) -> Result<LoadedDocument> {
        match fs::read_to_string(&self.path) {
            Ok(text) => {
                let loaded = self.format.parse(&text);
                self.last_text = Some(text);
                Ok(loaded)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let document = SettingsDocument::default();
                self.save(&document)?;
                Ok(LoadedDocument {
                    document,
                    issues: Vec::new(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the document if its rendering differs from the last text seen.
    ///
    /// # Returns
    ///
    /// `true` if the file was written.
    ///
    /// # Errors
    ///
    /// Returns codec or I/O errors.
    pub fn save(&mut self, doc: &SettingsDocument) -> Result<bool> {
        let text = self.format.render(doc)?;
        if self.last_text.as_deref() == Some(text.as_str()) {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, &text)?;
        fs::rename(&tmp, &self.path)?;
        self.last_text = Some(text);
        Ok(true)
    }

    /// Re-reads the file and returns the parsed document if its text changed
    /// since the last load or save.
    ///
    /// A missing file is not an error (`Ok(None)`).
    ///
    /// # Errors
    ///
    /// Returns `Io` for read failures other than not-found.
    pub fn reload_if_changed(&mut self) -> Result<Option<LoadedDocument>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if self.last_text.as_deref() == Some(text.as_str()) {
            return Ok(None);
        }
        let loaded = self.format.parse(&text);
        self.last_text = Some(text);
        Ok(Some(loaded))
    }
}
