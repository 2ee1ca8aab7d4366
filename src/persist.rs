//! # Settings Document Sync
//!
//! Keeps the on-disk settings document and [`SharedConfig`] in step:
//!
//! - External edits to the file are parsed field by field and published to
//!   the pipeline.
//! - In-process changes (a finished calibration, signal-driven edits) are
//!   written back.
//!
//! The file is polled every [`SYNC_PERIOD`]. Text written by this process is
//! recognised and never re-applied. An edit only overrides the parts of the
//! document it actually changed, so a calibration finished since the last
//! write-back survives an unrelated edit to the settings.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{ConfigStore, RuntimeSettings, SettingsDocument};
use crate::controller::profile::CalibrationProfile;
use crate::error::Result;
use crate::shared::SharedConfig;

/// How often the document is checked.
pub const SYNC_PERIOD: Duration = Duration::from_millis(500);

/// What one sync pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// An external edit was published.
    pub applied: bool,
    /// The document was rewritten.
    pub saved: bool,
}

/// Two-way sync between a [`ConfigStore`] and a [`SharedConfig`].
pub struct DocumentSync {
    store: ConfigStore,
    shared: SharedConfig,
    settings_rx: watch::Receiver<RuntimeSettings>,
    profile_rx: watch::Receiver<CalibrationProfile>,
    joystick_index: usize,
    legacy_axes: [i64; 4],
    on_disk: SettingsDocument,
}

impl DocumentSync {
    /// Creates the sync for a store that `document` was just loaded from.
    #[must_use]
    pub fn new(store: ConfigStore, shared: SharedConfig, document: &SettingsDocument) -> Self {
        let mut settings_rx = shared.subscribe_settings();
        let mut profile_rx = shared.subscribe_profile();
        settings_rx.borrow_and_update();
        profile_rx.borrow_and_update();
        Self {
            store,
            shared,
            settings_rx,
            profile_rx,
            joystick_index: document.joystick_index,
            legacy_axes: document.legacy_axes,
            on_disk: document.clone(),
        }
    }

    /// The document as it should currently be on disk.
    #[must_use]
    pub fn document(&self) -> SettingsDocument {
        SettingsDocument {
            settings: self.shared.snapshot(),
            joystick_index: self.joystick_index,
            legacy_axes: self.legacy_axes,
            profile: self.shared.profile(),
        }
    }

    fn mark_seen(&mut self) {
        self.settings_rx.borrow_and_update();
        self.profile_rx.borrow_and_update();
    }

    /// Publishes the parts of `doc` that differ from the last known file.
    fn apply_edit(&mut self, doc: SettingsDocument) -> bool {
        if doc.joystick_index != self.joystick_index {
            warn!(
                "joystick_index changed to {}; takes effect after restart",
                doc.joystick_index
            );
            self.joystick_index = doc.joystick_index;
        }
        self.legacy_axes = doc.legacy_axes;

        let mut changed = false;
        if doc.settings != self.on_disk.settings {
            changed |= self.shared.replace_settings(doc.settings.clone());
            self.settings_rx.borrow_and_update();
        }
        if doc.profile != self.on_disk.profile {
            changed |= self.shared.set_profile(doc.profile.clone());
            self.profile_rx.borrow_and_update();
        }
        self.on_disk = doc;
        changed
    }

    /// Runs one pass: apply external edits, then write back local changes.
    ///
    /// # Errors
    ///
    /// Returns I/O or codec errors from reading or writing the document.
    pub fn sync_once(&mut self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        if let Some(loaded) = self.store.reload_if_changed()? {
            if loaded.issues.iter().any(|issue| issue.field == "<document>") {
                for issue in &loaded.issues {
                    warn!("Ignoring edit to {}: {}", self.store.path().display(), issue);
                }
            } else {
                for issue in &loaded.issues {
                    warn!("Setting {}", issue);
                }
                if self.apply_edit(loaded.document) {
                    info!("Applied edits from {}", self.store.path().display());
                }
                report.applied = true;
            }
        }

        let local_change = self.settings_rx.has_changed().unwrap_or(false)
            || self.profile_rx.has_changed().unwrap_or(false);
        if local_change {
            self.mark_seen();
            let document = self.document();
            report.saved = self.store.save(&document)?;
            self.on_disk = document;
            if report.saved {
                debug!("Wrote {}", self.store.path().display());
            }
        }

        Ok(report)
    }

    /// Syncs every `period` until `shutdown` resolves, then flushes once more.
    pub async fn run<F>(mut self, period: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sync_once() {
                        warn!("Settings sync failed: {}", e);
                    }
                }
                _ = &mut shutdown => break,
            }
        }

        if let Err(e) = self.sync_once() {
            warn!("Final settings sync failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::profile::fixtures::xbox_like_profile;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    fn setup(dir: &TempDir) -> (DocumentSync, SharedConfig, std::path::PathBuf) {
        let path = dir.path().join("config.json");
        let mut store = ConfigStore::new(&path);
        let loaded = store.load_or_create().unwrap();
        let shared = SharedConfig::new(
            loaded.document.settings.clone(),
            loaded.document.profile.clone(),
        );
        let sync = DocumentSync::new(store, shared.clone(), &loaded.document);
        (sync, shared, path)
    }

    fn read_json(path: &std::path::Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    // ==================== Write-back Tests ====================

    #[test]
    fn test_nothing_to_do_on_fresh_document() {
        let dir = TempDir::new().unwrap();
        let (mut sync, _, _) = setup(&dir);
        assert_eq!(sync.sync_once().unwrap(), SyncReport::default());
    }

    #[test]
    fn test_finished_calibration_is_saved() {
        let dir = TempDir::new().unwrap();
        let (mut sync, shared, path) = setup(&dir);

        shared.set_profile(xbox_like_profile());
        let report = sync.sync_once().unwrap();
        assert!(report.saved);
        assert!(!report.applied);

        let json = read_json(&path);
        assert_eq!(json["calibrated"], Value::Bool(true));
        assert_eq!(json["left_y_axis"], Value::from(1));
        assert_eq!(json["calibration"]["dpad_mode"], Value::from("hat"));

        // Our own write is not picked up as an external edit
        assert_eq!(sync.sync_once().unwrap(), SyncReport::default());
    }

    #[test]
    fn test_settings_change_is_saved() {
        let dir = TempDir::new().unwrap();
        let (mut sync, shared, path) = setup(&dir);

        shared.update(|s| s.rotation_speed_deg_per_sec = 45.0);
        assert!(sync.sync_once().unwrap().saved);
        assert_eq!(read_json(&path)["rotation_speed_deg_per_sec"], Value::from(45.0));
    }

    // ==================== External Edit Tests ====================

    #[test]
    fn test_external_edit_is_applied() {
        let dir = TempDir::new().unwrap();
        let (mut sync, shared, path) = setup(&dir);

        let mut json = read_json(&path);
        json["mouse_speed_px_per_sec"] = Value::from(600.0);
        json["deadzone_left"] = Value::from(1.5);
        fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();

        let report = sync.sync_once().unwrap();
        assert!(report.applied);
        assert!(!report.saved);
        let settings = shared.snapshot();
        assert_eq!(settings.mouse_speed_px_per_sec, 600.0);
        assert_eq!(settings.deadzone_left, RuntimeSettings::default().deadzone_left);
    }

    #[test]
    fn test_broken_edit_is_ignored() {
        let dir = TempDir::new().unwrap();
        let (mut sync, shared, path) = setup(&dir);
        shared.update(|s| s.poll_hz = 120.0);
        sync.sync_once().unwrap();

        fs::write(&path, "{ \"poll_hz\": ").unwrap();
        let report = sync.sync_once().unwrap();
        assert!(!report.applied);
        assert_eq!(shared.snapshot().poll_hz, 120.0);
    }

    #[test]
    fn test_settings_edit_keeps_pending_calibration() {
        let dir = TempDir::new().unwrap();
        let (mut sync, shared, path) = setup(&dir);

        // Calibration finishes, then the file is edited before the write-back
        shared.set_profile(xbox_like_profile());
        let mut json = read_json(&path);
        json["rotation_speed_deg_per_sec"] = Value::from(45.0);
        fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();

        let report = assert_ok!(sync.sync_once());
        assert!(report.applied);
        assert!(report.saved);
        assert!(shared.profile().calibrated);
        assert_eq!(shared.snapshot().rotation_speed_deg_per_sec, 45.0);

        let json = read_json(&path);
        assert_eq!(json["calibrated"], Value::Bool(true));
        assert_eq!(json["rotation_speed_deg_per_sec"], Value::from(45.0));
    }

    #[test]
    fn test_edited_calibration_replaces_profile() {
        let dir = TempDir::new().unwrap();
        let (mut sync, shared, path) = setup(&dir);
        shared.set_profile(xbox_like_profile());
        assert_ok!(sync.sync_once());

        let mut json = read_json(&path);
        json["calibrated"] = Value::Bool(false);
        fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();

        let report = assert_ok!(sync.sync_once());
        assert!(report.applied);
        assert!(!report.saved);
        assert!(!shared.profile().calibrated);
    }

    // ==================== Task Tests ====================

    #[tokio::test]
    async fn test_run_flushes_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let (sync, shared, path) = setup(&dir);
        shared.update(|s| s.invert_rotation = false);

        sync.run(
            Duration::from_millis(5),
            tokio::time::sleep(Duration::from_millis(20)),
        )
        .await;

        assert_eq!(read_json(&path)["invert_rotation"], Value::Bool(false));
    }
}
