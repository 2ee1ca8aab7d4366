//! # Shared State
//!
//! Settings and calibration profile shared between the pipeline and the
//! settings editor (the document sync task, signal handlers, tests).
//!
//! Both values live in `tokio::sync::watch` channels: writers swap in a
//! complete new value, the pipeline clones one consistent snapshot at the
//! start of every tick. Mode-switch requests are plain atomic flags consumed
//! at tick boundaries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

use crate::config::{ConfigIssue, RuntimeSettings};
use crate::controller::profile::CalibrationProfile;

#[derive(Debug)]
struct Inner {
    settings: watch::Sender<RuntimeSettings>,
    profile: watch::Sender<CalibrationProfile>,
    recalibrate: AtomicBool,
    reset_yaw: AtomicBool,
}

/// Cloneable handle to the shared settings and profile.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<Inner>,
}

impl SharedConfig {
    /// Creates the shared state.
    #[must_use]
    pub fn new(settings: RuntimeSettings, profile: CalibrationProfile) -> Self {
        let (settings, _) = watch::channel(settings);
        let (profile, _) = watch::channel(profile);
        Self {
            inner: Arc::new(Inner {
                settings,
                profile,
                recalibrate: AtomicBool::new(false),
                reset_yaw: AtomicBool::new(false),
            }),
        }
    }

    /// One consistent copy of the current settings.
    #[must_use]
    pub fn snapshot(&self) -> RuntimeSettings {
        self.inner.settings.borrow().clone()
    }

    /// Edits the settings in place.
    ///
    /// Out-of-range values produced by `edit` are reset to their defaults
    /// before the new snapshot is published; subscribers are only notified if
    /// something actually changed.
    ///
    /// # Returns
    ///
    /// Issues for every field that had to be reset.
    pub fn update<F>(&self, edit: F) -> Vec<ConfigIssue>
    where
        F: FnOnce(&mut RuntimeSettings),
    {
        let mut issues = Vec::new();
        self.inner.settings.send_if_modified(|settings| {
            let before = settings.clone();
            edit(settings);
            issues = settings.sanitize();
            *settings != before
        });
        for issue in &issues {
            warn!("Rejected setting {}", issue);
        }
        issues
    }

    /// Replaces the settings wholesale.
    ///
    /// # Returns
    ///
    /// `true` if the new value differs from the old one.
    pub fn replace_settings(&self, mut settings: RuntimeSettings) -> bool {
        settings.sanitize();
        self.inner.settings.send_if_modified(|current| {
            if *current == settings {
                false
            } else {
                *current = settings;
                true
            }
        })
    }

    /// Restores default settings; the calibration profile is kept.
    pub fn reset_settings(&self) {
        self.replace_settings(RuntimeSettings::default());
    }

    /// Copy of the current calibration profile.
    #[must_use]
    pub fn profile(&self) -> CalibrationProfile {
        self.inner.profile.borrow().clone()
    }

    /// Publishes a new calibration profile.
    ///
    /// # Returns
    ///
    /// `true` if it differs from the current one.
    pub fn set_profile(&self, profile: CalibrationProfile) -> bool {
        self.inner.profile.send_if_modified(|current| {
            if *current == profile {
                false
            } else {
                *current = profile;
                true
            }
        })
    }

    #[must_use]
    pub fn subscribe_settings(&self) -> watch::Receiver<RuntimeSettings> {
        self.inner.settings.subscribe()
    }

    #[must_use]
    pub fn subscribe_profile(&self) -> watch::Receiver<CalibrationProfile> {
        self.inner.profile.subscribe()
    }

    /// Asks the runtime to enter the calibration wizard at the next tick.
    pub fn request_recalibration(&self) {
        self.inner.recalibrate.store(true, Ordering::SeqCst);
    }

    /// Consumes a pending recalibration request.
    #[must_use]
    pub fn take_recalibration_request(&self) -> bool {
        self.inner.recalibrate.swap(false, Ordering::SeqCst)
    }

    /// Asks the runtime to zero the yaw offset at the next tick.
    pub fn request_yaw_reset(&self) {
        self.inner.reset_yaw.store(true, Ordering::SeqCst);
    }

    /// Consumes a pending yaw reset request.
    #[must_use]
    pub fn take_yaw_reset_request(&self) -> bool {
        self.inner.reset_yaw.swap(false, Ordering::SeqCst)
    }
}
