//! # Pipeline
//!
//! One steady-state tick:
//!
//! ```text
//! InputSampler → YawIntegrator → StickRotator → PointerMapper + MacroDispatcher → OutputDispatcher
//! ```
//!
//! [`Runtime`] owns the pipeline, the calibration wizard and the sinks, and
//! switches between the two modes at tick boundaries. Each tick takes one
//! settings snapshot and uses it throughout.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::combo::MacroDispatcher;
use crate::config::{RuntimeSettings, MAX_POLL_HZ};
use crate::controller::profile::CalibrationProfile;
use crate::controller::raw::FrameSource;
use crate::controller::sampler::{FrameSample, InputSampler};
use crate::controller::wizard::{CalibrationWizard, WizardEvent};
use crate::error::{CamStickError, Result};
use crate::output::{GamepadReport, GamepadSink, KeyInjector, OutputDispatcher, OutputFrame};
use crate::shared::SharedConfig;
use crate::transform::pointer::PointerMapper;
use crate::transform::rotator::StickRotator;
use crate::transform::shaping::shape;
use crate::transform::yaw::YawIntegrator;

/// Number of ticks between status log messages
pub const LOG_INTERVAL_TICKS: u64 = 1000;

/// Slowest pace the loop will run at.
pub const MIN_POLL_HZ: f64 = 30.0;

/// Loop rate actually used for `settings`.
#[must_use]
pub fn effective_poll_hz(settings: &RuntimeSettings) -> f64 {
    if settings.poll_hz.is_finite() {
        settings.poll_hz.clamp(MIN_POLL_HZ, MAX_POLL_HZ)
    } else {
        MIN_POLL_HZ
    }
}

fn tick_interval(hz: f64) -> Interval {
    let mut ticker = interval(Duration::from_secs_f64(1.0 / hz));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Steady-state transform chain.
#[derive(Debug, Default)]
pub struct Pipeline {
    sampler: InputSampler,
    yaw: YawIntegrator,
    rotator: StickRotator,
    pointer: PointerMapper,
    macros: MacroDispatcher,
}

impl Pipeline {
    #[must_use]
    pub fn new(macros: MacroDispatcher) -> Self {
        Self {
            macros,
            ..Self::default()
        }
    }

    /// Current yaw offset in radians.
    #[must_use]
    pub fn yaw(&self) -> f32 {
        self.yaw.offset()
    }

    /// Manual resync.
    pub fn reset_yaw(&mut self) {
        self.yaw.reset();
    }

    /// Drops smoothing history, pointer remainder and chord latches.
    ///
    /// The yaw offset is kept so the camera alignment survives a controller
    /// hiccup.
    pub fn hold_neutral(&mut self) {
        self.rotator.reset();
        self.pointer.reset();
        self.macros.release_all();
    }

    /// Polls `source` once and runs the transform chain.
    ///
    /// # Errors
    ///
    /// Returns `NoControllerConnected` (after resetting transient state) while
    /// the controller is absent; the caller emits neutral output.
    pub fn tick<S>(
        &mut self,
        source: &mut S,
        profile: &CalibrationProfile,
        settings: &RuntimeSettings,
        timestamp: Duration,
        dt: f32,
    ) -> Result<OutputFrame>
    where
        S: FrameSource + ?Sized,
    {
        match self.sampler.sample(source, profile, settings, timestamp, dt) {
            Ok(sample) => Ok(self.process(&sample, settings)),
            Err(e) => {
                self.hold_neutral();
                Err(e)
            }
        }
    }

    /// Transforms one sample into an output frame.
    pub fn process(&mut self, sample: &FrameSample, settings: &RuntimeSettings) -> OutputFrame {
        let right = shape(sample.right, settings.deadzone_right as f32);
        let yaw = self.yaw.advance(right.x, settings, sample.dt);
        let left = self.rotator.process(sample.left, yaw, settings);
        let pointer = self.pointer.map(sample, settings, sample.dt);
        let keys = self.macros.evaluate(sample);

        OutputFrame {
            gamepad: GamepadReport {
                left_stick: left,
                right_stick: right,
                left_trigger: sample.trigger_left,
                right_trigger: sample.trigger_right,
                buttons: sample.buttons,
            },
            pointer,
            keys,
        }
    }
}

/// What the runtime does each tick.
pub enum Mode {
    /// The wizard owns the raw frames; output is held neutral.
    Calibrating(CalibrationWizard),
    /// The steady-state pipeline runs.
    Running,
}

/// Fixed-rate driver for the pipeline and the calibration wizard.
pub struct Runtime<S, G, K> {
    source: S,
    output: OutputDispatcher<G, K>,
    shared: SharedConfig,
    profile_rx: watch::Receiver<CalibrationProfile>,
    profile: CalibrationProfile,
    pipeline: Pipeline,
    mode: Mode,
    ticks: u64,
    last_tick: Option<Duration>,
}

impl<S, G, K> Runtime<S, G, K>
where
    S: FrameSource,
    G: GamepadSink,
    K: KeyInjector,
{
    /// Creates the runtime.
    ///
    /// Starts in calibration when `force_calibration` is set or the shared
    /// profile is not calibrated.
    pub fn new(
        source: S,
        output: OutputDispatcher<G, K>,
        shared: SharedConfig,
        force_calibration: bool,
    ) -> Self {
        let mut profile_rx = shared.subscribe_profile();
        let profile = profile_rx.borrow_and_update().clone();
        let mut runtime = Self {
            source,
            output,
            shared,
            profile_rx,
            profile,
            pipeline: Pipeline::default(),
            mode: Mode::Running,
            ticks: 0,
            last_tick: None,
        };
        if force_calibration {
            info!("Recalibration requested on the command line");
            runtime.enter_calibration();
        } else if !runtime.profile.calibrated {
            info!("No calibration found");
            runtime.enter_calibration();
        }
        runtime
    }

    #[must_use]
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    #[must_use]
    pub fn is_calibrating(&self) -> bool {
        matches!(self.mode, Mode::Calibrating(_))
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Ticks run so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn enter_calibration(&mut self) {
        let wizard = CalibrationWizard::new(self.source.hat_count());
        if let Some(step) = wizard.current_step() {
            info!("Starting calibration. Release every control, then: {}", step);
        }
        self.pipeline.hold_neutral();
        self.mode = Mode::Calibrating(wizard);
    }

    fn refresh_profile(&mut self) {
        if !self.profile_rx.has_changed().unwrap_or(false) {
            return;
        }
        let profile = self.profile_rx.borrow_and_update().clone();
        if profile.calibrated {
            info!("Calibration profile updated");
            self.profile = profile;
        } else if !self.is_calibrating() {
            warn!("Calibration profile is no longer complete");
            self.profile = profile;
            self.enter_calibration();
        }
    }

    fn finish_calibration(&mut self, profile: CalibrationProfile) {
        info!("Calibration complete");
        self.shared.set_profile(profile.clone());
        // Our own write; nothing to pick up on the next tick
        self.profile_rx.borrow_and_update();
        self.profile = profile;
        self.pipeline.hold_neutral();
        self.mode = Mode::Running;
    }

    /// Runs one tick at `now` (time since start).
    ///
    /// # Errors
    ///
    /// Returns `SinkUnavailable` if the virtual controller rejected this
    /// tick's output. The runtime stays usable.
    pub fn step(&mut self, now: Duration) -> Result<()> {
        let settings = self.shared.snapshot();
        let dt = match self.last_tick {
            Some(last) => now.saturating_sub(last).as_secs_f32(),
            None => (1.0 / effective_poll_hz(&settings)) as f32,
        };
        self.last_tick = Some(now);
        self.ticks += 1;

        if self.shared.take_recalibration_request() {
            self.enter_calibration();
        }
        if self.shared.take_yaw_reset_request() {
            info!("Yaw offset reset");
            self.pipeline.reset_yaw();
        }
        self.refresh_profile();

        let mut completed = None;
        let frame = match &mut self.mode {
            Mode::Calibrating(wizard) => {
                completed = calibration_tick(wizard, &mut self.source);
                OutputFrame::neutral()
            }
            Mode::Running => {
                match self
                    .pipeline
                    .tick(&mut self.source, &self.profile, &settings, now, dt)
                {
                    Ok(frame) => frame,
                    Err(CamStickError::NoControllerConnected) => OutputFrame::neutral(),
                    Err(e) => {
                        warn!("Controller read failed: {}", e);
                        OutputFrame::neutral()
                    }
                }
            }
        };
        if let Some(profile) = completed {
            self.finish_calibration(profile);
        }

        if self.ticks % LOG_INTERVAL_TICKS == 0 {
            info!(
                "{} ticks, yaw {:.1} deg, {}",
                self.ticks,
                self.pipeline.yaw().to_degrees(),
                if self.is_calibrating() { "calibrating" } else { "running" }
            );
        }

        self.output.dispatch(&frame)
    }

    /// Ticks at the configured poll rate until `shutdown` resolves, then
    /// centers the virtual controller.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut rate = effective_poll_hz(&self.shared.snapshot());
        let mut ticker = tick_interval(rate);
        let started = Instant::now();
        info!("Starting pipeline at {}Hz", rate);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.step(started.elapsed()) {
                        debug!("Tick output dropped: {}", e);
                    }

                    let wanted = effective_poll_hz(&self.shared.snapshot());
                    if (wanted - rate).abs() > f64::EPSILON {
                        info!("Poll rate changed to {}Hz", wanted);
                        rate = wanted;
                        ticker = tick_interval(rate);
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutting down after {} ticks", self.ticks);
                    break;
                }
            }
        }

        self.output.release();
    }
}

/// Feeds one raw frame to the wizard and logs what happened.
fn calibration_tick<S: FrameSource + ?Sized>(
    wizard: &mut CalibrationWizard,
    source: &mut S,
) -> Option<CalibrationProfile> {
    let raw = match source.poll() {
        Ok(raw) => raw,
        Err(CamStickError::NoControllerConnected) => return None,
        Err(e) => {
            debug!("Calibration read failed: {}", e);
            return None;
        }
    };

    match wizard.feed(&raw) {
        WizardEvent::Pending => None,
        WizardEvent::Prompt {
            step,
            number,
            total,
        } => {
            info!("Calibration {}/{}: {}", number, total, step);
            None
        }
        WizardEvent::Captured { control, source } => {
            info!("Learned {} -> {}", control, source);
            None
        }
        WizardEvent::Retry { step, error } => {
            warn!("{}. Release everything and try again: {}", error, step);
            None
        }
        WizardEvent::Complete(profile) => Some(profile),
    }
}
