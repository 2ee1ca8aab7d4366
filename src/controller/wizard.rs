//! # Calibration Wizard
//!
//! Finite-state machine that learns a controller layout from raw frames.
//!
//! ## Steps
//!
//! One step per binding, in order: left stick X ("push right") and Y ("push
//! up"), right stick X and Y, the four face buttons, both bumpers, both
//! triggers, start and select, both stick clicks, then the four d-pad
//! directions.
//!
//! ## Transition Rule
//!
//! Every step goes through the same phases:
//!
//! ```text
//! Settling ──no buttons, hats centered──▶ Armed (baseline captured, prompt shown)
//! Armed ──single source active──▶ Holding
//! Holding ──same source for SUSTAIN_FRAMES──▶ Releasing
//! Holding ──source gone──▶ Armed
//! Releasing ──everything back at baseline──▶ commit, next step (Settling)
//! any ──several sources / source already bound──▶ Recovering ──neutral──▶ Armed
//! ```
//!
//! Activation means an axis moved more than [`ACTIVATION_THRESHOLD`] from its
//! baseline, a button went down, or a hat left center. Neutral means every
//! axis within [`RELEASE_EPSILON`] of its baseline, no button down and every
//! hat centered. Waiting for neutral before advancing keeps one physical
//! action from satisfying two steps.
//!
//! The d-pad is first looked for on a hat; if the first d-pad prompt is
//! answered with a button instead, the profile switches to `buttons` mode.

use std::collections::BTreeSet;
use std::fmt;

use crate::controller::profile::{
    AxisBinding, ButtonBinding, CalibrationProfile, DpadMode, LogicalAxis, LogicalButton,
    LogicalControl, PhysicalSource,
};
use crate::controller::raw::RawFrame;
use crate::error::CamStickError;

/// Minimum axis deflection from baseline that counts as activation.
pub const ACTIVATION_THRESHOLD: f32 = 0.5;

/// Maximum axis distance from baseline that counts as released.
pub const RELEASE_EPSILON: f32 = 0.2;

/// Consecutive frames a source must stay active.
pub const SUSTAIN_FRAMES: u32 = 3;

/// One wizard prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Stick(LogicalAxis),
    Button(LogicalButton),
    Trigger(LogicalButton),
    Dpad(LogicalButton),
}

/// Calibration order.
pub const STEPS: [WizardStep; 20] = [
    WizardStep::Stick(LogicalAxis::LeftX),
    WizardStep::Stick(LogicalAxis::LeftY),
    WizardStep::Stick(LogicalAxis::RightX),
    WizardStep::Stick(LogicalAxis::RightY),
    WizardStep::Button(LogicalButton::FaceA),
    WizardStep::Button(LogicalButton::FaceB),
    WizardStep::Button(LogicalButton::FaceX),
    WizardStep::Button(LogicalButton::FaceY),
    WizardStep::Button(LogicalButton::BumperL),
    WizardStep::Button(LogicalButton::BumperR),
    WizardStep::Trigger(LogicalButton::TriggerL),
    WizardStep::Trigger(LogicalButton::TriggerR),
    WizardStep::Button(LogicalButton::Start),
    WizardStep::Button(LogicalButton::Select),
    WizardStep::Button(LogicalButton::StickClickL),
    WizardStep::Button(LogicalButton::StickClickR),
    WizardStep::Dpad(LogicalButton::DpadUp),
    WizardStep::Dpad(LogicalButton::DpadDown),
    WizardStep::Dpad(LogicalButton::DpadLeft),
    WizardStep::Dpad(LogicalButton::DpadRight),
];

impl WizardStep {
    /// The logical control this step binds.
    #[must_use]
    pub fn control(&self) -> LogicalControl {
        match *self {
            WizardStep::Stick(axis) => LogicalControl::Axis(axis),
            WizardStep::Button(button) | WizardStep::Trigger(button) | WizardStep::Dpad(button) => {
                LogicalControl::Button(button)
            }
        }
    }

    /// Instruction shown to the user.
    #[must_use]
    pub fn prompt(&self) -> &'static str {
        match *self {
            WizardStep::Stick(LogicalAxis::LeftX) => "Push the LEFT stick fully RIGHT, then release",
            WizardStep::Stick(LogicalAxis::LeftY) => "Push the LEFT stick fully UP, then release",
            WizardStep::Stick(LogicalAxis::RightX) => "Push the RIGHT stick fully RIGHT, then release",
            WizardStep::Stick(LogicalAxis::RightY) => "Push the RIGHT stick fully UP, then release",
            WizardStep::Button(LogicalButton::FaceA) => "Press A (Xbox) / CROSS (PlayStation)",
            WizardStep::Button(LogicalButton::FaceB) => "Press B (Xbox) / CIRCLE (PlayStation)",
            WizardStep::Button(LogicalButton::FaceX) => "Press X (Xbox) / SQUARE (PlayStation)",
            WizardStep::Button(LogicalButton::FaceY) => "Press Y (Xbox) / TRIANGLE (PlayStation)",
            WizardStep::Button(LogicalButton::BumperL) => "Press the LEFT bumper (LB / L1)",
            WizardStep::Button(LogicalButton::BumperR) => "Press the RIGHT bumper (RB / R1)",
            WizardStep::Trigger(LogicalButton::TriggerL) => "Pull the LEFT trigger (LT / L2) fully",
            WizardStep::Trigger(LogicalButton::TriggerR) => "Pull the RIGHT trigger (RT / R2) fully",
            WizardStep::Button(LogicalButton::Start) => "Press START / OPTIONS",
            WizardStep::Button(LogicalButton::Select) => "Press BACK / SHARE",
            WizardStep::Button(LogicalButton::StickClickL) => "Click the LEFT stick (L3)",
            WizardStep::Button(LogicalButton::StickClickR) => "Click the RIGHT stick (R3)",
            WizardStep::Dpad(LogicalButton::DpadUp) => "Press d-pad UP",
            WizardStep::Dpad(LogicalButton::DpadDown) => "Press d-pad DOWN",
            WizardStep::Dpad(LogicalButton::DpadLeft) => "Press d-pad LEFT",
            WizardStep::Dpad(LogicalButton::DpadRight) => "Press d-pad RIGHT",
            _ => "Press the requested control",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prompt())
    }
}

/// What happened on a fed frame.
#[derive(Debug)]
pub enum WizardEvent {
    /// Nothing to report.
    Pending,
    /// A step is waiting for input.
    Prompt {
        step: WizardStep,
        number: usize,
        total: usize,
    },
    /// A binding was recorded.
    Captured {
        control: LogicalControl,
        source: PhysicalSource,
    },
    /// The step could not isolate one source and will be asked again.
    Retry {
        step: WizardStep,
        error: CamStickError,
    },
    /// All bindings recorded.
    Complete(CalibrationProfile),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidate {
    Axis(usize),
    Button(usize),
    Hat(usize, i32, i32),
}

enum Detection {
    Idle,
    One(Candidate),
    Many(String),
}

/// Everything seen between activation and release.
#[derive(Debug, Clone)]
struct Window {
    baseline: RawFrame,
    peaks: Vec<f32>,
    buttons: BTreeSet<usize>,
    hats: Vec<(usize, i32, i32)>,
}

impl Window {
    fn new(baseline: RawFrame) -> Self {
        let peaks = vec![0.0; baseline.axes.len()];
        Self {
            baseline,
            peaks,
            buttons: BTreeSet::new(),
            hats: Vec::new(),
        }
    }

    fn observe(&mut self, frame: &RawFrame) {
        for (i, value) in frame.axes.iter().enumerate() {
            let delta = value - self.baseline.axis(i).unwrap_or(0.0);
            if i >= self.peaks.len() {
                self.peaks.resize(i + 1, 0.0);
            }
            if delta.abs() > self.peaks[i].abs() {
                self.peaks[i] = delta;
            }
        }
        for (i, pressed) in frame.buttons.iter().enumerate() {
            if *pressed && !self.baseline.button(i) {
                self.buttons.insert(i);
            }
        }
        for (i, hat) in frame.hats.iter().enumerate() {
            let entry = (i, hat.0, hat.1);
            if *hat != (0, 0) && !self.hats.contains(&entry) {
                self.hats.push(entry);
            }
        }
    }

    fn active_axes(&self) -> Vec<(usize, f32)> {
        self.peaks
            .iter()
            .enumerate()
            .filter(|(_, peak)| peak.abs() > ACTIVATION_THRESHOLD)
            .map(|(i, peak)| (i, *peak))
            .collect()
    }
}

enum Phase {
    Settling,
    Armed { baseline: RawFrame },
    Holding { window: Window, candidate: Candidate, frames: u32 },
    Releasing { window: Window },
    Recovering { baseline: RawFrame },
}

enum Learned {
    Axis(AxisBinding),
    Button(ButtonBinding),
}

impl Learned {
    fn source(&self) -> PhysicalSource {
        match self {
            Learned::Axis(binding) => PhysicalSource::Axis(binding.index),
            Learned::Button(binding) => binding.source(),
        }
    }
}

fn is_neutral(frame: &RawFrame, baseline: &RawFrame) -> bool {
    !frame.any_button_pressed()
        && frame.hats_centered()
        && frame.axes.iter().enumerate().all(|(i, value)| {
            (value - baseline.axis(i).unwrap_or(0.0)).abs() <= RELEASE_EPSILON
        })
}

fn moved_axes(frame: &RawFrame, baseline: &RawFrame) -> Vec<usize> {
    frame
        .axes
        .iter()
        .enumerate()
        .filter(|(i, value)| (*value - baseline.axis(*i).unwrap_or(0.0)).abs() > ACTIVATION_THRESHOLD)
        .map(|(i, _)| i)
        .collect()
}

fn new_presses(frame: &RawFrame, baseline: &RawFrame) -> Vec<usize> {
    frame
        .buttons
        .iter()
        .enumerate()
        .filter(|(i, pressed)| **pressed && !baseline.button(*i))
        .map(|(i, _)| i)
        .collect()
}

fn single(found: Vec<usize>, what: &str, make: fn(usize) -> Candidate) -> Detection {
    match found.as_slice() {
        [] => Detection::Idle,
        [one] => Detection::One(make(*one)),
        many => Detection::Many(format!("{} {:?} moved together", what, many)),
    }
}

/// Calibration state machine.
pub struct CalibrationWizard {
    step_index: usize,
    phase: Phase,
    profile: CalibrationProfile,
    hat_count: usize,
    dpad_locked: bool,
}

impl CalibrationWizard {
    /// Creates a wizard for a device with `hat_count` hats.
    ///
    /// Devices without hats skip hat detection and learn the d-pad as
    /// buttons.
    #[must_use]
    pub fn new(hat_count: usize) -> Self {
        let has_hat = hat_count > 0;
        let mode = if has_hat { DpadMode::Hat } else { DpadMode::Buttons };
        Self {
            step_index: 0,
            phase: Phase::Settling,
            profile: CalibrationProfile::new(mode),
            hat_count,
            dpad_locked: !has_hat,
        }
    }

    /// The step waiting for input, `None` once complete.
    #[must_use]
    pub fn current_step(&self) -> Option<WizardStep> {
        STEPS.get(self.step_index).copied()
    }

    /// Number of steps already recorded.
    #[must_use]
    pub fn completed_steps(&self) -> usize {
        self.step_index
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.step_index >= STEPS.len()
    }

    /// The bindings recorded so far.
    #[must_use]
    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    /// Feeds one raw frame.
    pub fn feed(&mut self, frame: &RawFrame) -> WizardEvent {
        let Some(step) = self.current_step() else {
            return WizardEvent::Pending;
        };

        let phase = std::mem::replace(&mut self.phase, Phase::Settling);
        let (next, event) = match phase {
            Phase::Settling => {
                if frame.any_button_pressed() || !frame.hats_centered() {
                    (Phase::Settling, WizardEvent::Pending)
                } else {
                    let baseline = frame.clone();
                    (Phase::Armed { baseline }, self.prompt_event(step))
                }
            }
            Phase::Armed { baseline } => match self.detect(step, frame, &baseline) {
                Detection::Idle => (Phase::Armed { baseline }, WizardEvent::Pending),
                Detection::One(candidate) => {
                    let mut window = Window::new(baseline);
                    window.observe(frame);
                    (
                        Phase::Holding {
                            window,
                            candidate,
                            frames: 1,
                        },
                        WizardEvent::Pending,
                    )
                }
                Detection::Many(reason) => Self::reject(step, baseline, reason),
            },
            Phase::Holding {
                mut window,
                candidate,
                frames,
            } => {
                window.observe(frame);
                match self.detect(step, frame, &window.baseline) {
                    Detection::Idle => (
                        Phase::Armed {
                            baseline: window.baseline,
                        },
                        WizardEvent::Pending,
                    ),
                    Detection::Many(reason) => Self::reject(step, window.baseline, reason),
                    Detection::One(current) => {
                        let frames = if current == candidate { frames + 1 } else { 1 };
                        if frames >= SUSTAIN_FRAMES {
                            (Phase::Releasing { window }, WizardEvent::Pending)
                        } else {
                            (
                                Phase::Holding {
                                    window,
                                    candidate: current,
                                    frames,
                                },
                                WizardEvent::Pending,
                            )
                        }
                    }
                }
            }
            Phase::Releasing { mut window } => {
                if is_neutral(frame, &window.baseline) {
                    self.commit(step, window)
                } else {
                    window.observe(frame);
                    (Phase::Releasing { window }, WizardEvent::Pending)
                }
            }
            Phase::Recovering { baseline } => {
                if is_neutral(frame, &baseline) {
                    (Phase::Armed { baseline }, self.prompt_event(step))
                } else {
                    (Phase::Recovering { baseline }, WizardEvent::Pending)
                }
            }
        };
        self.phase = next;
        event
    }

    fn prompt_event(&self, step: WizardStep) -> WizardEvent {
        WizardEvent::Prompt {
            step,
            number: self.step_index + 1,
            total: STEPS.len(),
        }
    }

    fn reject(step: WizardStep, baseline: RawFrame, reason: String) -> (Phase, WizardEvent) {
        let error = CamStickError::CalibrationAmbiguous(format!("{}: {}", step.control(), reason));
        (Phase::Recovering { baseline }, WizardEvent::Retry { step, error })
    }

    fn detect(&self, step: WizardStep, frame: &RawFrame, baseline: &RawFrame) -> Detection {
        match step {
            WizardStep::Stick(_) => single(moved_axes(frame, baseline), "axes", Candidate::Axis),
            WizardStep::Button(_) => {
                single(new_presses(frame, baseline), "buttons", Candidate::Button)
            }
            WizardStep::Trigger(_) => match single(moved_axes(frame, baseline), "axes", Candidate::Axis) {
                Detection::Idle => single(new_presses(frame, baseline), "buttons", Candidate::Button),
                found => found,
            },
            WizardStep::Dpad(_) => {
                if self.profile.dpad_mode == DpadMode::Hat {
                    let hats: Vec<(usize, (i32, i32))> = frame
                        .hats
                        .iter()
                        .copied()
                        .enumerate()
                        .filter(|(_, hat)| *hat != (0, 0))
                        .collect();
                    match hats.as_slice() {
                        [(i, (x, y))] => return Detection::One(Candidate::Hat(*i, *x, *y)),
                        [] => {}
                        _ => return Detection::Many("several hats moved together".into()),
                    }
                    if self.dpad_locked {
                        return Detection::Idle;
                    }
                }
                single(new_presses(frame, baseline), "buttons", Candidate::Button)
            }
        }
    }

    fn resolve(&self, step: WizardStep, window: &Window) -> Result<Learned, String> {
        let one_button = || match window.buttons.iter().copied().collect::<Vec<_>>().as_slice() {
            [index] => Ok(ButtonBinding::Button { index: *index }),
            [] => Err("no button was pressed".to_string()),
            many => Err(format!("buttons {:?} were pressed together", many)),
        };
        let axis_binding = |index: usize, peak: f32| {
            let sign = if peak < 0.0 { -1 } else { 1 };
            AxisBinding::new(index, sign, window.baseline.axis(index).unwrap_or(0.0))
        };

        match step {
            WizardStep::Stick(_) => match window.active_axes().as_slice() {
                [(index, peak)] => Ok(Learned::Axis(axis_binding(*index, *peak))),
                [] => Err("no axis moved far enough".into()),
                many => Err(format!("axes {:?} moved together", many)),
            },
            WizardStep::Button(_) => one_button().map(Learned::Button),
            WizardStep::Trigger(_) => match window.active_axes().as_slice() {
                [(index, peak)] => Ok(Learned::Button(ButtonBinding::Axis(axis_binding(*index, *peak)))),
                [] => one_button().map(Learned::Button),
                many => Err(format!("axes {:?} moved together", many)),
            },
            WizardStep::Dpad(_) => {
                if self.profile.dpad_mode == DpadMode::Hat && !window.hats.is_empty() {
                    let straight: Vec<_> = window
                        .hats
                        .iter()
                        .filter(|(_, x, y)| (*x == 0) != (*y == 0))
                        .collect();
                    let pick = match (window.hats.as_slice(), straight.as_slice()) {
                        ([only], _) => Some(*only),
                        (_, [only]) => Some(**only),
                        _ => None,
                    };
                    return match pick {
                        Some((hat, x, y)) => Ok(Learned::Button(ButtonBinding::Hat { hat, x, y })),
                        None => Err(format!("hat directions {:?} are ambiguous", window.hats)),
                    };
                }
                if self.profile.dpad_mode == DpadMode::Hat && self.dpad_locked {
                    return Err("the d-pad hat did not move".into());
                }
                one_button().map(Learned::Button)
            }
        }
    }

    fn commit(&mut self, step: WizardStep, window: Window) -> (Phase, WizardEvent) {
        let learned = match self.resolve(step, &window) {
            Ok(learned) => learned,
            Err(reason) => return Self::reject(step, window.baseline, reason),
        };

        let control = step.control();
        let source = learned.source();
        let dpad_on_buttons = matches!(
            (step, &learned),
            (WizardStep::Dpad(_), Learned::Button(ButtonBinding::Button { .. }))
        );
        if let Some(owner) = self.profile.owner_of(source).filter(|owner| *owner != control) {
            return Self::reject(
                step,
                window.baseline,
                format!("{} is already bound to {}", source, owner),
            );
        }

        match (control, learned) {
            (LogicalControl::Axis(axis), Learned::Axis(binding)) => {
                self.profile.axes.insert(axis, binding);
            }
            (LogicalControl::Button(button), Learned::Button(binding)) => {
                self.profile.buttons.insert(button, binding);
            }
            _ => {
                return Self::reject(step, window.baseline, "binding kind mismatch".into());
            }
        }
        // Only an accepted answer decides the d-pad mode
        if dpad_on_buttons {
            self.profile.dpad_mode = DpadMode::Buttons;
        }
        if matches!(step, WizardStep::Dpad(_)) {
            self.dpad_locked = true;
        }
        self.step_index += 1;

        if self.is_complete() {
            return match self.profile.finalize() {
                Ok(()) => (Phase::Settling, WizardEvent::Complete(self.profile.clone())),
                Err(e) => {
                    *self = CalibrationWizard::new(self.hat_count);
                    let error = CamStickError::CalibrationAmbiguous(format!(
                        "profile failed validation ({}), starting over",
                        e
                    ));
                    (Phase::Settling, WizardEvent::Retry { step, error })
                }
            };
        }
        (Phase::Settling, WizardEvent::Captured { control, source })
    }
}
