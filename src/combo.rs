//! # Macro Dispatcher
//!
//! Chord bindings that turn held controller combinations into keyboard taps.
//!
//! ## Default Bindings
//!
//! Evaluated in this order; a chord whose controls are a strict subset of an
//! already satisfied chord is suppressed for that tick.
//!
//! | # | Chord | Action | Key |
//! |---|-------|--------|-----|
//! | 1 | L1 + R1 + right stick up | repeat every 250 ms | Up |
//! | 2 | L1 + R1 + right stick down | repeat every 250 ms | Down |
//! | 3 | L1 + R3 | tap | F8 |
//! | 4 | L1 + Start | tap | F12 |
//! | 5 | L3 | tap | F11 |
//!
//! A stick direction counts as held beyond [`STICK_PUSH_THRESHOLD`].
//!
//! Taps fire once on the rising edge and need a full release before firing
//! again. Repeats fire on the rising edge and then every interval while held.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::controller::profile::{LogicalAxis, LogicalButton};
use crate::controller::sampler::FrameSample;

/// Logical stick deflection that counts as a held direction.
pub const STICK_PUSH_THRESHOLD: f32 = 0.65;

/// Repeat interval of the default arrow-key chords.
pub const DEFAULT_REPEAT_INTERVAL: Duration = Duration::from_millis(250);

/// One control inside a chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChordInput {
    Button(LogicalButton),
    /// A stick axis pushed past the threshold in one direction.
    StickPush { axis: LogicalAxis, positive: bool },
}

impl ChordInput {
    fn is_held(&self, sample: &FrameSample) -> bool {
        match *self {
            ChordInput::Button(button) => sample.is_held(button),
            ChordInput::StickPush { axis, positive } => {
                let value = sample.axis(axis);
                if positive {
                    value >= STICK_PUSH_THRESHOLD
                } else {
                    value <= -STICK_PUSH_THRESHOLD
                }
            }
        }
    }
}

/// Keys the macro layer can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroKey {
    F8,
    F11,
    F12,
    ArrowUp,
    ArrowDown,
}

impl fmt::Display for MacroKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MacroKey::F8 => "F8",
            MacroKey::F11 => "F11",
            MacroKey::F12 => "F12",
            MacroKey::ArrowUp => "Up",
            MacroKey::ArrowDown => "Down",
        };
        f.write_str(name)
    }
}

/// What a satisfied chord does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroAction {
    Tap,
    Repeat { interval: Duration },
}

/// A chord and its action.
#[derive(Debug, Clone)]
pub struct ChordBinding {
    pub name: &'static str,
    pub controls: BTreeSet<ChordInput>,
    pub action: MacroAction,
    pub key: MacroKey,
}

impl ChordBinding {
    /// Creates a binding.
    #[must_use]
    pub fn new(
        name: &'static str,
        controls: impl IntoIterator<Item = ChordInput>,
        action: MacroAction,
        key: MacroKey,
    ) -> Self {
        Self {
            name,
            controls: controls.into_iter().collect(),
            action,
            key,
        }
    }

    fn is_satisfied(&self, sample: &FrameSample) -> bool {
        !self.controls.is_empty() && self.controls.iter().all(|c| c.is_held(sample))
    }
}

/// The fixed macro set.
#[must_use]
pub fn default_bindings() -> Vec<ChordBinding> {
    use ChordInput::{Button, StickPush};
    use LogicalButton::{BumperL, BumperR, Start, StickClickL, StickClickR};

    let repeat = MacroAction::Repeat {
        interval: DEFAULT_REPEAT_INTERVAL,
    };
    vec![
        ChordBinding::new(
            "bumpers + right stick up",
            [
                Button(BumperL),
                Button(BumperR),
                StickPush {
                    axis: LogicalAxis::RightY,
                    positive: true,
                },
            ],
            repeat,
            MacroKey::ArrowUp,
        ),
        ChordBinding::new(
            "bumpers + right stick down",
            [
                Button(BumperL),
                Button(BumperR),
                StickPush {
                    axis: LogicalAxis::RightY,
                    positive: false,
                },
            ],
            repeat,
            MacroKey::ArrowDown,
        ),
        ChordBinding::new(
            "left bumper + right stick click",
            [Button(BumperL), Button(StickClickR)],
            MacroAction::Tap,
            MacroKey::F8,
        ),
        ChordBinding::new(
            "left bumper + start",
            [Button(BumperL), Button(Start)],
            MacroAction::Tap,
            MacroKey::F12,
        ),
        ChordBinding::new(
            "left stick click",
            [Button(StickClickL)],
            MacroAction::Tap,
            MacroKey::F11,
        ),
    ]
}

/// Per-binding latch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComboState {
    /// Whether the chord counted as held on the previous tick.
    pub held: bool,
    /// When the binding last fired.
    pub last_fire: Option<Duration>,
}

/// Evaluates chord bindings once per tick.
#[derive(Debug, Clone)]
pub struct MacroDispatcher {
    bindings: Vec<ChordBinding>,
    states: Vec<ComboState>,
}

impl Default for MacroDispatcher {
    fn default() -> Self {
        Self::new(default_bindings())
    }
}

impl MacroDispatcher {
    /// Creates a dispatcher.
    ///
    /// Bindings are ordered by chord size, largest first; equal sizes keep
    /// their given order. This guarantees a superset chord is evaluated
    /// before any of its subsets.
    #[must_use]
    pub fn new(mut bindings: Vec<ChordBinding>) -> Self {
        bindings.sort_by(|a, b| b.controls.len().cmp(&a.controls.len()));
        let states = vec![ComboState::default(); bindings.len()];
        Self { bindings, states }
    }

    /// Bindings in evaluation order.
    #[must_use]
    pub fn bindings(&self) -> &[ChordBinding] {
        &self.bindings
    }

    /// Latch of the binding at `index` (evaluation order).
    #[must_use]
    pub fn state(&self, index: usize) -> Option<&ComboState> {
        self.states.get(index)
    }

    /// Clears every latch (controller lost, mode switch).
    pub fn release_all(&mut self) {
        self.states.fill(ComboState::default());
    }

    /// Evaluates all chords against one sample.
    ///
    /// # Returns
    ///
    /// Keys to tap this tick, in evaluation order.
    pub fn evaluate(&mut self, sample: &FrameSample) -> Vec<MacroKey> {
        let now = sample.timestamp;
        let mut fired = Vec::new();
        let mut claimed: Vec<&BTreeSet<ChordInput>> = Vec::new();

        for (binding, state) in self.bindings.iter().zip(self.states.iter_mut()) {
            if !binding.is_satisfied(sample) {
                *state = ComboState::default();
                continue;
            }

            let suppressed = claimed.iter().any(|bigger| {
                binding.controls.len() < bigger.len() && binding.controls.is_subset(bigger)
            });
            claimed.push(&binding.controls);

            if suppressed {
                // Latched as held so releasing the bigger chord does not
                // produce a fresh rising edge here.
                if !state.held {
                    debug!("Chord '{}' suppressed by a larger chord", binding.name);
                }
                state.held = true;
                state.last_fire = Some(now);
                continue;
            }

            let fire = match binding.action {
                MacroAction::Tap => !state.held,
                MacroAction::Repeat { interval } => match (state.held, state.last_fire) {
                    (false, _) | (true, None) => true,
                    (true, Some(last)) => now.saturating_sub(last) >= interval,
                },
            };
            state.held = true;
            if fire {
                state.last_fire = Some(now);
                debug!("Chord '{}' fired {}", binding.name, binding.key);
                fired.push(binding.key);
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::profile::ButtonSet;
    use crate::transform::shaping::StickVector;

    fn sample_at(ms: u64, buttons: &[LogicalButton], right_y: f32) -> FrameSample {
        FrameSample {
            right: StickVector::new(0.0, right_y),
            buttons: buttons.iter().copied().collect::<ButtonSet>(),
            timestamp: Duration::from_millis(ms),
            ..FrameSample::default()
        }
    }

    use LogicalButton::{BumperL, BumperR, Start, StickClickL, StickClickR};

    // ==================== Ordering Tests ====================

    #[test]
    fn test_default_bindings_order() {
        let dispatcher = MacroDispatcher::default();
        let keys: Vec<MacroKey> = dispatcher.bindings().iter().map(|b| b.key).collect();
        assert_eq!(
            keys,
            vec![
                MacroKey::ArrowUp,
                MacroKey::ArrowDown,
                MacroKey::F8,
                MacroKey::F12,
                MacroKey::F11
            ]
        );
    }

    #[test]
    fn test_new_sorts_supersets_first() {
        let dispatcher = MacroDispatcher::new(vec![
            ChordBinding::new("small", [ChordInput::Button(BumperL)], MacroAction::Tap, MacroKey::F8),
            ChordBinding::new(
                "big",
                [ChordInput::Button(BumperL), ChordInput::Button(BumperR)],
                MacroAction::Tap,
                MacroKey::F12,
            ),
        ]);
        assert_eq!(dispatcher.bindings()[0].name, "big");
    }

    // ==================== Priority Tests ====================

    #[test]
    fn test_superset_chord_suppresses_subset() {
        let mut dispatcher = MacroDispatcher::new(vec![
            ChordBinding::new(
                "l1 r3",
                [ChordInput::Button(BumperL), ChordInput::Button(StickClickR)],
                MacroAction::Tap,
                MacroKey::F8,
            ),
            ChordBinding::new(
                "l1 r1 r3",
                [
                    ChordInput::Button(BumperL),
                    ChordInput::Button(BumperR),
                    ChordInput::Button(StickClickR),
                ],
                MacroAction::Tap,
                MacroKey::F12,
            ),
        ]);
        let keys = dispatcher.evaluate(&sample_at(0, &[BumperL, BumperR, StickClickR], 0.0));
        assert_eq!(keys, vec![MacroKey::F12]);

        // Releasing R1 while still holding L1 + R3 does not fire the subset
        let keys = dispatcher.evaluate(&sample_at(10, &[BumperL, StickClickR], 0.0));
        assert!(keys.is_empty());
    }

    #[test]
    fn test_arrow_chord_suppresses_nothing_unrelated() {
        let mut dispatcher = MacroDispatcher::default();
        // L3 is not a subset of the arrow chord, so both fire
        let keys = dispatcher.evaluate(&sample_at(0, &[BumperL, BumperR, StickClickL], 1.0));
        assert_eq!(keys, vec![MacroKey::ArrowUp, MacroKey::F11]);
    }

    // ==================== Tap Tests ====================

    #[test]
    fn test_tap_fires_once_per_press() {
        let mut dispatcher = MacroDispatcher::default();
        let mut count = 0;
        for tick in 0..100 {
            count += dispatcher
                .evaluate(&sample_at(tick * 4, &[BumperL, Start], 0.0))
                .len();
        }
        assert_eq!(count, 1);

        assert!(dispatcher.evaluate(&sample_at(400, &[BumperL], 0.0)).is_empty());
        let keys = dispatcher.evaluate(&sample_at(404, &[BumperL, Start], 0.0));
        assert_eq!(keys, vec![MacroKey::F12]);
    }

    // ==================== Repeat Tests ====================

    #[test]
    fn test_repeat_fires_at_interval_and_stops_on_release() {
        let mut dispatcher = MacroDispatcher::default();
        let mut fire_times = Vec::new();
        // 4 ms ticks for one second
        for tick in 0..250u64 {
            let now = tick * 4;
            if !dispatcher.evaluate(&sample_at(now, &[BumperL, BumperR], 0.9)).is_empty() {
                fire_times.push(now);
            }
        }
        assert_eq!(fire_times, vec![0, 252, 504, 756]);

        assert!(dispatcher.evaluate(&sample_at(1000, &[BumperL, BumperR], 0.2)).is_empty());
        assert_eq!(dispatcher.state(0), Some(&ComboState::default()));
    }

    #[test]
    fn test_stick_threshold() {
        let mut dispatcher = MacroDispatcher::default();
        assert!(dispatcher.evaluate(&sample_at(0, &[BumperL, BumperR], 0.6)).is_empty());
        let keys = dispatcher.evaluate(&sample_at(4, &[BumperL, BumperR], -0.7));
        assert_eq!(keys, vec![MacroKey::ArrowDown]);
    }

    #[test]
    fn test_release_all_rearms_taps() {
        let mut dispatcher = MacroDispatcher::default();
        assert_eq!(dispatcher.evaluate(&sample_at(0, &[StickClickL], 0.0)).len(), 1);
        dispatcher.release_all();
        assert_eq!(dispatcher.evaluate(&sample_at(4, &[StickClickL], 0.0)).len(), 1);
    }
}
