//! # Output Module
//!
//! Assembles the per-tick [`OutputFrame`] and hands it to the two boundary
//! sinks:
//!
//! - [`GamepadSink`]: the virtual controller (sticks, triggers, buttons)
//! - [`KeyInjector`]: relative pointer motion and macro key taps
//!
//! A rejected gamepad frame drops the whole tick's output and surfaces as
//! `SinkUnavailable`; the caller keeps ticking so output resumes once the
//! sink recovers. Pointer and key failures are logged only.

pub mod uinput;

use tracing::{info, warn};

use crate::combo::MacroKey;
use crate::controller::profile::ButtonSet;
use crate::error::{CamStickError, Result};
use crate::transform::pointer::PointerDelta;
use crate::transform::shaping::StickVector;

/// Virtual controller state for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GamepadReport {
    /// Rotated movement stick, +y = up.
    pub left_stick: StickVector,
    /// Camera stick passthrough, +y = up.
    pub right_stick: StickVector,
    /// 0.0 to 1.0.
    pub left_trigger: f32,
    /// 0.0 to 1.0.
    pub right_trigger: f32,
    pub buttons: ButtonSet,
}

impl GamepadReport {
    /// Everything released and centered.
    #[must_use]
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// Everything produced by one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputFrame {
    pub gamepad: GamepadReport,
    pub pointer: PointerDelta,
    pub keys: Vec<MacroKey>,
}

impl OutputFrame {
    /// Zero sticks, no buttons, no pointer motion, no keys.
    #[must_use]
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// Capability: emit one virtual controller report.
#[cfg_attr(test, mockall::automock)]
pub trait GamepadSink {
    /// # Errors
    ///
    /// Returns an error if the sink rejected the report.
    fn emit(&mut self, report: &GamepadReport) -> Result<()>;
}

/// Capability: inject pointer motion and key taps.
#[cfg_attr(test, mockall::automock)]
pub trait KeyInjector {
    /// # Errors
    ///
    /// Returns an error if the motion could not be injected.
    fn move_pointer(&mut self, dx: i32, dy: i32) -> Result<()>;

    /// Press and release `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key could not be injected.
    fn tap_key(&mut self, key: MacroKey) -> Result<()>;
}

/// Routes output frames to the sinks.
pub struct OutputDispatcher<G, K> {
    gamepad: G,
    injector: K,
    sink_healthy: bool,
    dropped_frames: u64,
}

impl<G: GamepadSink, K: KeyInjector> OutputDispatcher<G, K> {
    #[must_use]
    pub fn new(gamepad: G, injector: K) -> Self {
        Self {
            gamepad,
            injector,
            sink_healthy: true,
            dropped_frames: 0,
        }
    }

    /// Frames dropped because the gamepad sink rejected them.
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Sends one frame.
    ///
    /// # Errors
    ///
    /// Returns `SinkUnavailable` if the gamepad sink rejected the report; the
    /// frame's pointer motion and keys are then dropped too.
    pub fn dispatch(&mut self, frame: &OutputFrame) -> Result<()> {
        if let Err(e) = self.gamepad.emit(&frame.gamepad) {
            self.dropped_frames += 1;
            if self.sink_healthy {
                warn!("Virtual controller rejected a frame, dropping output: {}", e);
                self.sink_healthy = false;
            }
            return Err(match e {
                CamStickError::SinkUnavailable(msg) => CamStickError::SinkUnavailable(msg),
                other => CamStickError::SinkUnavailable(other.to_string()),
            });
        }
        if !self.sink_healthy {
            info!(
                "Virtual controller recovered after {} dropped frames",
                self.dropped_frames
            );
            self.sink_healthy = true;
        }

        if !frame.pointer.is_zero() {
            if let Err(e) = self.injector.move_pointer(frame.pointer.dx, frame.pointer.dy) {
                warn!("Pointer motion dropped: {}", e);
            }
        }
        for key in &frame.keys {
            if let Err(e) = self.injector.tap_key(*key) {
                warn!("Key tap {} dropped: {}", key, e);
            }
        }
        Ok(())
    }

    /// Emits a neutral report, ignoring failures.
    pub fn release(&mut self) {
        if let Err(e) = self.gamepad.emit(&GamepadReport::neutral()) {
            warn!("Could not center the virtual controller: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn frame_with_everything() -> OutputFrame {
        OutputFrame {
            gamepad: GamepadReport {
                left_stick: StickVector::new(0.5, 0.0),
                ..GamepadReport::neutral()
            },
            pointer: PointerDelta { dx: 3, dy: -2 },
            keys: vec![MacroKey::F8, MacroKey::ArrowUp],
        }
    }

    #[test]
    fn test_dispatch_order() {
        let mut seq = Sequence::new();
        let mut gamepad = MockGamepadSink::new();
        let mut injector = MockKeyInjector::new();
        gamepad
            .expect_emit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        injector
            .expect_move_pointer()
            .with(eq(3), eq(-2))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        injector
            .expect_tap_key()
            .with(eq(MacroKey::F8))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        injector
            .expect_tap_key()
            .with(eq(MacroKey::ArrowUp))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut dispatcher = OutputDispatcher::new(gamepad, injector);
        assert!(dispatcher.dispatch(&frame_with_everything()).is_ok());
    }

    #[test]
    fn test_zero_pointer_is_not_sent() {
        let mut gamepad = MockGamepadSink::new();
        let mut injector = MockKeyInjector::new();
        gamepad.expect_emit().times(1).returning(|_| Ok(()));
        injector.expect_move_pointer().never();
        injector.expect_tap_key().never();

        let mut dispatcher = OutputDispatcher::new(gamepad, injector);
        assert!(dispatcher.dispatch(&OutputFrame::neutral()).is_ok());
    }

    #[test]
    fn test_sink_failure_drops_tick() {
        let mut gamepad = MockGamepadSink::new();
        let mut injector = MockKeyInjector::new();
        gamepad
            .expect_emit()
            .times(2)
            .returning(|_| Err(CamStickError::Io(std::io::Error::new(std::io::ErrorKind::Other, "busy"))));
        injector.expect_move_pointer().never();
        injector.expect_tap_key().never();

        let mut dispatcher = OutputDispatcher::new(gamepad, injector);
        for _ in 0..2 {
            let err = dispatcher.dispatch(&frame_with_everything()).unwrap_err();
            assert!(matches!(err, CamStickError::SinkUnavailable(_)));
        }
        assert_eq!(dispatcher.dropped_frames(), 2);
    }

    #[test]
    fn test_sink_recovers() {
        let mut gamepad = MockGamepadSink::new();
        let mut injector = MockKeyInjector::new();
        let mut seq = Sequence::new();
        gamepad
            .expect_emit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(CamStickError::SinkUnavailable("gone".into())));
        gamepad
            .expect_emit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        injector.expect_move_pointer().times(1).returning(|_, _| Ok(()));
        injector.expect_tap_key().times(2).returning(|_| Ok(()));

        let mut dispatcher = OutputDispatcher::new(gamepad, injector);
        assert!(dispatcher.dispatch(&frame_with_everything()).is_err());
        assert!(dispatcher.dispatch(&frame_with_everything()).is_ok());
    }

    #[test]
    fn test_injector_failure_is_not_fatal() {
        let mut gamepad = MockGamepadSink::new();
        let mut injector = MockKeyInjector::new();
        gamepad.expect_emit().returning(|_| Ok(()));
        injector
            .expect_move_pointer()
            .returning(|_, _| Err(CamStickError::SinkUnavailable("mouse".into())));
        injector
            .expect_tap_key()
            .times(2)
            .returning(|_| Err(CamStickError::SinkUnavailable("keyboard".into())));

        let mut dispatcher = OutputDispatcher::new(gamepad, injector);
        assert!(dispatcher.dispatch(&frame_with_everything()).is_ok());
    }

    #[test]
    fn test_release_emits_neutral() {
        let mut gamepad = MockGamepadSink::new();
        gamepad
            .expect_emit()
            .withf(|report| *report == GamepadReport::neutral())
            .times(1)
            .returning(|_| Ok(()));
        let mut dispatcher = OutputDispatcher::new(gamepad, MockKeyInjector::new());
        dispatcher.release();
    }
}
