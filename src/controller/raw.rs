//! Raw physical controller frames and the poll-frame capability.

use crate::error::Result;

/// One snapshot of a physical controller, indexed by physical position.
///
/// Axis values are normalized to [-1, 1]; hat values are `(x, y)` in
/// -1..=1 with +y meaning "up".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrame {
    pub axes: Vec<f32>,
    pub buttons: Vec<bool>,
    pub hats: Vec<(i32, i32)>,
}

impl RawFrame {
    /// Creates a frame with every control at rest (axes at 0).
    #[must_use]
    pub fn neutral(axes: usize, buttons: usize, hats: usize) -> Self {
        Self {
            axes: vec![0.0; axes],
            buttons: vec![false; buttons],
            hats: vec![(0, 0); hats],
        }
    }

    /// Axis value, `None` if the index does not exist.
    #[must_use]
    pub fn axis(&self, index: usize) -> Option<f32> {
        self.axes.get(index).copied()
    }

    /// Button state, `false` if the index does not exist.
    #[must_use]
    pub fn button(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }

    /// Hat state, centered if the index does not exist.
    #[must_use]
    pub fn hat(&self, index: usize) -> (i32, i32) {
        self.hats.get(index).copied().unwrap_or((0, 0))
    }

    #[must_use]
    pub fn any_button_pressed(&self) -> bool {
        self.buttons.iter().any(|pressed| *pressed)
    }

    #[must_use]
    pub fn hats_centered(&self) -> bool {
        self.hats.iter().all(|hat| *hat == (0, 0))
    }
}

/// Capability to read the current state of one physical controller.
pub trait FrameSource {
    /// Reads the current frame.
    ///
    /// # Errors
    ///
    /// Returns `NoControllerConnected` while the device is absent.
    fn poll(&mut self) -> Result<RawFrame>;

    /// Number of hats the device reports.
    fn hat_count(&self) -> usize;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::CamStickError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted frame source for testing.
    ///
    /// Frames are handed out in order; `None` entries simulate a
    /// disconnected controller. Once the script runs out the last frame is
    /// repeated.
    #[derive(Clone)]
    pub struct ScriptedSource {
        pub frames: Arc<Mutex<VecDeque<Option<RawFrame>>>>,
        pub last: Arc<Mutex<Option<RawFrame>>>,
        pub hats: usize,
        pub polls: Arc<Mutex<usize>>,
    }

    impl ScriptedSource {
        pub fn new(hats: usize) -> Self {
            Self {
                frames: Arc::new(Mutex::new(VecDeque::new())),
                last: Arc::new(Mutex::new(None)),
                hats,
                polls: Arc::new(Mutex::new(0)),
            }
        }

        pub fn push(&self, frame: RawFrame) {
            self.frames.lock().unwrap().push_back(Some(frame));
        }

        pub fn push_repeated(&self, frame: RawFrame, count: usize) {
            for _ in 0..count {
                self.push(frame.clone());
            }
        }

        pub fn push_disconnect(&self) {
            self.frames.lock().unwrap().push_back(None);
        }

        pub fn poll_count(&self) -> usize {
            *self.polls.lock().unwrap()
        }
    }

    impl FrameSource for ScriptedSource {
        fn poll(&mut self) -> Result<RawFrame> {
            *self.polls.lock().unwrap() += 1;
            match self.frames.lock().unwrap().pop_front() {
                Some(Some(frame)) => {
                    *self.last.lock().unwrap() = Some(frame.clone());
                    Ok(frame)
                }
                Some(None) => {
                    *self.last.lock().unwrap() = None;
                    Err(CamStickError::NoControllerConnected)
                }
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .ok_or(CamStickError::NoControllerConnected),
            }
        }

        fn hat_count(&self) -> usize {
            self.hats
        }
    }
}
