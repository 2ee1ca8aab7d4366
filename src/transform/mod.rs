//! # Transform Module
//!
//! Per-tick stick math:
//! - Radial deadzone shaping
//! - Yaw integration from the camera stick
//! - Rotation and smoothing of the movement stick
//! - Pointer motion from the camera stick

pub mod pointer;
pub mod rotator;
pub mod shaping;
pub mod yaw;
