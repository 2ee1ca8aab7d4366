//! # Controller Module
//!
//! Physical controller input handling.
//!
//! This module handles:
//! - Controller detection and frame polling via evdev
//! - The calibration profile that maps physical controls to logical ones
//! - Translating raw frames into logical samples
//! - The interactive calibration wizard

pub mod evdev_source;
pub mod profile;
pub mod raw;
pub mod sampler;
pub mod wizard;
