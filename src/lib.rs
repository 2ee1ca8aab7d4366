//! # camstick Library
//!
//! Keep a game's movement stick aligned with a freely rotating camera.
//!
//! This library reads a physical gamepad, integrates a yaw offset from the
//! camera stick, rotates the movement stick by that offset and re-emits the
//! result through a virtual controller. It also learns arbitrary controller
//! layouts through a calibration wizard and fires keyboard macros from
//! controller chords.

pub mod combo;
pub mod config;
pub mod controller;
pub mod error;
pub mod output;
pub mod persist;
pub mod pipeline;
pub mod shared;
pub mod transform;
