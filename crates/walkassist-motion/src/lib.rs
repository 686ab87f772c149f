// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # walkassist-motion
//!
//! Turns completed Default-output readings into a smoothed, decaying motion
//! magnitude and drives walk/run key actions through hysteresis latches.
//!
//! The estimator runs on its own fixed tick, decoupled from message arrival:
//! readings are handed over through a [`MotionInput`] and picked up on the next
//! tick.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod estimator;
pub mod input;
pub mod keys;
pub mod latch;

pub use estimator::{EstimatorConfig, MotionControls, MotionEstimator, MotionSnapshot};
pub use input::{connect_motion_input, MotionInput, MotionSample, MOTION_SUBSCRIBER};
pub use keys::{KeyActionError, KeyActions, LoggingKeyActions, Result};
pub use latch::{Edge, ThresholdLatch};
