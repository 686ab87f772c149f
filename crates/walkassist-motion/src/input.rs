// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Hand-off of completed readings to the estimator

use crossbeam::queue::ArrayQueue;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use walkassist_io::{Engine, SubscriberId};

/// Subscriber id used on the message bus by [`connect_motion_input`]
pub const MOTION_SUBSCRIBER: &str = "motion-estimator";

/// One reading's squared magnitude and its arrival time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub magnitude: f64,
    pub at: Instant,
}

/// Clonable producer handle; only the most recent sample is kept.
#[derive(Debug, Clone)]
pub struct MotionInput {
    latest: Arc<ArrayQueue<MotionSample>>,
}

impl Default for MotionInput {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionInput {
    pub fn new() -> Self {
        Self {
            latest: Arc::new(ArrayQueue::new(1)),
        }
    }

    /// Record a reading arriving now; magnitude is `x² + y² + z²`
    pub fn push(&self, x: f64, y: f64, z: f64) {
        self.push_at(x, y, z, Instant::now());
    }

    pub fn push_at(&self, x: f64, y: f64, z: f64, at: Instant) {
        self.push_magnitude_at(x * x + y * y + z * z, at);
    }

    pub fn push_magnitude_at(&self, magnitude: f64, at: Instant) {
        self.latest.force_push(MotionSample { magnitude, at });
    }

    pub(crate) fn take(&self) -> Option<MotionSample> {
        self.latest.pop()
    }
}

/// Feed `input` from the engine's completed readings for the Default output.
///
/// The Default output key is resolved now; reconnect after a rebuild that
/// renames the Default group. Readings without numeric `x`, `y` and `z` are
/// ignored.
pub fn connect_motion_input(engine: &Engine, input: MotionInput) -> SubscriberId {
    let output_key = engine
        .default_output_key()
        .unwrap_or_else(|| "Default".to_string());
    let id = SubscriberId::new(MOTION_SUBSCRIBER);
    let bus = engine.notifications();

    bus.remove_message_callback(&id);
    info!("[MOTION] Following output '{}'", output_key);
    bus.on_message(id.clone(), move |reading| {
        if reading.output != output_key {
            return;
        }
        match reading.magnitude() {
            Some(magnitude) => input.push_magnitude_at(magnitude, Instant::now()),
            None => debug!(
                "[MOTION] Ignoring reading for '{}' without numeric x/y/z",
                reading.output
            ),
        }
    });
    id
}
