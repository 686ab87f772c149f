// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Threshold latch with release hysteresis

use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Activated,
    Released,
}

/// Activates as soon as the value reaches `threshold`; releases only after the
/// value has stayed below it for `release_delay` seconds without interruption.
#[derive(Debug, Clone)]
pub struct ThresholdLatch {
    threshold: f64,
    release_delay: f64,
    active: bool,
    below_since: Option<Instant>,
}

impl ThresholdLatch {
    pub fn new(threshold: f64, release_delay: f64) -> Self {
        Self {
            threshold,
            release_delay,
            active: false,
            below_since: None,
        }
    }

    pub fn configure(&mut self, threshold: f64, release_delay: f64) {
        self.threshold = threshold;
        self.release_delay = release_delay;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Feed one sample. `activation_enabled == false` suppresses new
    /// activations but never blocks a release.
    pub fn update(&mut self, value: f64, now: Instant, activation_enabled: bool) -> Option<Edge> {
        if value >= self.threshold {
            self.below_since = None;
            if !self.active && activation_enabled {
                self.active = true;
                return Some(Edge::Activated);
            }
            return None;
        }

        if !self.active {
            return None;
        }

        let since = *self.below_since.get_or_insert(now);
        let dwell = now.saturating_duration_since(since).as_secs_f64();
        if dwell >= self.release_delay {
            self.active = false;
            self.below_since = None;
            return Some(Edge::Released);
        }
        None
    }

    /// Drop to inactive immediately. Returns `true` if it was active.
    pub fn force_release(&mut self) -> bool {
        let was_active = self.active;
        self.active = false;
        self.below_since = None;
        was_active
    }
}
