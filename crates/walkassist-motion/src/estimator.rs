// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Motion state estimator
//!
//! Each tick:
//! 1. Pick up the latest reading, if any; the smoothed magnitude jumps to it.
//! 2. Once `decay_start_delay` has passed since the last reading, decay the
//!    magnitude by `exp(-decay_rate * decay_tick)` per whole `decay_tick`
//!    elapsed, clamping to zero under `decay_epsilon`. Whole steps are counted
//!    from wall-clock time, so the result does not depend on how often the tick
//!    runs.
//! 3. Feed the walk and run latches and turn their edges into key actions.

use crate::input::MotionInput;
use crate::keys::KeyActions;
use crate::latch::{Edge, ThresholdLatch};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use walkassist_config::MotionConfig;

/// Estimator parameters; see [`MotionConfig`] for defaults
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorConfig {
    pub walk_threshold: f64,
    pub run_threshold: f64,
    /// Seconds below `walk_threshold` before walk releases
    pub walk_release_delay: f64,
    pub run_release_delay: f64,
    pub walk_keys: Vec<String>,
    pub run_keys: Vec<String>,
    pub keybinds_enabled: bool,
    pub tick: Duration,
    pub decay_start_delay: Duration,
    pub decay_tick: Duration,
    pub decay_rate: f64,
    pub decay_epsilon: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::from(&MotionConfig::default())
    }
}

impl From<&MotionConfig> for EstimatorConfig {
    fn from(config: &MotionConfig) -> Self {
        Self {
            walk_threshold: config.walk_threshold,
            run_threshold: config.run_threshold,
            walk_release_delay: config.input_smoothing,
            run_release_delay: config.run_release_delay,
            walk_keys: config.walk_keys.clone(),
            run_keys: config.run_keys.clone(),
            keybinds_enabled: config.keybinds_enabled,
            tick: Duration::from_millis(config.tick_ms.max(1)),
            decay_start_delay: seconds(config.decay_start_delay),
            decay_tick: seconds(config.decay_tick).max(Duration::from_millis(1)),
            decay_rate: config.decay_rate,
            decay_epsilon: config.decay_epsilon,
        }
    }
}

fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

/// Shared handle for changing estimator parameters at runtime.
///
/// Changes apply on the next tick. Keys already held stay as pressed and are
/// released with the combination that pressed them.
#[derive(Debug, Clone)]
pub struct MotionControls {
    config: Arc<RwLock<EstimatorConfig>>,
}

impl MotionControls {
    fn new(config: EstimatorConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    pub fn config(&self) -> EstimatorConfig {
        self.config.read().clone()
    }

    pub fn set_thresholds(&self, walk: f64, run: f64) {
        let mut config = self.config.write();
        config.walk_threshold = walk;
        config.run_threshold = run;
    }

    /// Also the walk release delay
    pub fn set_input_smoothing(&self, seconds: f64) {
        self.config.write().walk_release_delay = seconds.max(0.0);
    }

    pub fn set_walk_keys(&self, keys: Vec<String>) {
        self.config.write().walk_keys = keys;
    }

    pub fn set_run_keys(&self, keys: Vec<String>) {
        self.config.write().run_keys = keys;
    }

    pub fn set_keybinds_enabled(&self, enabled: bool) {
        self.config.write().keybinds_enabled = enabled;
    }

    pub fn keybinds_enabled(&self) -> bool {
        self.config.read().keybinds_enabled
    }
}

/// Latest estimator output
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionSnapshot {
    pub smoothed_magnitude: f64,
    pub walk_active: bool,
    pub run_active: bool,
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Walk,
    Run,
}

impl Action {
    fn name(self) -> &'static str {
        match self {
            Action::Walk => "walk",
            Action::Run => "run",
        }
    }
}

#[derive(Debug)]
struct ActionState {
    latch: ThresholdLatch,
    /// Keys pressed on activation, released in reverse on release
    held: Option<Vec<String>>,
}

pub struct MotionEstimator {
    controls: MotionControls,
    input: MotionInput,
    keys: Box<dyn KeyActions>,
    smoothed: f64,
    last_message: Option<Instant>,
    /// Start of the next undecayed `decay_tick` window
    decay_anchor: Option<Instant>,
    walk: ActionState,
    run: ActionState,
    snapshots: watch::Sender<MotionSnapshot>,
}

impl MotionEstimator {
    pub fn new(config: EstimatorConfig, keys: Box<dyn KeyActions>) -> Self {
        let walk = ThresholdLatch::new(config.walk_threshold, config.walk_release_delay);
        let run = ThresholdLatch::new(config.run_threshold, config.run_release_delay);
        let (snapshots, _) = watch::channel(MotionSnapshot::default());

        Self {
            controls: MotionControls::new(config),
            input: MotionInput::new(),
            keys,
            smoothed: 0.0,
            last_message: None,
            decay_anchor: None,
            walk: ActionState {
                latch: walk,
                held: None,
            },
            run: ActionState {
                latch: run,
                held: None,
            },
            snapshots,
        }
    }

    /// Producer handle for completed readings
    pub fn input(&self) -> MotionInput {
        self.input.clone()
    }

    pub fn controls(&self) -> MotionControls {
        self.controls.clone()
    }

    /// Receives a new snapshot after every tick
    pub fn subscribe(&self) -> watch::Receiver<MotionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> MotionSnapshot {
        MotionSnapshot {
            smoothed_magnitude: self.smoothed,
            walk_active: self.walk.latch.is_active(),
            run_active: self.run.latch.is_active(),
        }
    }

    pub fn last_message(&self) -> Option<Instant> {
        self.last_message
    }

    /// Replace the smoothed magnitude with a reading that arrived at `at`.
    /// Non-finite magnitudes are ignored.
    pub fn record_reading_at(&mut self, magnitude: f64, at: Instant) {
        if !magnitude.is_finite() {
            debug!("[MOTION] Ignoring non-finite magnitude {}", magnitude);
            return;
        }
        let decay_start = self.controls.config.read().decay_start_delay;
        self.smoothed = magnitude.max(0.0);
        self.last_message = Some(at);
        self.decay_anchor = Some(at + decay_start);
    }

    pub fn tick(&mut self) -> MotionSnapshot {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> MotionSnapshot {
        if let Some(sample) = self.input.take() {
            self.record_reading_at(sample.magnitude, sample.at);
        }

        let config = self.controls.config();
        self.apply_decay(now, &config);

        self.walk
            .latch
            .configure(config.walk_threshold, config.walk_release_delay);
        self.run
            .latch
            .configure(config.run_threshold, config.run_release_delay);

        let walk_edge = self
            .walk
            .latch
            .update(self.smoothed, now, config.keybinds_enabled);
        self.apply_edge(Action::Walk, walk_edge, &config.walk_keys);

        let run_edge = self
            .run
            .latch
            .update(self.smoothed, now, config.keybinds_enabled);
        self.apply_edge(Action::Run, run_edge, &config.run_keys);

        let snapshot = self.snapshot();
        self.snapshots.send_replace(snapshot);
        snapshot
    }

    fn apply_decay(&mut self, now: Instant, config: &EstimatorConfig) {
        let Some(anchor) = self.decay_anchor else {
            return;
        };
        if now <= anchor || self.smoothed == 0.0 {
            return;
        }

        let step = config.decay_tick;
        let steps = (now.duration_since(anchor).as_nanos() / step.as_nanos().max(1)) as u64;
        if steps == 0 {
            return;
        }

        let factor = (-config.decay_rate * step.as_secs_f64()).exp();
        self.smoothed *= factor.powf(steps as f64);
        if self.smoothed.abs() < config.decay_epsilon {
            self.smoothed = 0.0;
        }

        let advance = u32::try_from(steps)
            .ok()
            .and_then(|n| step.checked_mul(n))
            .unwrap_or_else(|| now.duration_since(anchor));
        self.decay_anchor = Some(anchor + advance);
    }

    fn apply_edge(&mut self, action: Action, edge: Option<Edge>, configured_keys: &[String]) {
        let state = match action {
            Action::Walk => &mut self.walk,
            Action::Run => &mut self.run,
        };

        match edge {
            Some(Edge::Activated) => {
                info!("[MOTION] {} on (magnitude {:.1})", action.name(), self.smoothed);
                let keys = configured_keys.to_vec();
                press(self.keys.as_mut(), action, &keys);
                state.held = Some(keys);
            }
            Some(Edge::Released) => {
                info!("[MOTION] {} off", action.name());
                let keys = state.held.take().unwrap_or_else(|| configured_keys.to_vec());
                release(self.keys.as_mut(), action, &keys);
            }
            None => {}
        }
    }

    /// Release every active action immediately
    pub fn release_all(&mut self) {
        for action in [Action::Run, Action::Walk] {
            let state = match action {
                Action::Walk => &mut self.walk,
                Action::Run => &mut self.run,
            };
            if state.latch.force_release() {
                let keys = state.held.take().unwrap_or_default();
                debug!("[MOTION] Releasing {} on shutdown", action.name());
                release(self.keys.as_mut(), action, &keys);
            }
        }
        self.snapshots.send_replace(self.snapshot());
    }

    /// Tick every configured interval until `shutdown` resolves, then release
    /// held keys. Keys are also released if the task is aborted.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.controls.config.read().tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!("[MOTION] Estimator running");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }

        self.release_all();
        info!("[MOTION] Estimator stopped");
    }
}

impl Drop for MotionEstimator {
    fn drop(&mut self) {
        self.release_all();
    }
}

fn press(keys: &mut dyn KeyActions, action: Action, combination: &[String]) {
    if combination.is_empty() {
        return;
    }
    if let Err(e) = keys.press(combination) {
        error!("[MOTION] {} press failed: {}", action.name(), e);
    }
}

fn release(keys: &mut dyn KeyActions, action: Action, combination: &[String]) {
    if combination.is_empty() {
        return;
    }
    let reversed: Vec<String> = combination.iter().rev().cloned().collect();
    if let Err(e) = keys.release(&reversed) {
        error!("[MOTION] {} release failed: {}", action.name(), e);
    }
}
