// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Estimator behaviour: decay, hysteresis, key ordering and shutdown cleanup.

use parking_lot::Mutex;
use rosc::OscType;
use std::sync::Arc;
use std::time::{Duration, Instant};
use walkassist_config::{default_endpoint_groups, Endpoint, EndpointGroup, ValueType};
use walkassist_io::Engine;
use walkassist_motion::{
    connect_motion_input, EstimatorConfig, KeyActionError, KeyActions, MotionEstimator,
};

type Log = Arc<Mutex<Vec<(&'static str, Vec<String>)>>>;

#[derive(Clone, Default)]
struct RecordingKeys {
    log: Log,
    fail: bool,
}

impl KeyActions for RecordingKeys {
    fn press(&mut self, keys: &[String]) -> walkassist_motion::Result<()> {
        self.log.lock().push(("press", keys.to_vec()));
        if self.fail {
            return Err(KeyActionError::Unavailable("no display".to_string()));
        }
        Ok(())
    }

    fn release(&mut self, keys: &[String]) -> walkassist_motion::Result<()> {
        self.log.lock().push(("release", keys.to_vec()));
        if self.fail {
            return Err(KeyActionError::Unavailable("no display".to_string()));
        }
        Ok(())
    }
}

fn estimator_with(config: EstimatorConfig) -> (MotionEstimator, Log) {
    let keys = RecordingKeys::default();
    let log = Arc::clone(&keys.log);
    (MotionEstimator::new(config, Box::new(keys)), log)
}

fn ms(t0: Instant, millis: u64) -> Instant {
    t0 + Duration::from_millis(millis)
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|k| k.to_string()).collect()
}

#[test]
fn decay_reaches_zero_monotonically() {
    let t0 = Instant::now();
    let (mut estimator, _) = estimator_with(EstimatorConfig::default());
    estimator.record_reading_at(100.0, t0);

    let mut previous = 100.0;
    let mut reached_zero_at = None;
    // 25 ms ticks over 5 s
    for tick in 1..=200u64 {
        let value = estimator.tick_at(ms(t0, 800 + tick * 25)).smoothed_magnitude;
        if value == 0.0 {
            reached_zero_at = Some(tick);
            break;
        }
        assert!(value < previous, "tick {}: {} !< {}", tick, value, previous);
        previous = value;
    }

    // ln(100 / 0.01) / (3 * 0.025) ~= 122.8 decay ticks
    assert_eq!(reached_zero_at, Some(123));
}

#[test]
fn walk_releases_only_after_dwell() {
    let t0 = Instant::now();
    let config = EstimatorConfig {
        walk_release_delay: 0.5,
        ..EstimatorConfig::default()
    };
    let (mut estimator, log) = estimator_with(config);

    for (i, magnitude) in [200.0, 200.0, 100.0, 100.0, 100.0].iter().enumerate() {
        let at = ms(t0, 200 * i as u64);
        estimator.record_reading_at(*magnitude, at);
        let snapshot = estimator.tick_at(at);
        assert!(snapshot.walk_active, "sample {} released walk early", i);
        assert!(!snapshot.run_active);
    }

    estimator.record_reading_at(100.0, ms(t0, 900));
    assert!(!estimator.tick_at(ms(t0, 900)).walk_active);

    assert_eq!(
        *log.lock(),
        vec![("press", keys(&["w"])), ("release", keys(&["w"]))]
    );
}

#[test]
fn key_combinations_press_forward_release_reverse() {
    let t0 = Instant::now();
    let config = EstimatorConfig {
        walk_keys: keys(&["ctrl", "w"]),
        run_keys: keys(&["shift", "w"]),
        walk_release_delay: 0.0,
        run_release_delay: 0.0,
        ..EstimatorConfig::default()
    };
    let (mut estimator, log) = estimator_with(config);

    estimator.record_reading_at(500.0, t0);
    estimator.tick_at(t0);
    estimator.record_reading_at(0.0, ms(t0, 20));
    estimator.tick_at(ms(t0, 20));

    assert_eq!(
        *log.lock(),
        vec![
            ("press", keys(&["ctrl", "w"])),
            ("press", keys(&["shift", "w"])),
            ("release", keys(&["w", "ctrl"])),
            ("release", keys(&["w", "shift"])),
        ]
    );
}

#[test]
fn disabled_keybinds_block_activation_only() {
    let t0 = Instant::now();
    let (mut estimator, log) = estimator_with(EstimatorConfig {
        walk_release_delay: 0.0,
        ..EstimatorConfig::default()
    });
    let controls = estimator.controls();

    controls.set_keybinds_enabled(false);
    estimator.record_reading_at(200.0, t0);
    assert!(!estimator.tick_at(t0).walk_active);

    controls.set_keybinds_enabled(true);
    assert!(estimator.tick_at(ms(t0, 20)).walk_active);

    controls.set_keybinds_enabled(false);
    estimator.record_reading_at(10.0, ms(t0, 40));
    assert!(!estimator.tick_at(ms(t0, 40)).walk_active);

    assert_eq!(log.lock().len(), 2);
}

#[test]
fn runtime_threshold_change_applies_next_tick() {
    let t0 = Instant::now();
    let (mut estimator, _) = estimator_with(EstimatorConfig::default());
    estimator.record_reading_at(100.0, t0);
    assert!(!estimator.tick_at(t0).walk_active);

    estimator.controls().set_thresholds(50.0, 90.0);
    let snapshot = estimator.tick_at(ms(t0, 20));
    assert!(snapshot.walk_active);
    assert!(snapshot.run_active);
}

#[test]
fn key_failures_do_not_stop_estimator() {
    let t0 = Instant::now();
    let keys_impl = RecordingKeys {
        fail: true,
        ..RecordingKeys::default()
    };
    let log = Arc::clone(&keys_impl.log);
    let mut estimator = MotionEstimator::new(
        EstimatorConfig {
            walk_release_delay: 0.0,
            ..EstimatorConfig::default()
        },
        Box::new(keys_impl),
    );

    estimator.record_reading_at(200.0, t0);
    assert!(estimator.tick_at(t0).walk_active);
    estimator.record_reading_at(0.0, ms(t0, 20));
    assert!(!estimator.tick_at(ms(t0, 20)).walk_active);
    assert_eq!(log.lock().len(), 2);
}

#[tokio::test]
async fn shutdown_releases_held_keys() {
    let (estimator, log) = estimator_with(EstimatorConfig::default());
    let input = estimator.input();
    let mut feed = estimator.subscribe();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let task = tokio::spawn(estimator.run(async move {
        let _ = stop_rx.await;
    }));

    input.push(30.0, 0.0, 0.0);
    feed.wait_for(|s| s.run_active).await.unwrap();

    stop_tx.send(()).unwrap();
    task.await.unwrap();

    let log = log.lock();
    assert_eq!(log.len(), 4);
    assert!(log[2..].iter().all(|(kind, _)| *kind == "release"));
}

#[tokio::test]
async fn aborted_loop_still_releases_keys() {
    let (estimator, log) = estimator_with(EstimatorConfig::default());
    let input = estimator.input();
    let mut feed = estimator.subscribe();

    let task = tokio::spawn(estimator.run(std::future::pending::<()>()));
    input.push(15.0, 0.0, 0.0);
    feed.wait_for(|s| s.walk_active).await.unwrap();

    task.abort();
    let _ = task.await;

    assert_eq!(
        *log.lock(),
        vec![("press", keys(&["w"])), ("release", keys(&["w"]))]
    );
}

#[tokio::test]
async fn engine_readings_drive_walk() {
    let engine = Engine::default();
    engine.rebuild(default_endpoint_groups()).unwrap();

    let (mut estimator, log) = estimator_with(EstimatorConfig {
        walk_threshold: 20.0,
        run_threshold: 1_000.0,
        ..EstimatorConfig::default()
    });
    connect_motion_input(&engine, estimator.input());

    engine.dispatch(
        "/accelerometer",
        &[OscType::Float(3.0), OscType::Float(4.0), OscType::Float(0.0)],
    );
    tokio::time::sleep(Duration::from_millis(30)).await;

    let snapshot = estimator.tick();
    assert_eq!(snapshot.smoothed_magnitude, 25.0);
    assert!(snapshot.walk_active);
    assert!(!snapshot.run_active);
    assert_eq!(log.lock()[0], ("press", keys(&["w"])));
}

#[tokio::test]
async fn other_outputs_are_ignored() {
    let mut groups = default_endpoint_groups();
    groups.push(
        EndpointGroup::new(1, "Hands", ValueType::Vector3)
            .with_endpoint(Endpoint::new(0, "hand", "/hand")),
    );
    let engine = Engine::default();
    engine.rebuild(groups).unwrap();

    let (mut estimator, _) = estimator_with(EstimatorConfig::default());
    connect_motion_input(&engine, estimator.input());

    engine.dispatch(
        "/hand",
        &[OscType::Float(30.0), OscType::Float(0.0), OscType::Float(0.0)],
    );
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(estimator.tick().smoothed_magnitude, 0.0);
    assert!(estimator.last_message().is_none());
}
