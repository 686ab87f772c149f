// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # walkassist
//!
//! Turns a phone or wearable's OSC accelerometer stream into walk/run key
//! presses.
//!
//! ## Crates
//! - [`config`]: endpoint groups, motion tunables, `walkassist.toml` loading
//! - [`io`]: rate limiter, decoders, routing table, aggregator, OSC server ([`io::Engine`])
//! - [`motion`]: smoothed/decaying magnitude and walk/run hysteresis
//! - [`observability`]: logging setup and per-crate debug flags
//!
//! ## Wiring
//!
//! ```rust,no_run
//! use walkassist::prelude::*;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = load_config(None, None)?;
//! let engine = Engine::new(&config.server);
//! engine.rebuild(config.endpoint_groups.clone())?;
//!
//! let estimator = MotionEstimator::new(
//!     EstimatorConfig::from(&config.motion),
//!     Box::new(LoggingKeyActions),
//! );
//! connect_motion_input(&engine, estimator.input());
//!
//! engine.start(None, None).await?;
//! tokio::spawn(estimator.run(std::future::pending::<()>()));
//! # Ok(())
//! # }
//! ```

pub use walkassist_config as config;
pub use walkassist_io as io;
pub use walkassist_motion as motion;
pub use walkassist_observability as observability;

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used items
pub mod prelude {
    pub use walkassist_config::{
        load_config, Component, Endpoint, EndpointGroup, MotionConfig, ServerConfig, ValueType,
        WalkAssistConfig,
    };
    pub use walkassist_io::{Engine, EngineError, LifecycleState, OutputReading, SubscriberId};
    pub use walkassist_motion::{
        connect_motion_input, EstimatorConfig, KeyActions, LoggingKeyActions, MotionControls,
        MotionEstimator, MotionSnapshot,
    };
}
