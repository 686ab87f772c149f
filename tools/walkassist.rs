// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! walkassist server: OSC ingest -> motion estimator -> walk/run keys

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use walkassist::prelude::*;
use walkassist::observability::{debug_flags_help, init_logging, CrateDebugFlags};

/// Walk/run key assistant driven by an OSC accelerometer stream
#[derive(Parser, Debug)]
#[command(name = "walkassist", version, author, long_about = None, after_help = debug_flags_help())]
struct Args {
    /// Path to walkassist.toml (default: $WALKASSIST_CONFIG_PATH or ./walkassist.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface to listen on (default: auto-detect)
    #[arg(long)]
    bind_address: Option<String>,

    /// UDP port to listen on
    #[arg(long)]
    bind_port: Option<u16>,

    /// Global admission limit in messages/second
    #[arg(long)]
    rate_limit: Option<f64>,

    /// Log every incoming OSC message
    #[arg(long, default_value_t = false)]
    debug: bool,
}

/// Split `--debug-<crate>` flags out before clap sees them
fn split_debug_flags() -> (Vec<String>, CrateDebugFlags) {
    let (debug, rest): (Vec<String>, Vec<String>) =
        std::env::args().partition(|arg| arg.starts_with("--debug-"));
    let mut flags = CrateDebugFlags::from_args(debug);
    if let Ok(value) = std::env::var("WALKASSIST_DEBUG") {
        flags.merge_env_value(&value);
    }
    (rest, flags)
}

fn cli_overrides(args: &Args) -> HashMap<String, String> {
    let mut overrides = HashMap::new();
    if let Some(address) = &args.bind_address {
        overrides.insert("bind_address".to_string(), address.clone());
    }
    if let Some(port) = args.bind_port {
        overrides.insert("bind_port".to_string(), port.to_string());
    }
    if let Some(rate) = args.rate_limit {
        overrides.insert("rate_limit_hz".to_string(), rate.to_string());
    }
    if args.debug {
        overrides.insert("debug".to_string(), "true".to_string());
    }
    overrides
}

#[tokio::main]
async fn main() -> Result<()> {
    let (argv, debug_flags) = split_debug_flags();
    let args = Args::parse_from(argv);
    init_logging(&debug_flags)?;

    print_banner();

    let config = load_config(args.config.as_deref(), Some(&cli_overrides(&args)))
        .context("Failed to load configuration")?;

    let engine = Engine::new(&config.server);
    engine
        .rebuild(config.endpoint_groups.clone())
        .context("Failed to build routing table")?;
    for output in engine.group_outputs() {
        info!(
            "  Output '{}' ({}) <- {} endpoint(s)",
            output.output_key,
            output.value_type.label(),
            output.endpoints.len()
        );
    }

    let estimator = MotionEstimator::new(
        EstimatorConfig::from(&config.motion),
        Box::new(LoggingKeyActions),
    );
    connect_motion_input(&engine, estimator.input());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let estimator_task = tokio::spawn(estimator.run(async move {
        let _ = stop_rx.await;
    }));

    if config.server.auto_start {
        let bound = engine
            .start(None, None)
            .await
            .context("Failed to start OSC server")?;
        info!("Send OSC to {} (Ctrl-C to stop)", bound);
    } else {
        warn!("server.auto_start is false; OSC server not started");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down...");

    engine.stop();
    let _ = stop_tx.send(());
    if let Err(e) = estimator_task.await {
        error!("Motion estimator task failed: {}", e);
    }

    info!("Dropped by rate limit: {}", engine.dropped_messages());
    Ok(())
}

fn print_banner() {
    info!("walkassist v{}", walkassist::VERSION);
}
