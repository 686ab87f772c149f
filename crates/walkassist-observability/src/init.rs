// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Console logging initialization

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

/// Install the global console subscriber
///
/// `RUST_LOG`, when set, takes precedence over the debug flags. Fails if a
/// global subscriber is already installed; use [`try_init_logging`] where that
/// is expected (tests, embedding).
pub fn init_logging(debug_flags: &CrateDebugFlags) -> Result<()> {
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .with_context(|| format!("Invalid RUST_LOG filter: {}", directives))?,
        _ => EnvFilter::try_new(debug_flags.to_filter_string())
            .context("Invalid debug flag filter")?,
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(debug_flags.any_enabled())
        .with_file(false)
        .with_line_number(false)
        .with_filter(env_filter);

    Registry::default()
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Like [`init_logging`] but ignores an already-installed subscriber
pub fn try_init_logging(debug_flags: &CrateDebugFlags) {
    let _ = init_logging(debug_flags);
}
