// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # walkassist-observability
//!
//! Logging initialization shared by the walkassist binary and tools, with
//! per-crate debug flag support (`--debug-walkassist-io`, `WALKASSIST_DEBUG`).

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known walkassist crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "walkassist",
    "walkassist-config",
    "walkassist-io",
    "walkassist-motion",
];
