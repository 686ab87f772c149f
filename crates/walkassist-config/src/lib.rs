// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # walkassist Configuration System
//!
//! Type-safe configuration for the walkassist motion bridge:
//! - Endpoint groups (which OSC addresses feed which aggregated output)
//! - Server tunables (bind address/port, global rate limit, debug handler)
//! - Motion tunables (thresholds, decay, key combinations)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use walkassist_config::load_config;
//!
//! let config = load_config(None, None).expect("Failed to load config");
//! println!("OSC port: {}", config.server.bind_port);
//! for group in &config.endpoint_groups {
//!     println!("{} ({})", group.alias, group.value_type);
//! }
//! ```
//!
//! Loading order: TOML file (or built-in defaults when no file exists), then
//! environment variables, then CLI overrides. Validation runs last.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{apply_cli_overrides, apply_environment_overrides, find_config_file, load_config};
pub use types::*;
pub use validation::{collect_bind_warnings, validate_config, ConfigValidationError};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    ParseError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Unknown value type: {0}")]
    UnknownValueType(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_default_group() {
        let config = WalkAssistConfig::default();
        assert!(config.default_group().is_some());
    }
}
