// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later tiers winning:
//! 1. TOML file (or built-in defaults when no file exists)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{validate_config, ConfigError, ConfigResult, WalkAssistConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default configuration file name searched in the working directory
pub const CONFIG_FILE_NAME: &str = "walkassist.toml";

/// Find the walkassist configuration file
///
/// Search order:
/// 1. `WALKASSIST_CONFIG_PATH` environment variable
/// 2. Current working directory: `./walkassist.toml`
///
/// Returns `Ok(None)` when no file exists in the default location.
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if `WALKASSIST_CONFIG_PATH` names a missing file
pub fn find_config_file() -> ConfigResult<Option<PathBuf>> {
    if let Ok(env_path) = env::var("WALKASSIST_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by WALKASSIST_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let candidate = env::current_dir()?.join(CONFIG_FILE_NAME);
    if candidate.exists() {
        Ok(Some(candidate))
    } else {
        Ok(None)
    }
}

/// Load configuration
///
/// # Arguments
///
/// * `config_path` - Optional explicit path. If `None`, the file is searched for and
///   built-in defaults are used when none is found.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if an explicit file is missing, contains invalid TOML, or fails validation
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<WalkAssistConfig> {
    let config_file = match config_path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()));
            }
            Some(path.to_path_buf())
        }
        None => find_config_file()?,
    };

    let mut config = match config_file {
        Some(path) => {
            info!("[CONFIG] Loading config file: {}", path.display());
            let content = fs::read_to_string(&path)?;
            toml::from_str::<WalkAssistConfig>(&content)?
        }
        None => {
            info!("[CONFIG] No {} found, using built-in defaults", CONFIG_FILE_NAME);
            WalkAssistConfig::default()
        }
    };

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    validate_config(&config)?;

    debug!(
        "[CONFIG] Loaded {} endpoint group(s)",
        config.endpoint_groups.len()
    );
    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    let lowered = value.to_lowercase();
    lowered == "true" || lowered == "1" || lowered == "yes"
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `WALKASSIST_BIND_ADDRESS` -> `server.bind_address`
/// - `WALKASSIST_BIND_PORT` -> `server.bind_port`
/// - `WALKASSIST_RATE_LIMIT_HZ` -> `server.rate_limit_hz`
/// - `WALKASSIST_DEBUG_MODE` -> `server.debug`
pub fn apply_environment_overrides(config: &mut WalkAssistConfig) {
    if let Ok(value) = env::var("WALKASSIST_BIND_ADDRESS") {
        config.server.bind_address = value;
    }
    if let Ok(value) = env::var("WALKASSIST_BIND_PORT") {
        if let Ok(port) = value.parse::<u16>() {
            config.server.bind_port = port;
        }
    }
    if let Ok(value) = env::var("WALKASSIST_RATE_LIMIT_HZ") {
        if let Ok(hz) = value.parse::<f64>() {
            config.server.rate_limit_hz = hz;
        }
    }
    if let Ok(value) = env::var("WALKASSIST_DEBUG_MODE") {
        config.server.debug = parse_flag(&value);
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - e.g. `{"bind_address": "127.0.0.1", "bind_port": "9001"}`
pub fn apply_cli_overrides(config: &mut WalkAssistConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("bind_address") {
        config.server.bind_address = value.clone();
    }
    if let Some(value) = cli_args.get("bind_port") {
        if let Ok(port) = value.parse::<u16>() {
            config.server.bind_port = port;
        }
    }
    if let Some(value) = cli_args.get("rate_limit_hz") {
        if let Ok(hz) = value.parse::<f64>() {
            config.server.rate_limit_hz = hz;
        }
    }
    if let Some(value) = cli_args.get("debug") {
        config.server.debug = parse_flag(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueType;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom.toml");
        File::create(&config_path).unwrap();

        env::set_var("WALKASSIST_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("WALKASSIST_CONFIG_PATH");

        assert_eq!(result.unwrap(), Some(config_path));
    }

    #[test]
    fn test_find_config_file_env_var_missing() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("WALKASSIST_CONFIG_PATH", "/definitely/not/here.toml");
        let result = find_config_file();
        env::remove_var("WALKASSIST_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_groups_from_file() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[server]").unwrap();
        writeln!(file, "bind_port = 9100").unwrap();
        writeln!(file, "[motion]").unwrap();
        writeln!(file, "walk_threshold = 120.0").unwrap();
        writeln!(file, "[[endpoint_groups]]").unwrap();
        writeln!(file, "id = 0").unwrap();
        writeln!(file, "alias = \"Default\"").unwrap();
        writeln!(file, "value_type = \"vector3\"").unwrap();
        writeln!(file, "[[endpoint_groups.endpoints]]").unwrap();
        writeln!(file, "id = 0").unwrap();
        writeln!(file, "resource = \"/gx\"").unwrap();
        writeln!(file, "value_type = \"float\"").unwrap();
        writeln!(file, "bind = \"x\"").unwrap();
        writeln!(file, "[[endpoint_groups.endpoints]]").unwrap();
        writeln!(file, "id = 1").unwrap();
        writeln!(file, "resource = \"/gyz\"").unwrap();
        writeln!(file, "value_type = \"vector2\"").unwrap();
        writeln!(file, "bind = \"yz\"").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.server.bind_port, 9100);
        assert_eq!(config.server.rate_limit_hz, 60.0);
        assert_eq!(config.motion.walk_threshold, 120.0);
        assert_eq!(config.motion.run_threshold, 400.0);
        let group = config.default_group().unwrap();
        assert_eq!(group.endpoints.len(), 2);
        assert_eq!(group.endpoints[1].value_type, Some(ValueType::Vector2));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("nope.toml")), None);
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[server\nbind_port = ").unwrap();

        let result = load_config(Some(&config_path), None);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = WalkAssistConfig::default();

        env::set_var("WALKASSIST_BIND_ADDRESS", "192.168.1.100");
        env::set_var("WALKASSIST_BIND_PORT", "9999");
        env::set_var("WALKASSIST_DEBUG_MODE", "yes");

        apply_environment_overrides(&mut config);

        env::remove_var("WALKASSIST_BIND_ADDRESS");
        env::remove_var("WALKASSIST_BIND_PORT");
        env::remove_var("WALKASSIST_DEBUG_MODE");

        assert_eq!(config.server.bind_address, "192.168.1.100");
        assert_eq!(config.server.bind_port, 9999);
        assert!(config.server.debug);
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[server]").unwrap();
        writeln!(file, "bind_address = \"10.0.0.5\"").unwrap();
        writeln!(file, "rate_limit_hz = 30.0").unwrap();

        env::set_var("WALKASSIST_BIND_ADDRESS", "10.0.0.6");
        env::set_var("WALKASSIST_RATE_LIMIT_HZ", "45");

        let mut cli_args = HashMap::new();
        cli_args.insert("bind_address".to_string(), "127.0.0.1".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();

        env::remove_var("WALKASSIST_BIND_ADDRESS");
        env::remove_var("WALKASSIST_RATE_LIMIT_HZ");

        // CLI wins for address, env wins for rate (no CLI override)
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.server.rate_limit_hz, 45.0);
    }
}
