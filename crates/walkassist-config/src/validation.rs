// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Hard problems (missing Default group, duplicate ids, nonsensical thresholds) fail
//! validation. Bind problems are only warnings: the configuration still loads and the
//! offending letters are ignored during aggregation.

use crate::{Component, ConfigError, ConfigResult, EndpointGroup, WalkAssistConfig, DEFAULT_GROUP_ID};
use std::collections::HashSet;
use tracing::warn;

/// Validation findings
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingDefaultGroup,
    DuplicateGroupId { id: u32 },
    DuplicateEndpointId { group: u32, id: u32 },
    MissingResource { group: u32, endpoint: u32 },
    InvalidBind { resource: String, bind: String, reason: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDefaultGroup => {
                write!(f, "Endpoint group {} (Default) is missing", DEFAULT_GROUP_ID)
            }
            Self::DuplicateGroupId { id } => write!(f, "Duplicate endpoint group id {}", id),
            Self::DuplicateEndpointId { group, id } => {
                write!(f, "Duplicate endpoint id {} in group {}", id, group)
            }
            Self::MissingResource { group, endpoint } => {
                write!(
                    f,
                    "Endpoint {} in group {} has no resource and will be skipped",
                    endpoint, group
                )
            }
            Self::InvalidBind {
                resource,
                bind,
                reason,
            } => write!(f, "Endpoint {} bind '{}' {}", resource, bind, reason),
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Presence of the Default group (id 0)
/// - Unique group ids and unique endpoint ids per group
/// - Positive thresholds and timing values, run threshold not below walk
///
/// Bind and resource problems are logged as warnings and do not fail validation.
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every hard failure
pub fn validate_config(config: &WalkAssistConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_groups(&config.endpoint_groups, &mut errors);
    validate_value_ranges(config, &mut errors);

    for warning in collect_bind_warnings(&config.endpoint_groups) {
        warn!("[CONFIG] {}", warning);
    }

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_groups(groups: &[EndpointGroup], errors: &mut Vec<ConfigValidationError>) {
    if !groups.iter().any(|g| g.is_default()) {
        errors.push(ConfigValidationError::MissingDefaultGroup);
    }

    let mut group_ids = HashSet::new();
    for group in groups {
        if !group_ids.insert(group.id) {
            errors.push(ConfigValidationError::DuplicateGroupId { id: group.id });
        }

        let mut endpoint_ids = HashSet::new();
        for endpoint in &group.endpoints {
            if !endpoint_ids.insert(endpoint.id) {
                errors.push(ConfigValidationError::DuplicateEndpointId {
                    group: group.id,
                    id: endpoint.id,
                });
            }
        }
    }
}

/// Non-fatal findings: endpoints without a resource and bind strings that
/// reference letters the group never completes on.
pub fn collect_bind_warnings(groups: &[EndpointGroup]) -> Vec<ConfigValidationError> {
    let mut warnings = Vec::new();

    for group in groups {
        let required = group.value_type.required_components();

        for endpoint in &group.endpoints {
            if endpoint.resource.trim().is_empty() {
                warnings.push(ConfigValidationError::MissingResource {
                    group: group.id,
                    endpoint: endpoint.id,
                });
                continue;
            }

            let bind = endpoint.bind.trim();
            if bind.is_empty() {
                continue;
            }

            let value_type = endpoint.effective_value_type(group.value_type);
            if bind.chars().count() > value_type.arity() {
                warnings.push(ConfigValidationError::InvalidBind {
                    resource: endpoint.resource.clone(),
                    bind: bind.to_string(),
                    reason: format!(
                        "is longer than the {} arguments of type '{}'",
                        value_type.arity(),
                        value_type
                    ),
                });
            }

            let mut seen = HashSet::new();
            for letter in bind.chars() {
                match Component::from_letter(letter) {
                    Some(component) if !required.contains(&component) => {
                        warnings.push(ConfigValidationError::InvalidBind {
                            resource: endpoint.resource.clone(),
                            bind: bind.to_string(),
                            reason: format!(
                                "contains component '{}' not used by group type '{}'",
                                component, group.value_type
                            ),
                        });
                    }
                    Some(component) => {
                        if !seen.insert(component) {
                            warnings.push(ConfigValidationError::InvalidBind {
                                resource: endpoint.resource.clone(),
                                bind: bind.to_string(),
                                reason: format!("repeats component '{}'", component),
                            });
                        }
                    }
                    None => {
                        warnings.push(ConfigValidationError::InvalidBind {
                            resource: endpoint.resource.clone(),
                            bind: bind.to_string(),
                            reason: format!("contains unknown component '{}'", letter),
                        });
                    }
                }
            }
        }
    }

    warnings
}

fn validate_value_ranges(config: &WalkAssistConfig, errors: &mut Vec<ConfigValidationError>) {
    let motion = &config.motion;

    if !(config.server.rate_limit_hz > 0.0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "server.rate_limit_hz".to_string(),
            reason: "must be positive".to_string(),
        });
    }

    if !(motion.walk_threshold > 0.0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "motion.walk_threshold".to_string(),
            reason: "must be positive".to_string(),
        });
    }

    if motion.run_threshold < motion.walk_threshold {
        errors.push(ConfigValidationError::InvalidValue {
            field: "motion.run_threshold".to_string(),
            reason: "must not be below motion.walk_threshold".to_string(),
        });
    }

    if motion.input_smoothing < 0.0 || motion.run_release_delay < 0.0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "motion.input_smoothing / motion.run_release_delay".to_string(),
            reason: "release delays cannot be negative".to_string(),
        });
    }

    if motion.tick_ms == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "motion.tick_ms".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if !(motion.decay_tick > 0.0) || motion.decay_rate < 0.0 || motion.decay_start_delay < 0.0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "motion.decay_*".to_string(),
            reason: "decay_tick must be positive, decay_rate and decay_start_delay non-negative"
                .to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Endpoint, ValueType};

    #[test]
    fn test_default_config_is_valid() {
        let config = WalkAssistConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_missing_default_group() {
        let mut config = WalkAssistConfig::default();
        config.endpoint_groups[0].id = 4;

        let result = validate_config(&config);
        if let Err(ConfigError::ValidationError(msg)) = result {
            assert!(msg.contains("Default"));
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_duplicate_ids() {
        let mut config = WalkAssistConfig::default();
        let group = config.endpoint_groups[0].clone();
        config.endpoint_groups.push(group);
        config.endpoint_groups[0]
            .endpoints
            .push(Endpoint::new(0, "dup", "/dup"));

        let result = validate_config(&config);
        if let Err(ConfigError::ValidationError(msg)) = result {
            assert!(msg.contains("Duplicate endpoint group id 0"));
            assert!(msg.contains("Duplicate endpoint id 0 in group 0"));
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_run_below_walk() {
        let mut config = WalkAssistConfig::default();
        config.motion.run_threshold = 100.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_bind_warnings_do_not_fail() {
        let mut config = WalkAssistConfig::default();
        config.endpoint_groups[0].value_type = ValueType::Vector2;
        config.endpoint_groups[0].endpoints[0].bind = "xyz".to_string();

        assert!(validate_config(&config).is_ok());

        let warnings = collect_bind_warnings(&config.endpoint_groups);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].to_string().contains("component 'z'"));
    }

    #[test]
    fn test_bind_warning_kinds() {
        let group = EndpointGroup::new(0, "Default", ValueType::Vector3)
            .with_endpoint(Endpoint::new(0, "a", "/a").with_bind("xxq"))
            .with_endpoint(Endpoint::new(1, "b", "").with_bind("x"))
            .with_endpoint(
                Endpoint::new(2, "c", "/c")
                    .with_value_type(ValueType::Float)
                    .with_bind("xy"),
            );

        let warnings = collect_bind_warnings(&[group]);
        assert!(warnings
            .iter()
            .any(|w| w.to_string().contains("repeats component 'x'")));
        assert!(warnings
            .iter()
            .any(|w| w.to_string().contains("unknown component 'q'")));
        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConfigValidationError::MissingResource { endpoint: 1, .. })));
        assert!(warnings
            .iter()
            .any(|w| w.to_string().contains("longer than the 1 arguments")));
    }
}
