// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines the structs that map to sections in `walkassist.toml`
//! together with the value-type and component vocabulary shared by the engine.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Group id reserved for the distinguished "Default" group.
pub const DEFAULT_GROUP_ID: u32 = 0;

/// One component letter of an aggregated reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    X,
    Y,
    Z,
    W,
}

impl Component {
    /// All components in positional order
    pub const ALL: [Component; 4] = [Component::X, Component::Y, Component::Z, Component::W];

    pub fn letter(self) -> char {
        match self {
            Component::X => 'x',
            Component::Y => 'y',
            Component::Z => 'z',
            Component::W => 'w',
        }
    }

    /// Parse a bind letter (case-insensitive)
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_lowercase() {
            'x' => Some(Component::X),
            'y' => Some(Component::Y),
            'z' => Some(Component::Z),
            'w' => Some(Component::W),
            _ => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Declared value type of a group or endpoint.
///
/// Serialized as the lowercase keyword (`"vector3"`); parsing also accepts the
/// long-form aliases (`"integer"`, `"boolean"`, `"str"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueType {
    Float,
    Int,
    Bool,
    String,
    Vector2,
    Vector3,
    Vector4,
}

impl ValueType {
    pub const ALL: [ValueType; 7] = [
        ValueType::Float,
        ValueType::Int,
        ValueType::Bool,
        ValueType::String,
        ValueType::Vector2,
        ValueType::Vector3,
        ValueType::Vector4,
    ];

    /// Config keyword
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Float => "float",
            ValueType::Int => "int",
            ValueType::Bool => "bool",
            ValueType::String => "string",
            ValueType::Vector2 => "vector2",
            ValueType::Vector3 => "vector3",
            ValueType::Vector4 => "vector4",
        }
    }

    /// Human-readable label for UI collaborators
    pub fn label(&self) -> &'static str {
        match self {
            ValueType::Float => "Float",
            ValueType::Int => "Int",
            ValueType::Bool => "Boolean",
            ValueType::String => "String",
            ValueType::Vector2 => "Vector 2",
            ValueType::Vector3 => "Vector 3",
            ValueType::Vector4 => "Vector 4",
        }
    }

    /// Number of positional arguments a message of this type carries
    pub fn arity(&self) -> usize {
        match self {
            ValueType::Vector2 => 2,
            ValueType::Vector3 => 3,
            ValueType::Vector4 => 4,
            _ => 1,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.arity() == 1
    }

    /// Bind string used when an endpoint does not declare one
    pub fn default_bind(&self) -> &'static str {
        &"xyzw"[..self.arity()]
    }

    /// Components that must all be present before a reading of this type is complete
    pub fn required_components(&self) -> BTreeSet<Component> {
        Component::ALL.iter().copied().take(self.arity()).collect()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "float" => Ok(ValueType::Float),
            "int" | "integer" => Ok(ValueType::Int),
            "bool" | "boolean" => Ok(ValueType::Bool),
            "string" | "str" => Ok(ValueType::String),
            "vector2" => Ok(ValueType::Vector2),
            "vector3" => Ok(ValueType::Vector3),
            "vector4" => Ok(ValueType::Vector4),
            other => Err(ConfigError::UnknownValueType(other.to_string())),
        }
    }
}

impl TryFrom<String> for ValueType {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ValueType> for String {
    fn from(value: ValueType) -> Self {
        value.as_str().to_string()
    }
}

/// A single OSC address contributing components to a group's output
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Endpoint {
    pub id: u32,
    #[serde(default)]
    pub alias: String,
    /// OSC address, e.g. `/accelerometer`
    #[serde(default)]
    pub resource: String,
    /// Falls back to the owning group's type when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    /// Ordered component letters this endpoint contributes (e.g. `"yz"`)
    #[serde(default)]
    pub bind: String,
}

impl Endpoint {
    pub fn new(id: u32, alias: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            id,
            alias: alias.into(),
            resource: resource.into(),
            value_type: None,
            bind: String::new(),
        }
    }

    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    pub fn effective_value_type(&self, group_type: ValueType) -> ValueType {
        self.value_type.unwrap_or(group_type)
    }

    /// Positional component mapping for this endpoint.
    ///
    /// An empty bind falls back to the value type's default letters. Letters
    /// outside `{x,y,z,w}` yield `None` at their position so later positions
    /// keep their alignment.
    pub fn effective_bind(&self, value_type: ValueType) -> Vec<Option<Component>> {
        let bind = if self.bind.trim().is_empty() {
            value_type.default_bind()
        } else {
            self.bind.trim()
        };
        bind.chars().map(Component::from_letter).collect()
    }
}

/// A named collection of endpoints aggregated into one output
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EndpointGroup {
    pub id: u32,
    #[serde(default)]
    pub alias: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

impl EndpointGroup {
    pub fn new(id: u32, alias: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            id,
            alias: alias.into(),
            value_type,
            endpoints: Vec::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_GROUP_ID
    }

    /// Aggregation bucket name: the alias, or `output_<index>` when unnamed
    pub fn output_key(&self, index: usize) -> String {
        if self.alias.is_empty() {
            format!("output_{}", index)
        } else {
            self.alias.clone()
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalkAssistConfig {
    pub server: ServerConfig,
    pub motion: MotionConfig,
    pub endpoint_groups: Vec<EndpointGroup>,
}

impl Default for WalkAssistConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            motion: MotionConfig::default(),
            endpoint_groups: default_endpoint_groups(),
        }
    }
}

impl WalkAssistConfig {
    /// The group feeding the motion estimator (id 0)
    pub fn default_group(&self) -> Option<&EndpointGroup> {
        self.endpoint_groups.iter().find(|g| g.is_default())
    }
}

/// Built-in group list: one VECTOR3 "Default" group reading `/accelerometer`
pub fn default_endpoint_groups() -> Vec<EndpointGroup> {
    vec![EndpointGroup::new(DEFAULT_GROUP_ID, "Default", ValueType::Vector3).with_endpoint(
        Endpoint::new(0, "primary", "/accelerometer")
            .with_value_type(ValueType::Vector3)
            .with_bind("xyz"),
    )]
}

/// OSC server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Empty string = auto-detect the outbound-routable interface
    pub bind_address: String,
    pub bind_port: u16,
    pub auto_start: bool,
    /// Global admission limit across all endpoints (messages/second)
    pub rate_limit_hz: f64,
    /// Map a wildcard debug handler that logs every incoming message
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::new(),
            bind_port: 9000,
            auto_start: true,
            rate_limit_hz: 60.0,
            debug: false,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> Option<&str> {
        let trimmed = self.bind_address.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

/// Motion estimator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Seconds; also the walk release delay
    pub input_smoothing: f64,
    pub walk_threshold: f64,
    pub run_threshold: f64,
    pub walk_keys: Vec<String>,
    pub run_keys: Vec<String>,
    pub keybinds_enabled: bool,
    pub tick_ms: u64,
    pub decay_start_delay: f64,
    pub decay_tick: f64,
    pub decay_rate: f64,
    pub decay_epsilon: f64,
    pub run_release_delay: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            input_smoothing: 0.8,
            walk_threshold: 150.0,
            run_threshold: 400.0,
            walk_keys: vec!["w".to_string()],
            run_keys: vec!["shift".to_string()],
            keybinds_enabled: true,
            tick_ms: 20,
            decay_start_delay: 0.8,
            decay_tick: 0.025,
            decay_rate: 3.0,
            decay_epsilon: 0.01,
            run_release_delay: 0.5,
        }
    }
}
