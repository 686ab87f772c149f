// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core types used across all io modules

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use walkassist_config::{Component, ValueType};

/// Server lifecycle: Stopped -> Starting -> Running -> Stopping -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by engine operations
///
/// Per-message problems (decode failures, rate-limit drops) never show up here;
/// they are logged and counted where they happen.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("OSC server is already {0}; stop it first")]
    AlreadyRunning(LifecycleState),
    #[error("Failed to bind OSC listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Endpoint group 0 (Default) is missing")]
    MissingDefaultGroup,
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),
    #[error("OSC server start was cancelled by a concurrent stop")]
    StartCancelled,
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Malformed argument list for a declared value type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("{value_type} expects {expected} argument(s), got {actual}")]
    Arity {
        value_type: ValueType,
        expected: usize,
        actual: usize,
    },
    #[error("argument {index} ({found}) is not a valid {value_type} value")]
    InvalidArgument {
        value_type: ValueType,
        index: usize,
        found: String,
    },
}

/// One decoded component value
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl ComponentValue {
    /// Numeric view; booleans map to 0/1, text has none
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ComponentValue::Float(v) => Some(*v),
            ComponentValue::Int(v) => Some(*v as f64),
            ComponentValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            ComponentValue::Text(_) => None,
        }
    }
}

impl fmt::Display for ComponentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentValue::Float(v) => write!(f, "{}", v),
            ComponentValue::Int(v) => write!(f, "{}", v),
            ComponentValue::Bool(v) => write!(f, "{}", v),
            ComponentValue::Text(v) => f.write_str(v),
        }
    }
}

/// A decoded message, shaped by its declared value type
#[derive(Debug, Clone, PartialEq)]
pub enum TypedReading {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
    Vector2([f64; 2]),
    Vector3([f64; 3]),
    Vector4([f64; 4]),
}

impl TypedReading {
    pub fn value_type(&self) -> ValueType {
        match self {
            TypedReading::Float(_) => ValueType::Float,
            TypedReading::Int(_) => ValueType::Int,
            TypedReading::Bool(_) => ValueType::Bool,
            TypedReading::Text(_) => ValueType::String,
            TypedReading::Vector2(_) => ValueType::Vector2,
            TypedReading::Vector3(_) => ValueType::Vector3,
            TypedReading::Vector4(_) => ValueType::Vector4,
        }
    }

    /// Positional values, index 0 first
    pub fn components(&self) -> Vec<ComponentValue> {
        match self {
            TypedReading::Float(v) => vec![ComponentValue::Float(*v)],
            TypedReading::Int(v) => vec![ComponentValue::Int(*v)],
            TypedReading::Bool(v) => vec![ComponentValue::Bool(*v)],
            TypedReading::Text(v) => vec![ComponentValue::Text(v.clone())],
            TypedReading::Vector2(v) => v.iter().copied().map(ComponentValue::Float).collect(),
            TypedReading::Vector3(v) => v.iter().copied().map(ComponentValue::Float).collect(),
            TypedReading::Vector4(v) => v.iter().copied().map(ComponentValue::Float).collect(),
        }
    }
}

/// A complete aggregated reading, delivered to message subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct OutputReading {
    /// Group alias, or `output_<index>` for unnamed groups
    pub output: String,
    pub components: BTreeMap<Component, ComponentValue>,
}

impl OutputReading {
    pub fn new(output: impl Into<String>, components: BTreeMap<Component, ComponentValue>) -> Self {
        Self {
            output: output.into(),
            components,
        }
    }

    pub fn get(&self, component: Component) -> Option<&ComponentValue> {
        self.components.get(&component)
    }

    pub fn x(&self) -> Option<f64> {
        self.get(Component::X).and_then(ComponentValue::as_f64)
    }

    pub fn y(&self) -> Option<f64> {
        self.get(Component::Y).and_then(ComponentValue::as_f64)
    }

    pub fn z(&self) -> Option<f64> {
        self.get(Component::Z).and_then(ComponentValue::as_f64)
    }

    pub fn w(&self) -> Option<f64> {
        self.get(Component::W).and_then(ComponentValue::as_f64)
    }

    /// The single value of a scalar output
    pub fn value(&self) -> Option<&ComponentValue> {
        if self.components.len() == 1 {
            self.get(Component::X)
        } else {
            None
        }
    }

    /// Squared magnitude `x² + y² + z²`; `None` unless all three are numeric
    pub fn magnitude(&self) -> Option<f64> {
        let (x, y, z) = (self.x()?, self.y()?, self.z()?);
        Some(x * x + y * y + z * z)
    }
}
