// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core types shared by the routing table, aggregator and server:
//! - Error types
//! - Typed readings and aggregated outputs
//! - Notification bus

pub mod signal;
pub mod types;

pub use signal::{NotificationBus, Signal, SubscriberId};
pub use types::{
    ComponentValue, DecodeError, EngineError, LifecycleState, OutputReading, Result,
    TypedReading,
};
