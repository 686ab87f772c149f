// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Notification bus
//!
//! Callback registries for the three events UI collaborators care about:
//! server status, bound address and completed readings. Subscribers are keyed by
//! a stable [`SubscriberId`], so registering the same id twice or removing an
//! unknown id are both no-ops.

use crate::core::types::OutputReading;
use parking_lot::RwLock;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

static ANONYMOUS_SUBSCRIBERS: AtomicU64 = AtomicU64::new(0);

/// Stable identity of a subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// A fresh id that never collides with another `unique()` id
    pub fn unique() -> Self {
        let n = ANONYMOUS_SUBSCRIBERS.fetch_add(1, Ordering::Relaxed);
        Self(format!("subscriber-{}", n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubscriberId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SubscriberId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered callback registry for one event type.
///
/// Callbacks run in registration order. A panicking callback is caught and
/// logged; the remaining callbacks still run.
pub struct Signal<T> {
    name: &'static str,
    listeners: RwLock<Vec<(SubscriberId, Callback<T>)>>,
}

impl<T> Signal<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register `callback` under `id`. Returns `false` (and keeps the existing
    /// callback) if `id` is already registered.
    pub fn connect<F>(&self, id: impl Into<SubscriberId>, callback: F) -> bool
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = id.into();
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|(existing, _)| *existing == id) {
            return false;
        }
        listeners.push((id, Arc::new(callback)));
        true
    }

    /// Returns `false` if `id` was not registered.
    pub fn disconnect(&self, id: &SubscriberId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| existing != id);
        listeners.len() != before
    }

    pub fn is_connected(&self, id: &SubscriberId) -> bool {
        self.listeners.read().iter().any(|(existing, _)| existing == id)
    }

    pub fn emit(&self, value: &T) {
        // Snapshot so callbacks may (un)register without deadlocking
        let snapshot: Vec<(SubscriberId, Callback<T>)> = self.listeners.read().clone();

        for (id, callback) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
                error!(
                    "[NOTIFY] {} subscriber '{}' panicked; continuing with remaining subscribers",
                    self.name, id
                );
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn disconnect_all(&self) {
        self.listeners.write().clear();
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read();
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field(
                "subscribers",
                &listeners.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Status, bound-address and message registries
#[derive(Debug)]
pub struct NotificationBus {
    status: Signal<bool>,
    bind_address: Signal<String>,
    message: Signal<OutputReading>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            status: Signal::new("status"),
            bind_address: Signal::new("bind-address"),
            message: Signal::new("message"),
        }
    }

    pub fn on_status_change<F>(&self, id: impl Into<SubscriberId>, callback: F) -> bool
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.status.connect(id, callback)
    }

    /// Callback receives `"address:port"`
    pub fn on_bind_address_change<F>(&self, id: impl Into<SubscriberId>, callback: F) -> bool
    where
        F: Fn(&String) + Send + Sync + 'static,
    {
        self.bind_address.connect(id, callback)
    }

    pub fn on_message<F>(&self, id: impl Into<SubscriberId>, callback: F) -> bool
    where
        F: Fn(&OutputReading) + Send + Sync + 'static,
    {
        self.message.connect(id, callback)
    }

    pub fn remove_status_callback(&self, id: &SubscriberId) -> bool {
        self.status.disconnect(id)
    }

    pub fn remove_bind_address_callback(&self, id: &SubscriberId) -> bool {
        self.bind_address.disconnect(id)
    }

    pub fn remove_message_callback(&self, id: &SubscriberId) -> bool {
        self.message.disconnect(id)
    }

    pub fn notify_status(&self, running: bool) {
        self.status.emit(&running);
    }

    pub fn notify_bind_address(&self, address: &str) {
        self.bind_address.emit(&address.to_string());
    }

    pub fn notify_message(&self, reading: &OutputReading) {
        self.message.emit(reading);
    }

    pub fn message_subscribers(&self) -> usize {
        self.message.listener_count()
    }
}
