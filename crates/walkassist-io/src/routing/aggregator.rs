// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-endpoint aggregation
//!
//! Each (endpoint, group) pair owns a capacity-1 latest-value queue and one
//! consumer task. The consumer merges positional values into the pending map of
//! the group's output key and emits a reading once every required component is
//! present. Partial readings are never emitted.

use crate::core::{ComponentValue, NotificationBus, OutputReading, TypedReading};
use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;
use walkassist_config::Component;

/// Single-slot queue where a push replaces any unconsumed value.
///
/// Pushing never blocks, so it is safe to call from the datagram dispatch path.
#[derive(Debug)]
pub struct LatestValueQueue<T> {
    slot: ArrayQueue<T>,
    ready: Notify,
    replaced: AtomicU64,
}

impl<T> LatestValueQueue<T> {
    pub fn new() -> Self {
        Self {
            slot: ArrayQueue::new(1),
            ready: Notify::new(),
            replaced: AtomicU64::new(0),
        }
    }

    /// Store `value`, discarding an unconsumed previous value.
    /// Returns `true` if a value was discarded.
    pub fn push(&self, value: T) -> bool {
        let displaced = self.slot.force_push(value).is_some();
        if displaced {
            self.replaced.fetch_add(1, Ordering::Relaxed);
        }
        self.ready.notify_one();
        displaced
    }

    pub fn try_pop(&self) -> Option<T> {
        self.slot.pop()
    }

    /// Wait for the next value
    pub async fn pop(&self) -> T {
        loop {
            if let Some(value) = self.slot.pop() {
                return value;
            }
            self.ready.notified().await;
        }
    }

    /// Values overwritten before the consumer saw them
    pub fn replaced(&self) -> u64 {
        self.replaced.load(Ordering::Relaxed)
    }
}

impl<T> Default for LatestValueQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial component maps keyed by output key, shared by every consumer of
/// one routing-table generation.
#[derive(Debug, Clone, Default)]
pub struct PendingOutputs {
    inner: Arc<Mutex<HashMap<String, BTreeMap<Component, ComponentValue>>>>,
}

impl PendingOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Components currently waiting for `output_key`
    pub fn pending(&self, output_key: &str) -> BTreeMap<Component, ComponentValue> {
        self.inner
            .lock()
            .get(output_key)
            .cloned()
            .unwrap_or_default()
    }
}

/// How one endpoint's positional values land in its group's output
#[derive(Debug, Clone)]
pub struct Binding {
    pub output_key: String,
    /// Component for each argument position; `None` positions are ignored
    pub bind: Vec<Option<Component>>,
    pub required: BTreeSet<Component>,
}

impl Binding {
    /// Merge `reading` into `pending`. Returns the completed output and clears
    /// its pending map once the merged key set equals the required set.
    pub fn merge(&self, pending: &PendingOutputs, reading: &TypedReading) -> Option<OutputReading> {
        let mut outputs = pending.inner.lock();
        let entry = outputs.entry(self.output_key.clone()).or_default();

        for (position, value) in reading.components().into_iter().enumerate() {
            if let Some(Some(component)) = self.bind.get(position) {
                if self.required.contains(component) {
                    entry.insert(*component, value);
                }
            }
        }

        if entry.len() == self.required.len() && entry.keys().all(|c| self.required.contains(c)) {
            let components = std::mem::take(entry);
            return Some(OutputReading::new(self.output_key.clone(), components));
        }
        None
    }
}

/// Consumer loop for one queue; runs until its task is aborted.
pub(crate) async fn run_consumer(
    queue: Arc<LatestValueQueue<TypedReading>>,
    binding: Binding,
    pending: PendingOutputs,
    bus: Arc<NotificationBus>,
) {
    loop {
        let reading = queue.pop().await;
        match binding.merge(&pending, &reading) {
            Some(output) => bus.notify_message(&output),
            None => debug!(
                "[AGGREGATOR] {} waiting on {:?}",
                binding.output_key,
                missing_components(&binding, &pending)
            ),
        }
    }
}

fn missing_components(binding: &Binding, pending: &PendingOutputs) -> Vec<Component> {
    let present = pending.pending(&binding.output_key);
    binding
        .required
        .iter()
        .filter(|c| !present.contains_key(c))
        .copied()
        .collect()
}
