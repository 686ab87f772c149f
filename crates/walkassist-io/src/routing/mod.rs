// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Routing table and dispatch
//!
//! A [`RoutingTable`] is built wholesale from the endpoint-group configuration and
//! maps each OSC address to the ordered list of handlers registered for it. The
//! [`Dispatcher`] owns the live table behind a single lock: dispatch holds the
//! read side for the whole lookup + invoke, and installing a new table takes the
//! write side, so a message sees either the old table or the new one.

pub mod aggregator;

use crate::core::{NotificationBus, TypedReading};
use crate::decode::decode;
use crate::rate_limit::RateLimiter;
use aggregator::{run_consumer, Binding, LatestValueQueue, PendingOutputs};
use parking_lot::RwLock;
use rosc::{OscPacket, OscType};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use walkassist_config::{EndpointGroup, ValueType};

/// Decoder-backed handler feeding one (endpoint, group) queue
#[derive(Debug)]
pub struct EndpointHandler {
    pub group_id: u32,
    pub endpoint_id: u32,
    pub output_key: String,
    pub value_type: ValueType,
    queue: Arc<LatestValueQueue<TypedReading>>,
}

impl EndpointHandler {
    fn handle(&self, address: &str, args: &[OscType]) {
        match decode(self.value_type, args) {
            Ok(reading) => {
                if self.queue.push(reading) {
                    debug!(
                        "[OSC-SERVER] {} -> {}: replaced unconsumed reading",
                        address, self.output_key
                    );
                }
            }
            Err(e) => debug!("[OSC-SERVER] {} dropped for {}: {}", address, self.output_key, e),
        }
    }
}

#[derive(Debug)]
pub enum RouteHandler {
    Endpoint(EndpointHandler),
    /// Logs the message; used when no group configuration exists
    Debug,
}

/// Resolved view of one endpoint, for UI listing
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescription {
    pub endpoint_id: u32,
    pub resource: String,
    pub value_type: ValueType,
    pub bind: String,
}

/// Resolved view of one group's output
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDescription {
    pub group_id: u32,
    pub output_key: String,
    pub value_type: ValueType,
    pub endpoints: Vec<EndpointDescription>,
}

/// One generation of handlers plus the consumer tasks serving them.
///
/// Dropping the table aborts its consumers.
#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: HashMap<String, Vec<RouteHandler>>,
    outputs: Vec<OutputDescription>,
    pending: PendingOutputs,
    consumers: Vec<JoinHandle<()>>,
}

impl RoutingTable {
    /// Build handlers for every endpoint and spawn one consumer per queue on `runtime`.
    pub fn build(groups: &[EndpointGroup], bus: &Arc<NotificationBus>, runtime: &Handle) -> Self {
        let mut table = RoutingTable::default();

        for (index, group) in groups.iter().enumerate() {
            let output_key = group.output_key(index);
            let required = group.value_type.required_components();
            let mut description = OutputDescription {
                group_id: group.id,
                output_key: output_key.clone(),
                value_type: group.value_type,
                endpoints: Vec::new(),
            };

            for endpoint in &group.endpoints {
                let resource = endpoint.resource.trim();
                if resource.is_empty() {
                    warn!(
                        "[OSC-SERVER] Endpoint {} in group {} has no resource, skipping",
                        endpoint.id, group.id
                    );
                    continue;
                }

                let value_type = endpoint.effective_value_type(group.value_type);
                let bind = endpoint.effective_bind(value_type);
                let queue = Arc::new(LatestValueQueue::new());

                let binding = Binding {
                    output_key: output_key.clone(),
                    bind: bind.clone(),
                    required: required.clone(),
                };
                table.consumers.push(runtime.spawn(run_consumer(
                    Arc::clone(&queue),
                    binding,
                    table.pending.clone(),
                    Arc::clone(bus),
                )));

                table
                    .routes
                    .entry(resource.to_string())
                    .or_default()
                    .push(RouteHandler::Endpoint(EndpointHandler {
                        group_id: group.id,
                        endpoint_id: endpoint.id,
                        output_key: output_key.clone(),
                        value_type,
                        queue,
                    }));

                description.endpoints.push(EndpointDescription {
                    endpoint_id: endpoint.id,
                    resource: resource.to_string(),
                    value_type,
                    bind: bind.iter().flatten().map(|c| c.letter()).collect(),
                });
            }

            table.outputs.push(description);
        }

        table
    }

    /// Table with only the debug handler mapped at `address`
    pub fn debug_only(address: &str) -> Self {
        let mut table = RoutingTable::default();
        table
            .routes
            .insert(address.to_string(), vec![RouteHandler::Debug]);
        table
    }

    pub fn handler_count(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Registered addresses with their handler counts, sorted by address
    pub fn routes(&self) -> Vec<(String, usize)> {
        let mut routes: Vec<(String, usize)> = self
            .routes
            .iter()
            .map(|(address, handlers)| (address.clone(), handlers.len()))
            .collect();
        routes.sort();
        routes
    }

    pub fn outputs(&self) -> &[OutputDescription] {
        &self.outputs
    }

    pub fn pending(&self) -> &PendingOutputs {
        &self.pending
    }

    /// Abort this generation's consumer tasks
    pub fn shutdown(&mut self) {
        for consumer in self.consumers.drain(..) {
            consumer.abort();
        }
    }
}

impl Drop for RoutingTable {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Composite dispatch over the live routing table
#[derive(Debug)]
pub struct Dispatcher {
    table: RwLock<RoutingTable>,
    limiter: Arc<RateLimiter>,
    debug_enabled: AtomicBool,
}

impl Dispatcher {
    pub fn new(limiter: Arc<RateLimiter>, debug_enabled: bool) -> Self {
        Self {
            table: RwLock::new(RoutingTable::default()),
            limiter,
            debug_enabled: AtomicBool::new(debug_enabled),
        }
    }

    /// Swap in `table`; the previous generation's consumers are aborted.
    pub fn install(&self, table: RoutingTable) {
        let previous = std::mem::replace(&mut *self.table.write(), table);
        info!(
            "[OSC-SERVER] Routing table installed ({} previous consumer(s) retired)",
            previous.consumer_count()
        );
        drop(previous);
    }

    pub fn clear(&self) {
        self.install(RoutingTable::default());
    }

    pub fn set_debug(&self, enabled: bool) {
        self.debug_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug_enabled.load(Ordering::Relaxed)
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run `f` against the live table
    pub fn with_table<R>(&self, f: impl FnOnce(&RoutingTable) -> R) -> R {
        f(&self.table.read())
    }

    /// Invoke every handler registered for `address`, in registration order.
    ///
    /// Addresses with no handler are ignored without touching the rate
    /// limiter. Otherwise the message is admitted (or dropped) once, before any
    /// handler decodes it. Returns the number of handlers invoked.
    pub fn dispatch(&self, address: &str, args: &[OscType]) -> usize {
        let table = self.table.read();
        let handlers = table.routes.get(address);
        let debug_all = self.debug_enabled();

        if handlers.is_none() && !debug_all {
            return 0;
        }
        if !self.limiter.allow() {
            return 0;
        }

        let mut logged = false;
        if debug_all {
            log_message(address, args);
            logged = true;
        }

        let Some(handlers) = handlers else {
            return 0;
        };
        for handler in handlers {
            match handler {
                RouteHandler::Endpoint(endpoint) => endpoint.handle(address, args),
                RouteHandler::Debug if !logged => {
                    log_message(address, args);
                    logged = true;
                }
                RouteHandler::Debug => {}
            }
        }
        handlers.len()
    }

    /// Dispatch a decoded packet, flattening bundles
    pub fn dispatch_packet(&self, packet: OscPacket) {
        match packet {
            OscPacket::Message(message) => {
                self.dispatch(&message.addr, &message.args);
            }
            OscPacket::Bundle(bundle) => {
                for inner in bundle.content {
                    self.dispatch_packet(inner);
                }
            }
        }
    }
}

fn log_message(address: &str, args: &[OscType]) {
    info!("[OSC-DEBUG] {}", format_debug_line(address, args));
}

/// Address padded to 32 columns, then each argument: numbers as `{:8.3}`,
/// blobs as hex
pub fn format_debug_line(address: &str, args: &[OscType]) -> String {
    let mut line = format!("{:32}", address);
    for arg in args {
        let _ = match arg {
            OscType::Float(v) => write!(line, " {:8.3}", v),
            OscType::Double(v) => write!(line, " {:8.3}", v),
            OscType::Int(v) => write!(line, " {:8.3}", f64::from(*v)),
            OscType::Long(v) => write!(line, " {:8.3}", *v as f64),
            OscType::Blob(bytes) => {
                line.push(' ');
                for byte in bytes {
                    let _ = write!(line, "{:02x}", byte);
                }
                Ok(())
            }
            OscType::String(s) => write!(line, " {}", s),
            OscType::Bool(b) => write!(line, " {}", b),
            other => write!(line, " {:?}", other),
        };
    }
    line
}
