// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # walkassist-io
//!
//! Turns OSC motion-sensor datagrams into complete, typed readings per configured
//! endpoint group.
//!
//! ```text
//! datagram -> rosc decode -> rate limiter -> routing table -> handler per (group, endpoint)
//!          -> latest-value queue -> aggregator -> message callbacks
//! ```
//!
//! The [`Engine`] owns one instance of every piece (routing table, pending
//! outputs, rate limiter, callback registries) and manages the UDP listener's
//! lifecycle. Multiple engines can coexist, which is how the tests use it.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod core;
pub mod decode;
pub mod rate_limit;
pub mod routing;
pub mod transports;

pub use crate::core::{
    ComponentValue, DecodeError, EngineError, LifecycleState, NotificationBus, OutputReading,
    Result, Signal, SubscriberId, TypedReading,
};
pub use decode::decode;
pub use rate_limit::RateLimiter;
pub use routing::{Dispatcher, EndpointDescription, OutputDescription, RoutingTable};
pub use transports::{detect_local_ip, OscListener};

use parking_lot::{Mutex, RwLock};
use rosc::{OscPacket, OscType};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use walkassist_config::{collect_bind_warnings, EndpointGroup, ServerConfig};

/// Address the debug handler is mapped to when no group configuration exists
pub const FALLBACK_ADDRESS: &str = "/accelerometer";

#[derive(Debug, Clone)]
struct ListenSettings {
    /// `None` = auto-detect at start
    bind_address: Option<String>,
    bind_port: u16,
}

struct EngineInner {
    settings: RwLock<ListenSettings>,
    groups: RwLock<Option<Vec<EndpointGroup>>>,
    dispatcher: Arc<Dispatcher>,
    bus: Arc<NotificationBus>,
    state: watch::Sender<LifecycleState>,
    /// Generation of the latest start attempt; every state transition happens
    /// with this held
    lifecycle: Mutex<u64>,
    listener: Mutex<Option<OscListener>>,
    bound_address: RwLock<Option<String>>,
}

/// Routing/aggregation engine and OSC server lifecycle.
///
/// Cheap to clone; clones share the same engine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&ServerConfig::default())
    }
}

impl Engine {
    pub fn new(server: &ServerConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(server.rate_limit_hz));
        let (state, _) = watch::channel(LifecycleState::Stopped);

        Self {
            inner: Arc::new(EngineInner {
                settings: RwLock::new(ListenSettings {
                    bind_address: server.bind_address().map(str::to_string),
                    bind_port: server.bind_port,
                }),
                groups: RwLock::new(None),
                dispatcher: Arc::new(Dispatcher::new(limiter, server.debug)),
                bus: Arc::new(NotificationBus::new()),
                state,
                lifecycle: Mutex::new(0),
                listener: Mutex::new(None),
                bound_address: RwLock::new(None),
            }),
        }
    }

    /// Status, bound-address and message callback registries
    pub fn notifications(&self) -> &Arc<NotificationBus> {
        &self.inner.bus
    }

    /// Replace the routing table with one built from `groups`.
    ///
    /// The Default group (id 0) must be present; otherwise the current table is
    /// left untouched. Must be called from within a tokio runtime, which hosts the
    /// consumer tasks. Previous-generation consumers are aborted.
    pub fn rebuild(&self, groups: Vec<EndpointGroup>) -> Result<()> {
        if !groups.iter().any(EndpointGroup::is_default) {
            return Err(EngineError::MissingDefaultGroup);
        }
        let runtime = Handle::try_current().map_err(|e| EngineError::NoRuntime(e.to_string()))?;

        for warning in collect_bind_warnings(&groups) {
            warn!("[OSC-SERVER] {}", warning);
        }

        let table = RoutingTable::build(&groups, &self.inner.bus, &runtime);
        info!(
            "[OSC-SERVER] Built {} handler(s) over {} address(es) for {} group(s)",
            table.handler_count(),
            table.routes().len(),
            groups.len()
        );
        self.inner.dispatcher.install(table);
        *self.inner.groups.write() = Some(groups);
        Ok(())
    }

    /// Start listening.
    ///
    /// Explicit arguments replace the stored bind settings. Without any address the
    /// outbound-routable interface is used. Returns the bound socket address.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` unless the server is stopped
    /// - `Bind` if the socket cannot be opened; the server stays stopped
    /// - `StartCancelled` if `stop()` ran before the socket was bound
    pub async fn start(
        &self,
        bind_address: Option<&str>,
        bind_port: Option<u16>,
    ) -> Result<SocketAddr> {
        let generation = {
            let mut generation = self.inner.lifecycle.lock();
            let current = *self.inner.state.borrow();
            if current != LifecycleState::Stopped {
                return Err(EngineError::AlreadyRunning(current));
            }
            *generation += 1;
            self.inner.state.send_replace(LifecycleState::Starting);
            *generation
        };

        let result = self.bring_up(generation, bind_address, bind_port).await;
        if result.is_err() {
            let current = self.inner.lifecycle.lock();
            if *current == generation && *self.inner.state.borrow() == LifecycleState::Starting {
                self.inner.state.send_replace(LifecycleState::Stopped);
            }
        }
        result
    }

    async fn bring_up(
        &self,
        generation: u64,
        bind_address: Option<&str>,
        bind_port: Option<u16>,
    ) -> Result<SocketAddr> {
        let (host, port) = {
            let mut settings = self.inner.settings.write();
            if let Some(address) = bind_address {
                settings.bind_address = Some(address.to_string());
            }
            if let Some(port) = bind_port {
                settings.bind_port = port;
            }
            (settings.bind_address.clone(), settings.bind_port)
        };
        let host = match host {
            Some(host) => host,
            None => {
                let detected = detect_local_ip().to_string();
                info!("[OSC-SERVER] No bind address configured, using {}", detected);
                detected
            }
        };

        let listener =
            OscListener::bind(&host, port, Arc::clone(&self.inner.dispatcher)).await?;
        let local_addr = listener.local_addr();
        let address = local_addr.to_string();

        {
            let current = self.inner.lifecycle.lock();
            if *current != generation || *self.inner.state.borrow() != LifecycleState::Starting {
                debug!("[OSC-SERVER] Start on {} superseded, closing listener", address);
                listener.close();
                return Err(EngineError::StartCancelled);
            }
            if let Err(e) = self.install_routes() {
                listener.close();
                return Err(e);
            }
            *self.inner.listener.lock() = Some(listener);
            *self.inner.bound_address.write() = Some(address.clone());
            self.inner.state.send_replace(LifecycleState::Running);
        }

        info!("[OSC-SERVER] Running on {}", address);
        self.inner.bus.notify_status(true);
        self.inner.bus.notify_bind_address(&address);
        Ok(local_addr)
    }

    fn install_routes(&self) -> Result<()> {
        let groups = self.inner.groups.read().clone();
        match groups {
            Some(groups) => self.rebuild(groups),
            None => {
                warn!(
                    "[OSC-SERVER] No endpoint groups configured, logging {} only",
                    FALLBACK_ADDRESS
                );
                self.inner
                    .dispatcher
                    .install(RoutingTable::debug_only(FALLBACK_ADDRESS));
                Ok(())
            }
        }
    }

    /// Close the listener and cancel this generation's consumers.
    ///
    /// Stopping a stopped server is a no-op. Stopping a server that is still
    /// starting cancels that start; status subscribers only hear `false` if
    /// they heard `true`.
    pub fn stop(&self) {
        {
            let _lifecycle = self.inner.lifecycle.lock();
            let current = *self.inner.state.borrow();
            match current {
                LifecycleState::Starting => {
                    self.inner.state.send_replace(LifecycleState::Stopped);
                    info!("[OSC-SERVER] Start cancelled");
                    return;
                }
                LifecycleState::Running => {}
                _ => {
                    debug!("[OSC-SERVER] Stop requested while not running");
                    return;
                }
            }

            self.inner.state.send_replace(LifecycleState::Stopping);
            if let Some(listener) = self.inner.listener.lock().take() {
                listener.close();
            }
            self.inner.dispatcher.clear();
            *self.inner.bound_address.write() = None;
            self.inner.state.send_replace(LifecycleState::Stopped);
        }

        info!("[OSC-SERVER] Stopped");
        self.inner.bus.notify_status(false);
    }

    /// Resolves once the server reaches `Stopped`
    pub async fn wait_until_stopped(&self) {
        let mut state = self.inner.state.subscribe();
        let _ = state.wait_for(|s| *s == LifecycleState::Stopped).await;
    }

    pub fn subscribe_status(&self) -> watch::Receiver<LifecycleState> {
        self.inner.state.subscribe()
    }

    pub fn status(&self) -> LifecycleState {
        *self.inner.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.status() == LifecycleState::Running
    }

    /// `"address:port"` while running
    pub fn bound_address(&self) -> Option<String> {
        self.inner.bound_address.read().clone()
    }

    /// Dispatch one message to every handler registered for `address`
    pub fn dispatch(&self, address: &str, args: &[OscType]) -> usize {
        self.inner.dispatcher.dispatch(address, args)
    }

    pub fn dispatch_packet(&self, packet: OscPacket) {
        self.inner.dispatcher.dispatch_packet(packet);
    }

    /// Takes effect on the next start
    pub fn set_bind_address(&self, address: Option<String>, port: u16) {
        let mut settings = self.inner.settings.write();
        settings.bind_address = address.filter(|a| !a.trim().is_empty());
        settings.bind_port = port;
    }

    pub fn bind_address(&self) -> (Option<String>, u16) {
        let settings = self.inner.settings.read();
        (settings.bind_address.clone(), settings.bind_port)
    }

    /// Toggle the wildcard debug handler; applies to the next message
    pub fn set_debug_mode(&self, enabled: bool) {
        self.inner.dispatcher.set_debug(enabled);
    }

    pub fn debug_mode(&self) -> bool {
        self.inner.dispatcher.debug_enabled()
    }

    pub fn set_rate_limit(&self, rate_hz: f64) {
        self.inner.dispatcher.limiter().set_rate(rate_hz);
    }

    pub fn rate_limit(&self) -> f64 {
        self.inner.dispatcher.limiter().rate()
    }

    /// Messages rejected by the rate limiter
    pub fn dropped_messages(&self) -> u64 {
        self.inner.dispatcher.limiter().dropped()
    }

    pub fn group_outputs(&self) -> Vec<OutputDescription> {
        self.inner
            .dispatcher
            .with_table(|table| table.outputs().to_vec())
    }

    pub fn routes(&self) -> Vec<(String, usize)> {
        self.inner.dispatcher.with_table(RoutingTable::routes)
    }

    /// Output key of the Default group, once groups are configured
    pub fn default_output_key(&self) -> Option<String> {
        let groups = self.inner.groups.read();
        groups.as_ref().and_then(|groups| {
            groups
                .iter()
                .position(EndpointGroup::is_default)
                .map(|index| groups[index].output_key(index))
        })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("status", &self.status())
            .field("bound_address", &self.bound_address())
            .field("routes", &self.routes())
            .finish()
    }
}
