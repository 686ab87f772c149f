// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! UDP listener for OSC datagrams
//!
//! Receives datagrams on a tokio socket, decodes them with `rosc` and hands
//! every message (bundles are flattened) to the [`Dispatcher`]. Dispatch is
//! synchronous and never blocks: handlers only push into latest-value queues.

use crate::core::{EngineError, Result};
use crate::routing::Dispatcher;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// OSC over UDP is limited to one datagram per packet
const MAX_DATAGRAM: usize = 65_536;

/// A bound socket plus the receive task draining it.
///
/// Dropping the listener aborts the task, which closes the socket.
#[derive(Debug)]
pub struct OscListener {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl OscListener {
    /// Bind `host:port` and start receiving into `dispatcher`
    pub async fn bind(host: &str, port: u16, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        let socket = UdpSocket::bind((host, port))
            .await
            .map_err(|source| EngineError::Bind {
                address: format!("{}:{}", host, port),
                source,
            })?;
        let local_addr = socket.local_addr().map_err(|source| EngineError::Bind {
            address: format!("{}:{}", host, port),
            source,
        })?;

        info!("[OSC-SERVER] Listening on {}", local_addr);
        let task = tokio::spawn(receive_loop(socket, dispatcher));

        Ok(Self { local_addr, task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Abort the receive task; the socket closes with it
    pub fn close(self) {
        info!("[OSC-SERVER] Listener on {} closed", self.local_addr);
    }
}

impl Drop for OscListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn receive_loop(socket: UdpSocket, dispatcher: Arc<Dispatcher>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                // e.g. ICMP port-unreachable surfacing as ConnectionReset on Windows
                warn!("[OSC-SERVER] UDP receive failed: {}", e);
                continue;
            }
        };

        match rosc::decoder::decode_udp(&buf[..len]) {
            Ok((_, packet)) => dispatcher.dispatch_packet(packet),
            Err(e) => debug!(
                "[OSC-SERVER] Ignoring undecodable datagram ({} bytes) from {}: {:?}",
                len, peer, e
            ),
        }
    }
}

/// Address of the interface the OS would route outbound traffic through.
///
/// Connecting a UDP socket sends nothing; it only selects a route. Falls back
/// to loopback when no route exists.
pub fn detect_local_ip() -> IpAddr {
    let probe = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| socket.connect(("8.8.8.8", 80)).map(|_| socket))
        .and_then(|socket| socket.local_addr());

    match probe {
        Ok(addr) if !addr.ip().is_unspecified() => addr.ip(),
        Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Err(e) => {
            warn!(
                "[OSC-SERVER] Could not detect outbound interface ({}), using 127.0.0.1",
                e
            );
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimiter;
    use crate::routing::RoutingTable;

    #[tokio::test]
    async fn test_listener_lifecycle() {
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(RateLimiter::default()), false));
        let listener = OscListener::bind("127.0.0.1", 0, dispatcher).await.unwrap();

        assert_ne!(listener.local_addr().port(), 0);
        listener.close();
    }

    #[tokio::test]
    async fn test_bind_conflict_reports_address() {
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(RateLimiter::default()), false));
        let first = OscListener::bind("127.0.0.1", 0, Arc::clone(&dispatcher))
            .await
            .unwrap();
        let port = first.local_addr().port();

        match OscListener::bind("127.0.0.1", port, dispatcher).await {
            Err(EngineError::Bind { address, .. }) => {
                assert_eq!(address, format!("127.0.0.1:{}", port))
            }
            other => panic!("expected bind failure, got {:?}", other.map(|l| l.local_addr())),
        }
        first.close();
    }

    #[tokio::test]
    async fn test_datagrams_reach_dispatcher() {
        let limiter = Arc::new(RateLimiter::new(1.0));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&limiter), false));
        dispatcher.install(RoutingTable::debug_only("/ping"));

        let listener = OscListener::bind("127.0.0.1", 0, dispatcher).await.unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let packet = rosc::encoder::encode(&rosc::OscPacket::Message(rosc::OscMessage {
            addr: "/ping".to_string(),
            args: vec![rosc::OscType::Int(1)],
        }))
        .unwrap();

        // Capacity 1: the second datagram is only counted if the first was routed too
        for _ in 0..2 {
            sender.send_to(&packet, listener.local_addr()).await.unwrap();
        }
        for _ in 0..50 {
            if limiter.dropped() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(limiter.dropped(), 1);
        listener.close();
    }

    #[tokio::test]
    async fn test_dropped_listener_releases_port() {
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(RateLimiter::default()), false));
        let listener = OscListener::bind("127.0.0.1", 0, Arc::clone(&dispatcher))
            .await
            .unwrap();
        let port = listener.local_addr().port();

        drop(listener);
        // Let the runtime drop the aborted receive task
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let rebound = OscListener::bind("127.0.0.1", port, dispatcher).await.unwrap();
        assert_eq!(rebound.local_addr().port(), port);
    }

    #[test]
    fn test_detect_local_ip_never_unspecified() {
        assert!(!detect_local_ip().is_unspecified());
    }
}
