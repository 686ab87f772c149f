// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Synthetic accelerometer sender for exercising a running walkassist server

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use rosc::{encoder, OscMessage, OscPacket, OscType};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::info;

use walkassist::observability::{init_logging, parse_debug_flags};

/// Send random /accelerometer readings over OSC
#[derive(Parser, Debug)]
#[command(name = "send_osc", version, long_about = None)]
struct Args {
    /// Target host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Target UDP port
    #[arg(long, default_value_t = 9000)]
    port: u16,

    /// Messages per second
    #[arg(long, default_value_t = 2.0)]
    freq: f64,

    /// Number of messages to send
    #[arg(long, default_value_t = 50)]
    count: u32,

    /// OSC address to send to
    #[arg(long, default_value = "/accelerometer")]
    address: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&parse_debug_flags())?;
    let args = Args::parse();
    anyhow::ensure!(args.freq > 0.0, "--freq must be positive");

    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("Failed to open UDP socket")?;
    let target = format!("{}:{}", args.host, args.port);
    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / args.freq));
    let mut rng = rand::thread_rng();

    info!("Sending {} message(s) to {}{}", args.count, target, args.address);
    for i in 0..args.count {
        interval.tick().await;

        let (x, y, z): (f32, f32, f32) = (
            rng.gen_range(-2.0..=2.0),
            rng.gen_range(-2.0..=2.0),
            rng.gen_range(-2.0..=2.0),
        );
        let packet = OscPacket::Message(OscMessage {
            addr: args.address.clone(),
            args: vec![OscType::Float(x), OscType::Float(y), OscType::Float(z)],
        });
        let bytes = encoder::encode(&packet).context("Failed to encode OSC message")?;
        socket
            .send_to(&bytes, &target)
            .await
            .with_context(|| format!("Failed to send to {}", target))?;

        info!("[{:>3}] {} {:.3} {:.3} {:.3}", i + 1, args.address, x, y, z);
    }

    Ok(())
}
