// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Network transports feeding the dispatcher

pub mod udp;

pub use udp::{detect_local_ip, OscListener};
