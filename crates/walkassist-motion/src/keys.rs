// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Key-action interface
//!
//! Key injection lives outside this crate; the estimator only talks to a
//! [`KeyActions`] implementation and logs whatever it reports.

use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeyActionError {
    #[error("Failed to press {keys:?}: {reason}")]
    Press { keys: Vec<String>, reason: String },
    #[error("Failed to release {keys:?}: {reason}")]
    Release { keys: Vec<String>, reason: String },
    #[error("Key injection unavailable: {0}")]
    Unavailable(String),
}

/// Result type for key actions
pub type Result<T> = std::result::Result<T, KeyActionError>;

/// Presses and releases key combinations in the order given
pub trait KeyActions: Send {
    fn press(&mut self, keys: &[String]) -> Result<()>;
    fn release(&mut self, keys: &[String]) -> Result<()>;
}

/// Logs key actions instead of injecting them
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingKeyActions;

impl KeyActions for LoggingKeyActions {
    fn press(&mut self, keys: &[String]) -> Result<()> {
        info!("[KEYS] press {}", keys.join("+"));
        Ok(())
    }

    fn release(&mut self, keys: &[String]) -> Result<()> {
        info!("[KEYS] release {}", keys.join("+"));
        Ok(())
    }
}
