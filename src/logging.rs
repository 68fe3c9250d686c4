// ABOUTME: Structured logging initialization for hosts embedding the engine
// ABOUTME: tracing-subscriber fmt layer with RUST_LOG-style env filtering
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize structured logging with an environment-driven filter.
///
/// Defaults to `info` for this crate when `RUST_LOG` is unset. Safe to call
/// only once per process; embedding hosts that install their own subscriber
/// should skip this.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init() -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stride_sync=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| format!("Failed to install tracing subscriber: {e}"))
}
