// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the mux crate.

use std::path::PathBuf;
use std::time::Duration;

/// Well-known mux daemon socket path on macOS.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/usbmuxd";

/// Mux daemon socket path: `DEVLINK_MUX_SOCKET` > platform default.
pub fn socket_path() -> PathBuf {
    std::env::var("DEVLINK_MUX_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SOCKET_PATH))
}

/// Deadline for mux handshakes, device resolution, and tunnel opens
/// (default 5s, configurable via `DEVLINK_MUX_TIMEOUT_MS`).
pub fn mux_timeout() -> Duration {
    std::env::var("DEVLINK_MUX_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}
