// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client for the local device multiplexer daemon.
//!
//! Three layers: [`MuxConnection`] owns one socket and moves packets,
//! [`DeviceEventStream`] subscribes to attach/detach events and keeps a
//! live device map, and [`MuxConnector`] opens raw tunnels to a port on
//! an attached device. One logical stream per connection — the daemon
//! does no multiplexing within a single socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod connection;
pub mod env;
mod events;
mod tunnel;

pub use connection::MuxConnection;
pub use events::{apply_message, DeviceEvent, DeviceEventStream, DeviceMap};
pub use tunnel::MuxConnector;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

use std::path::PathBuf;

use thiserror::Error;

/// Errors from mux daemon communication.
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("failed to connect to mux daemon at {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("mux send failed: {0}")]
    Send(std::io::Error),

    #[error("mux receive failed: {0}")]
    Recv(std::io::Error),

    #[error(transparent)]
    Wire(#[from] devlink_wire::WireError),

    /// The daemon answered a handshake with a non-zero `Result.Number`.
    #[error("mux daemon refused the request (result {0})")]
    Refused(u64),

    #[error("unexpected mux message during handshake: {0}")]
    Unexpected(String),

    /// The device is not in the daemon's live table. Recoverable: the
    /// caller may re-enumerate and retry.
    #[error("device {0} is not attached to the mux daemon")]
    DeviceNotFound(String),

    #[error("mux operation timed out")]
    Timeout,
}
