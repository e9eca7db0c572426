// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device inventory, selection, and control-plane transports.
//!
//! Simulators and physical devices are enumerated through external CLIs,
//! merged into one inventory, and selected through [`DeviceManager`].
//! The manager hands back a [`Transport`] bound to the selection: plain
//! loopback HTTP for simulators, HTTP over a mux tunnel for hardware.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod enumerate;
mod http;
mod manager;
mod registry;
mod transport;

#[cfg(test)]
mod test_fixtures;

pub use enumerate::{
    parse_devicectl_output, parse_simctl_output, CliEnumerator, DeviceEnumerator, DeviceKind,
    EnumeratedDevice, EnumerationError,
};
pub use http::{build_request, read_response, HttpError, HttpResponse, ResponseParser};
pub use manager::{DeviceManager, Selection, SelectionError};
pub use registry::DeviceRegistry;
pub use transport::{LocalTransport, Transport, TransportError, TunnelTransport, CONTROL_PLANE_PORT};
