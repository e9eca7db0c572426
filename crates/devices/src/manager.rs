// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device selection and transport construction.
//!
//! Two states: unselected, or selected by UDID. Selection is validated
//! against a fresh enumeration when set; afterwards it can go stale if a
//! device unplugs, so [`DeviceManager::watch_detachments`] clears it the
//! moment the mux daemon reports the selected device gone. Selection
//! failures are reported, never retried here.

use std::sync::Arc;

use devlink_mux::{DeviceEvent, DeviceEventStream, MuxConnector};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::enumerate::{DeviceKind, EnumerationError};
use crate::registry::DeviceRegistry;
use crate::transport::{LocalTransport, Transport, TunnelTransport, CONTROL_PLANE_PORT};

/// The current selection: which device, and therefore which transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub udid: String,
    pub kind: DeviceKind,
}

/// Errors from selection and transport construction.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("no device selected")]
    NoDeviceSelected,

    #[error("no simulator or device available")]
    NoDeviceAvailable,

    #[error(transparent)]
    Enumeration(#[from] EnumerationError),
}

/// Owns the selection state machine and hands out transports bound to
/// the selected device.
pub struct DeviceManager {
    registry: DeviceRegistry,
    connector: MuxConnector,
    /// Control-plane port on simulators, reachable over loopback.
    local_port: u16,
    /// Control-plane port on hardware, reached through a tunnel.
    control_port: u16,
    selected: Arc<Mutex<Option<Selection>>>,
}

impl DeviceManager {
    pub fn new(registry: DeviceRegistry, connector: MuxConnector) -> Self {
        Self::with_ports(registry, connector, CONTROL_PLANE_PORT, CONTROL_PLANE_PORT)
    }

    pub fn with_ports(
        registry: DeviceRegistry,
        connector: MuxConnector,
        local_port: u16,
        control_port: u16,
    ) -> Self {
        Self { registry, connector, local_port, control_port, selected: Arc::new(Mutex::new(None)) }
    }

    /// Select a device by UDID, validated against a fresh enumeration.
    /// On failure the previous selection is untouched.
    pub async fn select_device(&self, udid: &str) -> Result<(), SelectionError> {
        let device = self
            .registry
            .find_device(udid)
            .await?
            .ok_or_else(|| SelectionError::DeviceNotFound(udid.to_string()))?;
        info!(udid, kind = ?device.kind, "device selected");
        *self.selected.lock() = Some(Selection { udid: device.udid, kind: device.kind });
        Ok(())
    }

    /// Drop the selection. Always succeeds.
    pub fn clear_selection(&self) {
        *self.selected.lock() = None;
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selected.lock().clone()
    }

    /// Pick a device by priority: a connected physical device, else a
    /// booted simulator, else any simulator (booting it first). Returns
    /// the selected UDID.
    pub async fn auto_select_device(&self) -> Result<String, SelectionError> {
        let devices = self.registry.list_all_devices().await?;

        let choice = devices
            .iter()
            .find(|d| d.kind == DeviceKind::Physical && d.connected)
            .or_else(|| devices.iter().find(|d| d.kind == DeviceKind::Simulator && d.connected));

        let device = match choice {
            Some(device) => device,
            None => {
                let simulator = devices
                    .iter()
                    .find(|d| d.kind == DeviceKind::Simulator)
                    .ok_or(SelectionError::NoDeviceAvailable)?;
                info!(udid = %simulator.udid, "booting simulator for auto-select");
                self.registry.enumerator().boot_simulator(&simulator.udid).await?;
                simulator
            }
        };

        info!(udid = %device.udid, kind = ?device.kind, "auto-selected device");
        *self.selected.lock() =
            Some(Selection { udid: device.udid.clone(), kind: device.kind });
        Ok(device.udid.clone())
    }

    /// Transport bound to the current selection: loopback for a
    /// simulator, a mux tunnel for hardware.
    pub fn get_transport(&self) -> Result<Box<dyn Transport>, SelectionError> {
        let selection = self.selection().ok_or(SelectionError::NoDeviceSelected)?;
        Ok(match selection.kind {
            DeviceKind::Simulator => Box::new(LocalTransport::new(self.local_port)),
            DeviceKind::Physical => Box::new(TunnelTransport::new(
                self.connector.clone(),
                selection.udid,
                self.control_port,
            )),
        })
    }

    /// [`DeviceManager::get_transport`], auto-selecting first if nothing
    /// is selected.
    pub async fn get_or_auto_select_transport(
        &self,
    ) -> Result<Box<dyn Transport>, SelectionError> {
        let unselected = self.selected.lock().is_none();
        if unselected {
            self.auto_select_device().await?;
        }
        self.get_transport()
    }

    /// Clear the selection when the selected device detaches.
    ///
    /// Consumes a running event stream; the returned task ends when the
    /// stream does. Without a watcher a stale selection simply fails at
    /// transport time instead.
    pub fn watch_detachments(&self, mut stream: DeviceEventStream) -> JoinHandle<()> {
        let selected = Arc::clone(&self.selected);
        tokio::spawn(async move {
            while let Some(event) = stream.next_event().await {
                if let DeviceEvent::Detached(record) = event {
                    let mut selection = selected.lock();
                    let matches =
                        selection.as_ref().is_some_and(|s| s.udid == record.serial);
                    if matches {
                        info!(udid = %record.serial, "selected device detached, clearing selection");
                        *selection = None;
                    } else {
                        debug!(udid = %record.serial, "unselected device detached");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
