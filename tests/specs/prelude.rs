// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for workspace specs.

use async_trait::async_trait;
use devlink_devices::{DeviceEnumerator, DeviceKind, EnumeratedDevice, EnumerationError};
use devlink_wire::MuxDeviceRecord;
use parking_lot::Mutex;

pub fn mux_record(device_id: u32, serial: &str) -> MuxDeviceRecord {
    MuxDeviceRecord {
        device_id,
        serial: serial.to_string(),
        connection_type: Some("USB".to_string()),
        product_id: Some(0x12a8),
        location_id: Some(0x1100000),
    }
}

pub fn simulator(udid: &str, connected: bool) -> EnumeratedDevice {
    EnumeratedDevice {
        udid: udid.to_string(),
        name: "iPhone 15".to_string(),
        kind: DeviceKind::Simulator,
        connected,
        os_version: Some("17.2".to_string()),
        model: Some("iPhone 15".to_string()),
    }
}

pub fn physical(udid: &str, connected: bool) -> EnumeratedDevice {
    EnumeratedDevice {
        udid: udid.to_string(),
        name: "Field iPhone".to_string(),
        kind: DeviceKind::Physical,
        connected,
        os_version: Some("17.5.1".to_string()),
        model: Some("iPhone 14 Pro".to_string()),
    }
}

/// Fixed-inventory enumerator; boots are recorded and mark the
/// simulator connected.
pub struct StaticEnumerator {
    pub devices: Mutex<Vec<EnumeratedDevice>>,
    pub booted: Mutex<Vec<String>>,
}

impl StaticEnumerator {
    pub fn new(devices: Vec<EnumeratedDevice>) -> Self {
        Self { devices: Mutex::new(devices), booted: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl DeviceEnumerator for StaticEnumerator {
    async fn list_simulators(&self) -> Result<Vec<EnumeratedDevice>, EnumerationError> {
        Ok(self
            .devices
            .lock()
            .iter()
            .filter(|d| d.kind == DeviceKind::Simulator)
            .cloned()
            .collect())
    }

    async fn list_physical(&self) -> Result<Vec<EnumeratedDevice>, EnumerationError> {
        Ok(self.devices.lock().iter().filter(|d| d.kind == DeviceKind::Physical).cloned().collect())
    }

    async fn boot_simulator(&self, udid: &str) -> Result<(), EnumerationError> {
        self.booted.lock().push(udid.to_string());
        for device in self.devices.lock().iter_mut() {
            if device.udid == udid {
                device.connected = true;
            }
        }
        Ok(())
    }
}
