// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fakes for devices-crate tests.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::enumerate::{DeviceEnumerator, DeviceKind, EnumeratedDevice, EnumerationError};

pub fn sim(udid: &str, connected: bool) -> EnumeratedDevice {
    EnumeratedDevice {
        udid: udid.to_string(),
        name: format!("Simulator {}", udid),
        kind: DeviceKind::Simulator,
        connected,
        os_version: Some("17.2".to_string()),
        model: Some("iPhone 15".to_string()),
    }
}

pub fn phys(udid: &str, connected: bool) -> EnumeratedDevice {
    EnumeratedDevice {
        udid: udid.to_string(),
        name: format!("Device {}", udid),
        kind: DeviceKind::Physical,
        connected,
        os_version: Some("17.5".to_string()),
        model: Some("iPhone 14 Pro".to_string()),
    }
}

/// Scriptable in-memory enumerator. Booting a simulator marks it
/// connected and records the UDID.
#[derive(Default)]
pub struct FakeEnumerator {
    pub simulators: Mutex<Vec<EnumeratedDevice>>,
    pub physical: Mutex<Vec<EnumeratedDevice>>,
    pub booted: Mutex<Vec<String>>,
    pub fail_simulators: Mutex<bool>,
}

impl FakeEnumerator {
    pub fn new(
        simulators: Vec<EnumeratedDevice>,
        physical: Vec<EnumeratedDevice>,
    ) -> Self {
        Self {
            simulators: Mutex::new(simulators),
            physical: Mutex::new(physical),
            ..Default::default()
        }
    }
}

#[async_trait]
impl DeviceEnumerator for FakeEnumerator {
    async fn list_simulators(&self) -> Result<Vec<EnumeratedDevice>, EnumerationError> {
        if *self.fail_simulators.lock() {
            return Err(EnumerationError::CommandFailed {
                tool: "xcrun simctl",
                code: 70,
                stderr: "injected failure".to_string(),
            });
        }
        Ok(self.simulators.lock().clone())
    }

    async fn list_physical(&self) -> Result<Vec<EnumeratedDevice>, EnumerationError> {
        Ok(self.physical.lock().clone())
    }

    async fn boot_simulator(&self, udid: &str) -> Result<(), EnumerationError> {
        self.booted.lock().push(udid.to_string());
        for device in self.simulators.lock().iter_mut() {
            if device.udid == udid {
                device.connected = true;
            }
        }
        Ok(())
    }
}
