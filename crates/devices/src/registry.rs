// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device registry: the merged inventory view.
//!
//! Every query re-runs both enumerators rather than caching — freshness
//! over latency. Live mux attach/detach state is deliberately not merged
//! in here; it is consulted separately when tunnels are opened.

use std::sync::Arc;

use crate::enumerate::{DeviceEnumerator, EnumeratedDevice, EnumerationError};

/// Merged simulator + physical inventory.
#[derive(Clone)]
pub struct DeviceRegistry {
    enumerator: Arc<dyn DeviceEnumerator>,
}

impl DeviceRegistry {
    pub fn new(enumerator: Arc<dyn DeviceEnumerator>) -> Self {
        Self { enumerator }
    }

    /// Fresh enumeration of both sources, simulators first. A failure of
    /// either source propagates; callers that prefer a partial view must
    /// degrade explicitly.
    pub async fn list_all_devices(&self) -> Result<Vec<EnumeratedDevice>, EnumerationError> {
        let mut devices = self.enumerator.list_simulators().await?;
        devices.extend(self.enumerator.list_physical().await?);
        Ok(devices)
    }

    /// Find one device by UDID in a fresh enumeration.
    pub async fn find_device(
        &self,
        udid: &str,
    ) -> Result<Option<EnumeratedDevice>, EnumerationError> {
        Ok(self.list_all_devices().await?.into_iter().find(|d| d.udid == udid))
    }

    /// The underlying enumerator, for side-effecting operations (boot).
    pub fn enumerator(&self) -> &Arc<dyn DeviceEnumerator> {
        &self.enumerator
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
