// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device inventory via external CLIs.
//!
//! Two stateless queries: simulators from `xcrun simctl list devices
//! --json`, physical devices from `xcrun devicectl list devices` (which
//! only emits JSON to a file, hence the temp file). Both surface non-zero
//! exits and malformed JSON as errors instead of degrading to an empty
//! list; the parsing is split out so tests can feed captured output.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Where a device record came from, and therefore how to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Simulator,
    Physical,
}

/// A device normalized across both inventory sources. Produced fresh on
/// every enumeration; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumeratedDevice {
    /// Hardware UDID, the primary key across enumeration and mux events.
    pub udid: String,
    pub name: String,
    pub kind: DeviceKind,
    /// Booted (simulator) or tunnel-connected (physical).
    pub connected: bool,
    pub os_version: Option<String>,
    pub model: Option<String>,
}

/// Errors from inventory queries.
#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with status {code}: {stderr}")]
    CommandFailed { tool: &'static str, code: i32, stderr: String },

    #[error("failed to read {tool} output: {source}")]
    Output {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {tool} output: {source}")]
    Parse {
        tool: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Inventory source. A trait so tests and higher layers can inject a
/// fake instead of shelling out.
#[async_trait]
pub trait DeviceEnumerator: Send + Sync {
    async fn list_simulators(&self) -> Result<Vec<EnumeratedDevice>, EnumerationError>;
    async fn list_physical(&self) -> Result<Vec<EnumeratedDevice>, EnumerationError>;
    /// Boot a shut-down simulator. Idempotent: booting an already-booted
    /// simulator succeeds.
    async fn boot_simulator(&self, udid: &str) -> Result<(), EnumerationError>;
}

/// The real enumerator, backed by `xcrun`.
#[derive(Debug, Clone, Default)]
pub struct CliEnumerator;

const SIMCTL: &str = "xcrun simctl";
const DEVICECTL: &str = "xcrun devicectl";

#[async_trait]
impl DeviceEnumerator for CliEnumerator {
    async fn list_simulators(&self) -> Result<Vec<EnumeratedDevice>, EnumerationError> {
        let output = run_tool(SIMCTL, &["simctl", "list", "devices", "--json"]).await?;
        parse_simctl_output(&output)
    }

    async fn list_physical(&self) -> Result<Vec<EnumeratedDevice>, EnumerationError> {
        // devicectl refuses to write JSON to stdout; give it a temp file.
        let file = tempfile::NamedTempFile::new()
            .map_err(|source| EnumerationError::Output { tool: DEVICECTL, source })?;
        let path = file.path().to_string_lossy().into_owned();
        run_tool(DEVICECTL, &["devicectl", "list", "devices", "--json-output", &path]).await?;
        let json = tokio::fs::read_to_string(file.path())
            .await
            .map_err(|source| EnumerationError::Output { tool: DEVICECTL, source })?;
        parse_devicectl_output(&json)
    }

    async fn boot_simulator(&self, udid: &str) -> Result<(), EnumerationError> {
        match run_tool(SIMCTL, &["simctl", "boot", udid]).await {
            Ok(_) => Ok(()),
            // simctl exits non-zero when the goal state already holds.
            Err(EnumerationError::CommandFailed { ref stderr, .. })
                if stderr.contains("current state: Booted") =>
            {
                debug!(udid, "simulator already booted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

async fn run_tool(tool: &'static str, args: &[&str]) -> Result<String, EnumerationError> {
    let output = tokio::process::Command::new("xcrun")
        .args(args)
        .output()
        .await
        .map_err(|source| EnumerationError::Spawn { tool, source })?;

    if !output.status.success() {
        return Err(EnumerationError::CommandFailed {
            tool,
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// -- simctl parsing --

#[derive(Deserialize)]
struct SimctlList {
    devices: HashMap<String, Vec<SimctlDevice>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimctlDevice {
    udid: String,
    name: String,
    state: String,
    #[serde(default)]
    is_available: bool,
    #[serde(default)]
    device_type_identifier: Option<String>,
}

/// Parse `simctl list devices --json` output. Keeps available devices on
/// iOS runtimes; `state == "Booted"` maps to connected.
pub fn parse_simctl_output(json: &str) -> Result<Vec<EnumeratedDevice>, EnumerationError> {
    let list: SimctlList =
        serde_json::from_str(json).map_err(|source| EnumerationError::Parse { tool: SIMCTL, source })?;

    let mut devices = Vec::new();
    for (runtime, entries) in &list.devices {
        if !runtime.contains("SimRuntime.iOS") {
            continue;
        }
        let os_version = runtime
            .rsplit('.')
            .next()
            .and_then(|r| r.strip_prefix("iOS-"))
            .map(|v| v.replace('-', "."));
        for entry in entries {
            if !entry.is_available {
                continue;
            }
            devices.push(EnumeratedDevice {
                udid: entry.udid.clone(),
                name: entry.name.clone(),
                kind: DeviceKind::Simulator,
                connected: entry.state == "Booted",
                os_version: os_version.clone(),
                model: entry
                    .device_type_identifier
                    .as_deref()
                    .and_then(|id| id.rsplit('.').next())
                    .map(|m| m.replace('-', " ")),
            });
        }
    }
    Ok(devices)
}

// -- devicectl parsing --

#[derive(Deserialize)]
struct DevicectlOutput {
    result: DevicectlResult,
}

#[derive(Deserialize)]
struct DevicectlResult {
    #[serde(default)]
    devices: Vec<DevicectlDevice>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DevicectlDevice {
    #[serde(default)]
    hardware_properties: Option<HardwareProperties>,
    #[serde(default)]
    device_properties: Option<DeviceProperties>,
    #[serde(default)]
    connection_properties: Option<ConnectionProperties>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardwareProperties {
    #[serde(default)]
    udid: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    marketing_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceProperties {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    os_version_number: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionProperties {
    #[serde(default)]
    tunnel_state: Option<String>,
}

/// Parse `devicectl list devices` JSON. Keeps iOS devices with a
/// non-empty hardware UDID; `tunnelState == "connected"` maps to
/// connected.
pub fn parse_devicectl_output(json: &str) -> Result<Vec<EnumeratedDevice>, EnumerationError> {
    let output: DevicectlOutput = serde_json::from_str(json)
        .map_err(|source| EnumerationError::Parse { tool: DEVICECTL, source })?;

    let mut devices = Vec::new();
    for entry in output.result.devices {
        let hardware = match entry.hardware_properties {
            Some(h) => h,
            None => continue,
        };
        if hardware.platform.as_deref() != Some("iOS") {
            continue;
        }
        let udid = match hardware.udid {
            Some(ref u) if !u.is_empty() => u.clone(),
            _ => continue,
        };
        let properties = entry.device_properties.unwrap_or(DeviceProperties {
            name: None,
            os_version_number: None,
        });
        let connected = entry
            .connection_properties
            .and_then(|c| c.tunnel_state)
            .map(|s| s == "connected")
            .unwrap_or(false);
        devices.push(EnumeratedDevice {
            name: properties.name.unwrap_or_else(|| udid.clone()),
            udid,
            kind: DeviceKind::Physical,
            connected,
            os_version: properties.os_version_number,
            model: hardware.marketing_name,
        });
    }
    Ok(devices)
}

#[cfg(test)]
#[path = "enumerate_tests.rs"]
mod tests;
