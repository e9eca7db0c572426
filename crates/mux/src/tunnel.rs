// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunnel opening and UDID resolution.
//!
//! The daemon keys tunnels by its own device id, not by hardware UDID, so
//! opening a tunnel is two steps: resolve the UDID against the daemon's
//! live table, then `Connect` to a port on that id. After a successful
//! `Connect` the socket is a raw byte pipe; mux framing no longer applies.

use std::path::PathBuf;
use std::time::Duration;

use devlink_wire::{connect_request, listen_request, MuxDeviceRecord, MuxMessage};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::debug;

use crate::{env, MuxConnection, MuxError};

/// Factory for mux daemon connections: socket path plus the deadline
/// applied to every handshake. Cheap to clone; owns no sockets.
#[derive(Debug, Clone)]
pub struct MuxConnector {
    socket_path: PathBuf,
    timeout: Duration,
}

impl MuxConnector {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { socket_path: socket_path.into(), timeout }
    }

    /// Connector configured from `DEVLINK_MUX_SOCKET` / `DEVLINK_MUX_TIMEOUT_MS`,
    /// falling back to the platform defaults.
    pub fn from_env() -> Self {
        Self::new(env::socket_path(), env::mux_timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Open a fresh connection to the daemon, bounded by the deadline.
    pub async fn connect(&self) -> Result<MuxConnection, MuxError> {
        timeout(self.timeout, MuxConnection::connect(&self.socket_path))
            .await
            .map_err(|_| MuxError::Timeout)?
    }

    /// One-shot snapshot of the daemon's device table.
    ///
    /// The listen stream has no end-of-snapshot marker, so the initial
    /// `Attached` burst is considered complete after a short quiet period.
    /// Diagnostic use only; tunnel opening resolves per-UDID instead.
    pub async fn list_devices_once(&self) -> Result<Vec<MuxDeviceRecord>, MuxError> {
        let mut conn = self.listen().await?;
        let mut devices = Vec::new();
        let mut deadline = self.timeout;
        loop {
            match timeout(deadline, conn.recv_message()).await {
                Ok(Ok(MuxMessage::Attached(record))) => {
                    devices.push(record);
                    deadline = QUIET_PERIOD;
                }
                Ok(Ok(_)) => deadline = QUIET_PERIOD,
                // Daemon closed the snapshot connection: whatever we have.
                Ok(Err(MuxError::Recv(_))) | Err(_) => return Ok(devices),
                Ok(Err(e)) => return Err(e),
            }
        }
    }

    /// Resolve a hardware UDID to the daemon's device id by scanning the
    /// attach stream until a serial matches. Times out to
    /// [`MuxError::DeviceNotFound`]: a device the daemon never announces
    /// is not attached.
    pub async fn resolve_device_id(&self, udid: &str) -> Result<u32, MuxError> {
        let mut conn = self.listen().await?;
        let scan = async {
            loop {
                match conn.recv_message().await? {
                    MuxMessage::Attached(record) if record.serial == udid => {
                        return Ok(record.device_id);
                    }
                    _ => {}
                }
            }
        };
        match timeout(self.timeout, scan).await {
            Ok(Ok(device_id)) => {
                debug!(udid, device_id, "resolved device");
                Ok(device_id)
            }
            Ok(Err(MuxError::Recv(_))) | Err(_) => Err(MuxError::DeviceNotFound(udid.to_string())),
            Ok(Err(e)) => Err(e),
        }
    }

    /// Open a raw tunnel to `port` on the device with mux id `device_id`.
    /// On success the returned stream is a bidirectional byte pipe to
    /// that port; the caller owns its lifetime.
    pub async fn open_tunnel(&self, device_id: u32, port: u16) -> Result<UnixStream, MuxError> {
        let mut conn = self.connect().await?;
        conn.send(connect_request(device_id, port)?).await?;
        timeout(self.timeout, conn.expect_result()).await.map_err(|_| MuxError::Timeout)??;
        debug!(device_id, port, "tunnel open");
        Ok(conn.into_stream())
    }

    async fn listen(&self) -> Result<MuxConnection, MuxError> {
        let mut conn = self.connect().await?;
        conn.send(listen_request()?).await?;
        timeout(self.timeout, conn.expect_result()).await.map_err(|_| MuxError::Timeout)??;
        Ok(conn)
    }
}

/// How long after the last packet a snapshot is considered complete.
const QUIET_PERIOD: Duration = Duration::from_millis(200);

#[cfg(test)]
#[path = "tunnel_tests.rs"]
mod tests;
