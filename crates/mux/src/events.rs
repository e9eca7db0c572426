// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Attach/detach event stream.
//!
//! After the `Listen` handshake the daemon pushes the current device set
//! as `Attached` events, then keeps the connection open indefinitely for
//! live updates. The read loop runs in a spawned task, maintains a shared
//! device map keyed by mux device id, and publishes events to a
//! single-consumer unbounded channel.

use std::collections::HashMap;
use std::sync::Arc;

use devlink_wire::{listen_request, MuxDeviceRecord, MuxMessage};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::tunnel::MuxConnector;
use crate::{MuxConnection, MuxError};

/// Live device table, keyed by mux-internal device id. Mutated only by
/// the event loop; read from any thread.
pub type DeviceMap = Arc<Mutex<HashMap<u32, MuxDeviceRecord>>>;

/// A device appearing or disappearing on the mux daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Attached(MuxDeviceRecord),
    /// Carries the record removed from the live map.
    Detached(MuxDeviceRecord),
}

/// Fold one daemon message into the live map.
///
/// `Attached` upserts by device id; `Detached` removes the record and
/// returns it. A `Detached` for an unknown id is a no-op, as is any
/// non-event message.
pub fn apply_message(map: &DeviceMap, message: &MuxMessage) -> Option<DeviceEvent> {
    match message {
        MuxMessage::Attached(record) => {
            map.lock().insert(record.device_id, record.clone());
            Some(DeviceEvent::Attached(record.clone()))
        }
        MuxMessage::Detached { device_id } => {
            map.lock().remove(device_id).map(DeviceEvent::Detached)
        }
        _ => None,
    }
}

/// A running subscription to the daemon's attach/detach events.
///
/// Dropping the stream aborts the read loop and closes the connection,
/// which is the only cancellation mechanism the protocol offers.
#[derive(Debug)]
pub struct DeviceEventStream {
    devices: DeviceMap,
    events: UnboundedReceiver<DeviceEvent>,
    task: JoinHandle<()>,
}

impl DeviceEventStream {
    /// Perform the `Listen` handshake and spawn the read loop.
    ///
    /// A `Result.Number != 0` reply fails with [`MuxError::Refused`]
    /// before any task is spawned.
    pub async fn start(connector: &MuxConnector) -> Result<Self, MuxError> {
        let mut conn = connector.connect().await?;
        conn.send(listen_request()?).await?;
        timeout(connector.timeout(), conn.expect_result())
            .await
            .map_err(|_| MuxError::Timeout)??;
        debug!("mux listen handshake complete");

        let devices: DeviceMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, events) = mpsc::unbounded_channel();
        let map = Arc::clone(&devices);
        let task = tokio::spawn(async move {
            read_loop(conn, &map, &tx).await;
            // Connection gone: every record owned by it is stale.
            map.lock().clear();
        });

        Ok(Self { devices, events, task })
    }

    /// Next event, or `None` once the read loop has ended.
    pub async fn next_event(&mut self) -> Option<DeviceEvent> {
        self.events.recv().await
    }

    /// Snapshot of the live device table.
    pub fn devices(&self) -> Vec<MuxDeviceRecord> {
        self.devices.lock().values().cloned().collect()
    }

    /// Look up a live device by hardware UDID.
    pub fn find_serial(&self, serial: &str) -> Option<MuxDeviceRecord> {
        self.devices.lock().values().find(|r| r.serial == serial).cloned()
    }

    /// Shared handle to the live map, for readers that outlive `self`'s
    /// borrow. Same synchronization rules as [`DeviceEventStream::devices`].
    pub fn device_map(&self) -> DeviceMap {
        Arc::clone(&self.devices)
    }

    /// Stop the read loop and close the connection.
    pub fn stop(self) {
        // Drop does the work.
    }
}

impl Drop for DeviceEventStream {
    fn drop(&mut self) {
        self.task.abort();
        // Abort skips the read loop's own clear; shared handles from
        // device_map() must not keep serving records the daemon may have
        // already dropped.
        self.devices.lock().clear();
    }
}

async fn read_loop(
    mut conn: MuxConnection,
    map: &DeviceMap,
    tx: &mpsc::UnboundedSender<DeviceEvent>,
) {
    loop {
        let message = match conn.recv_message().await {
            Ok(message) => message,
            Err(MuxError::Recv(e)) => {
                debug!("mux event stream closed: {}", e);
                return;
            }
            Err(e) => {
                warn!("mux event stream error: {}", e);
                return;
            }
        };
        if let MuxMessage::Other(ref kind) = message {
            debug!(kind = %kind, "ignoring mux message");
            continue;
        }
        if let Some(event) = apply_message(map, &message) {
            if tx.send(event).is_err() {
                // Consumer is gone; keep the map current anyway until
                // the owner drops us.
                debug!("event consumer dropped");
            }
        }
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
