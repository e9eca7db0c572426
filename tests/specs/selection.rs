// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Selection lifecycle specs: auto-select fallbacks and event-driven
//! invalidation.

use std::sync::Arc;
use std::time::Duration;

use devlink_devices::{DeviceEnumerator, DeviceManager, DeviceRegistry, SelectionError};
use devlink_mux::testing::FakeMuxd;
use devlink_mux::{DeviceEvent, DeviceEventStream};

use super::prelude::*;

#[tokio::test]
async fn cold_simulator_is_booted_before_selection() {
    let muxd = FakeMuxd::spawn().await.unwrap();
    let enumerator = Arc::new(StaticEnumerator::new(vec![simulator("SIM-COLD", false)]));
    let manager =
        DeviceManager::new(
            DeviceRegistry::new(Arc::clone(&enumerator) as Arc<dyn DeviceEnumerator>),
            muxd.connector(),
        );

    let udid = manager.auto_select_device().await.unwrap();

    assert_eq!(udid, "SIM-COLD");
    assert_eq!(*enumerator.booted.lock(), vec!["SIM-COLD".to_string()]);
    // The boot takes effect: a fresh enumeration now sees it connected.
    assert!(enumerator.devices.lock().iter().all(|d| d.connected));
}

#[tokio::test]
async fn empty_inventory_fails_with_no_device_available() {
    let muxd = FakeMuxd::spawn().await.unwrap();
    let enumerator = Arc::new(StaticEnumerator::new(vec![]));
    let manager = DeviceManager::new(DeviceRegistry::new(enumerator), muxd.connector());

    let err = manager.auto_select_device().await.unwrap_err();
    assert!(matches!(err, SelectionError::NoDeviceAvailable));
}

#[tokio::test]
async fn unplugging_the_selected_device_clears_the_selection() {
    let muxd = FakeMuxd::spawn().await.unwrap();
    muxd.attach(mux_record(7, "00008120-AAAA"));

    let enumerator = Arc::new(StaticEnumerator::new(vec![physical("00008120-AAAA", true)]));
    let manager = DeviceManager::new(DeviceRegistry::new(enumerator), muxd.connector());
    manager.select_device("00008120-AAAA").await.unwrap();

    let stream = DeviceEventStream::start(&muxd.connector()).await.unwrap();
    let watcher = manager.watch_detachments(stream);

    muxd.detach(7);
    for _ in 0..50 {
        if manager.selection().is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(manager.selection(), None);

    // With nothing selected, transports are refused.
    let err = manager.get_transport().unwrap_err();
    assert!(matches!(err, SelectionError::NoDeviceSelected));
    watcher.abort();
}

#[tokio::test]
async fn event_stream_reports_attach_then_detach_in_order() {
    let muxd = FakeMuxd::spawn().await.unwrap();
    let mut stream = DeviceEventStream::start(&muxd.connector()).await.unwrap();

    muxd.attach(mux_record(1, "A"));
    muxd.attach(mux_record(2, "B"));
    muxd.detach(1);

    assert_eq!(stream.next_event().await, Some(DeviceEvent::Attached(mux_record(1, "A"))));
    assert_eq!(stream.next_event().await, Some(DeviceEvent::Attached(mux_record(2, "B"))));
    assert_eq!(stream.next_event().await, Some(DeviceEvent::Detached(mux_record(1, "A"))));

    let remaining = stream.devices();
    assert_eq!(remaining, vec![mux_record(2, "B")]);
}
