// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manager tests: selection state machine and auto-select priority.

use std::sync::Arc;
use std::time::Duration;

use devlink_mux::testing::FakeMuxd;
use devlink_mux::{DeviceEventStream, MuxConnector};
use devlink_wire::MuxDeviceRecord;

use super::*;
use crate::test_fixtures::{phys, sim, FakeEnumerator};

fn manager(enumerator: FakeEnumerator) -> DeviceManager {
    // Selection tests never touch the socket; any path will do.
    let connector = MuxConnector::new("/nonexistent/muxd.sock", Duration::from_millis(100));
    DeviceManager::new(DeviceRegistry::new(Arc::new(enumerator)), connector)
}

#[tokio::test]
async fn select_known_device() {
    let mgr = manager(FakeEnumerator::new(vec![sim("S1", true)], vec![]));

    mgr.select_device("S1").await.unwrap();
    assert_eq!(
        mgr.selection(),
        Some(Selection { udid: "S1".to_string(), kind: DeviceKind::Simulator })
    );
}

#[tokio::test]
async fn select_unknown_device_leaves_state_unselected() {
    let mgr = manager(FakeEnumerator::new(vec![sim("S1", true)], vec![]));

    let err = mgr.select_device("no-such-udid").await.unwrap_err();
    assert!(matches!(err, SelectionError::DeviceNotFound(ref u) if u == "no-such-udid"));
    assert_eq!(mgr.selection(), None);
}

#[tokio::test]
async fn failed_select_keeps_the_previous_selection() {
    let mgr = manager(FakeEnumerator::new(vec![sim("S1", true)], vec![]));
    mgr.select_device("S1").await.unwrap();

    let _ = mgr.select_device("no-such-udid").await.unwrap_err();
    assert_eq!(mgr.selection().map(|s| s.udid), Some("S1".to_string()));
}

#[tokio::test]
async fn clear_selection_always_succeeds() {
    let mgr = manager(FakeEnumerator::new(vec![sim("S1", true)], vec![]));
    mgr.select_device("S1").await.unwrap();

    mgr.clear_selection();
    assert_eq!(mgr.selection(), None);

    // Clearing an empty selection is fine too.
    mgr.clear_selection();
    assert_eq!(mgr.selection(), None);
}

#[tokio::test]
async fn auto_select_prefers_connected_physical() {
    let mgr = manager(FakeEnumerator::new(vec![sim("SIM-BOOTED", true)], vec![phys("PHYS", true)]));

    let udid = mgr.auto_select_device().await.unwrap();
    assert_eq!(udid, "PHYS");
    assert_eq!(mgr.selection().map(|s| s.kind), Some(DeviceKind::Physical));
}

#[tokio::test]
async fn auto_select_falls_back_to_booted_simulator() {
    let mgr = manager(FakeEnumerator::new(
        vec![sim("SIM-OFF", false), sim("SIM-BOOTED", true)],
        vec![phys("PHYS-OFF", false)],
    ));

    let udid = mgr.auto_select_device().await.unwrap();
    assert_eq!(udid, "SIM-BOOTED");
}

#[tokio::test]
async fn auto_select_boots_a_simulator_as_last_resort() {
    let enumerator = FakeEnumerator::new(vec![sim("SIM-OFF", false)], vec![]);
    let mgr = manager(enumerator);

    let udid = mgr.auto_select_device().await.unwrap();
    assert_eq!(udid, "SIM-OFF");
    assert_eq!(mgr.selection().map(|s| s.kind), Some(DeviceKind::Simulator));
}

#[tokio::test]
async fn auto_select_with_nothing_available_fails() {
    let mgr = manager(FakeEnumerator::new(vec![], vec![]));

    let err = mgr.auto_select_device().await.unwrap_err();
    assert!(matches!(err, SelectionError::NoDeviceAvailable));
    assert_eq!(mgr.selection(), None);
}

#[tokio::test]
async fn disconnected_physical_does_not_win_auto_select() {
    let mgr =
        manager(FakeEnumerator::new(vec![sim("SIM-BOOTED", true)], vec![phys("PHYS-OFF", false)]));

    let udid = mgr.auto_select_device().await.unwrap();
    assert_eq!(udid, "SIM-BOOTED");
}

#[tokio::test]
async fn get_transport_requires_a_selection() {
    let mgr = manager(FakeEnumerator::new(vec![sim("S1", true)], vec![]));

    let err = mgr.get_transport().unwrap_err();
    assert!(matches!(err, SelectionError::NoDeviceSelected));
}

#[tokio::test]
async fn get_or_auto_select_selects_first() {
    let mgr = manager(FakeEnumerator::new(vec![sim("S1", true)], vec![]));

    let _transport = mgr.get_or_auto_select_transport().await.unwrap();
    assert_eq!(mgr.selection().map(|s| s.udid), Some("S1".to_string()));
}

#[tokio::test]
async fn get_or_auto_select_keeps_an_existing_selection() {
    let mgr = manager(FakeEnumerator::new(vec![sim("S1", false), sim("S2", true)], vec![]));
    mgr.select_device("S1").await.unwrap();

    let _transport = mgr.get_or_auto_select_transport().await.unwrap();
    assert_eq!(mgr.selection().map(|s| s.udid), Some("S1".to_string()));
}

#[tokio::test]
async fn enumeration_failure_surfaces_from_selection() {
    let enumerator = FakeEnumerator::new(vec![sim("S1", true)], vec![]);
    *enumerator.fail_simulators.lock() = true;
    let mgr = manager(enumerator);

    let err = mgr.select_device("S1").await.unwrap_err();
    assert!(matches!(err, SelectionError::Enumeration(_)));
}

#[tokio::test]
async fn detachment_clears_a_matching_selection() {
    let muxd = FakeMuxd::spawn().await.unwrap();
    let record = MuxDeviceRecord {
        device_id: 7,
        serial: "PHYS".to_string(),
        connection_type: Some("USB".to_string()),
        product_id: None,
        location_id: None,
    };
    muxd.attach(record);

    let enumerator = FakeEnumerator::new(vec![], vec![phys("PHYS", true)]);
    let mgr = DeviceManager::new(
        DeviceRegistry::new(Arc::new(enumerator)),
        muxd.connector(),
    );
    mgr.select_device("PHYS").await.unwrap();

    let stream = DeviceEventStream::start(&muxd.connector()).await.unwrap();
    let watcher = mgr.watch_detachments(stream);

    muxd.detach(7);
    // The watcher runs on its own task; poll briefly for the effect.
    for _ in 0..50 {
        if mgr.selection().is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(mgr.selection(), None);
    watcher.abort();
}

#[tokio::test]
async fn detachment_of_another_device_keeps_the_selection() {
    let muxd = FakeMuxd::spawn().await.unwrap();
    let record = MuxDeviceRecord {
        device_id: 8,
        serial: "OTHER".to_string(),
        connection_type: None,
        product_id: None,
        location_id: None,
    };
    muxd.attach(record);

    let enumerator = FakeEnumerator::new(vec![], vec![phys("PHYS", true)]);
    let mgr = DeviceManager::new(
        DeviceRegistry::new(Arc::new(enumerator)),
        muxd.connector(),
    );
    mgr.select_device("PHYS").await.unwrap();

    let stream = DeviceEventStream::start(&muxd.connector()).await.unwrap();
    let watcher = mgr.watch_detachments(stream);

    muxd.detach(8);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mgr.selection().map(|s| s.udid), Some("PHYS".to_string()));
    watcher.abort();
}
