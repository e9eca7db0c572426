// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end transport specs: auto-select a device, reach its control
//! plane through the mux daemon.

use devlink_devices::{DeviceManager, DeviceRegistry};
use devlink_mux::testing::FakeMuxd;
use std::sync::Arc;

use super::prelude::*;

#[tokio::test]
async fn physical_device_request_goes_through_a_tunnel() {
    let muxd = FakeMuxd::spawn().await.unwrap();
    muxd.attach(mux_record(3, "00008120-AAAA"));

    let enumerator = Arc::new(StaticEnumerator::new(vec![
        simulator("SIM-1", true),
        physical("00008120-AAAA", true),
    ]));
    let manager = DeviceManager::new(DeviceRegistry::new(enumerator), muxd.connector());

    // Priority: connected hardware beats a booted simulator.
    let udid = manager.auto_select_device().await.unwrap();
    assert_eq!(udid, "00008120-AAAA");

    let transport = manager.get_transport().unwrap();
    let response = transport.get("/status").await.unwrap();
    assert_eq!(response.status, 200);

    let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(muxd.tunnels_opened(), 1);
}

#[tokio::test]
async fn each_request_opens_its_own_tunnel() {
    let muxd = FakeMuxd::spawn().await.unwrap();
    muxd.attach(mux_record(3, "00008120-AAAA"));

    let enumerator = Arc::new(StaticEnumerator::new(vec![physical("00008120-AAAA", true)]));
    let manager = DeviceManager::new(DeviceRegistry::new(enumerator), muxd.connector());

    let transport = manager.get_or_auto_select_transport().await.unwrap();
    transport.get("/status").await.unwrap();
    transport.post("/session", r#"{"bundle":"com.example.app"}"#).await.unwrap();

    assert_eq!(muxd.tunnels_opened(), 2);
}

#[tokio::test]
async fn control_plane_errors_reach_the_caller() {
    let muxd = FakeMuxd::spawn().await.unwrap();
    muxd.attach(mux_record(3, "00008120-AAAA"));
    muxd.set_responder(|_| {
        let body = r#"{"error":"element not found"}"#;
        format!(
            "HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    });

    let enumerator = Arc::new(StaticEnumerator::new(vec![physical("00008120-AAAA", true)]));
    let manager = DeviceManager::new(DeviceRegistry::new(enumerator), muxd.connector());
    manager.select_device("00008120-AAAA").await.unwrap();

    let transport = manager.get_transport().unwrap();
    let response = transport.get("/element/42").await.unwrap();

    assert_eq!(response.status, 404);
    assert!(response.body.contains("element not found"));
}
