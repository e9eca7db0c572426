// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plist payload construction and parsing.
//!
//! Every mux payload is a property-list dictionary whose `MessageType`
//! string selects the operation: `Listen` and `Connect` from the client,
//! `Result`, `Attached`, and `Detached` from the daemon. Requests are
//! encoded as XML plists; responses are decoded format-agnostically.

use std::io::Cursor;

use plist::{Dictionary, Value};

use crate::WireError;

/// Client version string sent in every request.
pub const CLIENT_VERSION: &str = concat!("devlink-", env!("CARGO_PKG_VERSION"));

/// Program name sent in every request.
pub const PROG_NAME: &str = "devlink";

/// Swap the two bytes of a port number.
///
/// The `Connect` payload carries the target port in byte-swapped form,
/// a quirk inherited from the protocol's original sockaddr-based layout.
/// Port 22087 (`0x5647`) goes on the wire as 18262 (`0x4756`).
pub fn swap_port(port: u16) -> u16 {
    port.swap_bytes()
}

fn request_dict(message_type: &str) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.insert("MessageType".into(), Value::String(message_type.into()));
    dict.insert("ClientVersionString".into(), Value::String(CLIENT_VERSION.into()));
    dict.insert("ProgName".into(), Value::String(PROG_NAME.into()));
    dict
}

fn encode_dict(dict: Dictionary) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::new();
    Value::Dictionary(dict).to_writer_xml(&mut buf)?;
    Ok(buf)
}

/// Payload for a `Listen` request (subscribe to attach/detach events).
pub fn listen_request() -> Result<Vec<u8>, WireError> {
    encode_dict(request_dict("Listen"))
}

/// Payload for a `Connect` request opening a tunnel to `port` on the
/// device identified by its mux-internal `device_id`.
pub fn connect_request(device_id: u32, port: u16) -> Result<Vec<u8>, WireError> {
    let mut dict = request_dict("Connect");
    dict.insert("DeviceID".into(), Value::from(u64::from(device_id)));
    dict.insert("PortNumber".into(), Value::from(u64::from(swap_port(port))));
    encode_dict(dict)
}

/// Payload for a `Result` reply. Daemon-side; exists for fakes and tests.
pub fn result_reply(number: u64) -> Result<Vec<u8>, WireError> {
    let mut dict = Dictionary::new();
    dict.insert("MessageType".into(), Value::String("Result".into()));
    dict.insert("Number".into(), Value::from(number));
    encode_dict(dict)
}

/// Payload for an `Attached` event. Daemon-side; exists for fakes and tests.
pub fn attached_event(record: &MuxDeviceRecord) -> Result<Vec<u8>, WireError> {
    let mut props = Dictionary::new();
    props.insert("DeviceID".into(), Value::from(u64::from(record.device_id)));
    props.insert("SerialNumber".into(), Value::String(record.serial.clone()));
    if let Some(ref ct) = record.connection_type {
        props.insert("ConnectionType".into(), Value::String(ct.clone()));
    }
    if let Some(pid) = record.product_id {
        props.insert("ProductID".into(), Value::from(pid));
    }
    if let Some(lid) = record.location_id {
        props.insert("LocationID".into(), Value::from(lid));
    }
    let mut dict = Dictionary::new();
    dict.insert("MessageType".into(), Value::String("Attached".into()));
    dict.insert("DeviceID".into(), Value::from(u64::from(record.device_id)));
    dict.insert("Properties".into(), Value::Dictionary(props));
    encode_dict(dict)
}

/// Payload for a `Detached` event. Daemon-side; exists for fakes and tests.
pub fn detached_event(device_id: u32) -> Result<Vec<u8>, WireError> {
    let mut dict = Dictionary::new();
    dict.insert("MessageType".into(), Value::String("Detached".into()));
    dict.insert("DeviceID".into(), Value::from(u64::from(device_id)));
    encode_dict(dict)
}

/// A device as seen by the mux daemon. Created from an `Attached` event;
/// keyed by `device_id` until the matching `Detached` arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxDeviceRecord {
    /// Mux-internal device id, the key for `Connect` and `Detached`.
    pub device_id: u32,
    /// Hardware UDID (the daemon calls it `SerialNumber`).
    pub serial: String,
    pub connection_type: Option<String>,
    pub product_id: Option<u64>,
    pub location_id: Option<u64>,
}

/// A decoded daemon-to-client payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxMessage {
    /// Reply to `Listen`/`Connect`. `number == 0` means success.
    Result { number: u64 },
    Attached(MuxDeviceRecord),
    Detached { device_id: u32 },
    /// Any other message type. Ignored by every consumer.
    Other(String),
}

impl MuxMessage {
    /// Parse a payload. Unknown message types decode to [`MuxMessage::Other`];
    /// malformed plists and missing required fields are errors.
    pub fn parse(payload: &[u8]) -> Result<Self, WireError> {
        let value = Value::from_reader(Cursor::new(payload))?;
        let dict = match value.as_dictionary() {
            Some(d) => d,
            None => return Err(WireError::MissingField("MessageType")),
        };

        // Some daemons omit MessageType on Result replies; a bare Number
        // is treated as one.
        let message_type = match dict.get("MessageType").and_then(Value::as_string) {
            Some(t) => t,
            None if dict.contains_key("Number") => "Result",
            None => return Err(WireError::MissingField("MessageType")),
        };

        match message_type {
            "Result" => {
                let number = dict_u64(dict, "Number").ok_or(WireError::MissingField("Number"))?;
                Ok(Self::Result { number })
            }
            "Attached" => {
                let props = dict
                    .get("Properties")
                    .and_then(Value::as_dictionary)
                    .ok_or(WireError::MissingField("Properties"))?;
                let device_id =
                    dict_u64(props, "DeviceID").ok_or(WireError::MissingField("DeviceID"))?;
                let serial = props
                    .get("SerialNumber")
                    .and_then(Value::as_string)
                    .ok_or(WireError::MissingField("SerialNumber"))?;
                Ok(Self::Attached(MuxDeviceRecord {
                    device_id: device_id as u32,
                    serial: serial.to_string(),
                    connection_type: props
                        .get("ConnectionType")
                        .and_then(Value::as_string)
                        .map(str::to_string),
                    product_id: dict_u64(props, "ProductID"),
                    location_id: dict_u64(props, "LocationID"),
                }))
            }
            "Detached" => {
                // The id arrives top-level or under Properties depending
                // on the daemon version.
                let device_id = dict_u64(dict, "DeviceID")
                    .or_else(|| {
                        dict.get("Properties")
                            .and_then(Value::as_dictionary)
                            .and_then(|p| dict_u64(p, "DeviceID"))
                    })
                    .ok_or(WireError::MissingField("DeviceID"))?;
                Ok(Self::Detached { device_id: device_id as u32 })
            }
            other => Ok(Self::Other(other.to_string())),
        }
    }
}

/// A decoded client-to-daemon payload. The daemon side of the protocol,
/// used by in-process fakes standing in for the real mux daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxRequest {
    Listen,
    Connect {
        device_id: u32,
        /// Port exactly as carried on the wire, still byte-swapped.
        port_swapped: u16,
    },
    Other(String),
}

impl MuxRequest {
    pub fn parse(payload: &[u8]) -> Result<Self, WireError> {
        let value = Value::from_reader(Cursor::new(payload))?;
        let dict = value.as_dictionary().ok_or(WireError::MissingField("MessageType"))?;
        let message_type = dict
            .get("MessageType")
            .and_then(Value::as_string)
            .ok_or(WireError::MissingField("MessageType"))?;
        match message_type {
            "Listen" => Ok(Self::Listen),
            "Connect" => {
                let device_id =
                    dict_u64(dict, "DeviceID").ok_or(WireError::MissingField("DeviceID"))?;
                let port =
                    dict_u64(dict, "PortNumber").ok_or(WireError::MissingField("PortNumber"))?;
                Ok(Self::Connect { device_id: device_id as u32, port_swapped: port as u16 })
            }
            other => Ok(Self::Other(other.to_string())),
        }
    }
}

/// Integer lookup tolerant of signed/unsigned plist encodings.
fn dict_u64(dict: &Dictionary, key: &str) -> Option<u64> {
    let value = dict.get(key)?;
    value
        .as_unsigned_integer()
        .or_else(|| value.as_signed_integer().and_then(|n| u64::try_from(n).ok()))
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
