// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for the local device multiplexer daemon.
//!
//! Wire format: 16-byte little-endian header + property-list payload.
//! The header's packet kind is fixed; the operation is carried by the
//! payload's `MessageType` field.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod frame;
mod message;

pub use frame::{Packet, WireHeader, HEADER_LEN, PLIST_PACKET, PLIST_PROTOCOL};
pub use message::{
    attached_event, connect_request, detached_event, listen_request, result_reply, swap_port,
    MuxDeviceRecord, MuxMessage, MuxRequest, CLIENT_VERSION, PROG_NAME,
};

use thiserror::Error;

/// Errors from encoding or decoding mux packets.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid packet header: need {HEADER_LEN} bytes, have {0}")]
    InvalidHeader(usize),

    #[error("short payload: header declares {expected} bytes, have {actual}")]
    ShortPayload { expected: usize, actual: usize },

    #[error("plist error: {0}")]
    Plist(#[from] plist::Error),

    #[error("missing payload field: {0}")]
    MissingField(&'static str),
}
