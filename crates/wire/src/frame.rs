// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Packet framing: 16-byte header + raw payload.

use crate::WireError;

/// Header length in bytes. The `size` field counts these too.
pub const HEADER_LEN: usize = 16;

/// Protocol field value for property-list payloads (the only one in use).
pub const PLIST_PROTOCOL: u32 = 1;

/// Packet kind field value for property-list payloads. Always 8; the
/// actual operation lives in the payload's `MessageType`.
pub const PLIST_PACKET: u32 = 8;

/// The fixed 16-byte packet header, little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireHeader {
    /// Total packet size in bytes, header included.
    pub size: u32,
    /// Protocol version (`PLIST_PROTOCOL`).
    pub protocol: u32,
    /// Packet kind (`PLIST_PACKET`).
    pub kind: u32,
    /// Client-chosen correlation id. Informational; the daemon's event
    /// stream does not echo it back on every message.
    pub tag: u32,
}

impl WireHeader {
    /// Encode as 16 little-endian bytes regardless of host byte order.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&self.size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.protocol.to_le_bytes());
        buf[8..12].copy_from_slice(&self.kind.to_le_bytes());
        buf[12..16].copy_from_slice(&self.tag.to_le_bytes());
        buf
    }

    /// Decode a header from the first 16 bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::InvalidHeader(buf.len()));
        }
        let field = |i: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&buf[i * 4..i * 4 + 4]);
            u32::from_le_bytes(b)
        };
        Ok(Self { size: field(0), protocol: field(1), kind: field(2), tag: field(3) })
    }
}

/// One framed mux message: header plus raw plist payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: WireHeader,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a plist-payload packet. The header size is derived from the
    /// payload, upholding `size == HEADER_LEN + payload.len()`.
    pub fn plist(tag: u32, payload: Vec<u8>) -> Self {
        let header = WireHeader {
            size: (HEADER_LEN + payload.len()) as u32,
            protocol: PLIST_PROTOCOL,
            kind: PLIST_PACKET,
            tag,
        };
        Self { header, payload }
    }

    /// Serialize header + payload into one contiguous buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&self.header.encode());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode one complete packet from `buf`. Fails if the header is short
    /// or the declared payload is not fully present. No partial-packet
    /// recovery: callers treat a failure as fatal for the connection.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let header = WireHeader::decode(buf)?;
        let total = header.size as usize;
        if total < HEADER_LEN || buf.len() < total {
            return Err(WireError::ShortPayload {
                expected: total.saturating_sub(HEADER_LEN),
                actual: buf.len().saturating_sub(HEADER_LEN),
            });
        }
        Ok(Self { header, payload: buf[HEADER_LEN..total].to_vec() })
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
