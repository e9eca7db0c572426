// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One connection to the mux daemon socket.
//!
//! Packets are strictly ordered within a connection. Any receive error or
//! short read is fatal for the connection; there is no resynchronization.

use std::path::Path;

use devlink_wire::{MuxMessage, Packet, WireHeader, HEADER_LEN};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

use crate::MuxError;

/// Upper bound on a declared payload. Real daemon payloads are well under
/// a kilobyte; anything larger means a corrupted stream.
const MAX_PAYLOAD: usize = 1 << 20;

/// A client connection to the mux daemon.
#[derive(Debug)]
pub struct MuxConnection {
    stream: UnixStream,
    next_tag: u32,
}

impl MuxConnection {
    /// Open the daemon socket.
    pub async fn connect(path: &Path) -> Result<Self, MuxError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| MuxError::Connect { path: path.to_path_buf(), source })?;
        debug!(path = %path.display(), "connected to mux daemon");
        Ok(Self { stream, next_tag: 1 })
    }

    /// Send one plist payload as a complete packet, returning the tag it
    /// was sent under. Tags increment per connection; the event stream
    /// does not correlate on them, so they are informational.
    pub async fn send(&mut self, payload: Vec<u8>) -> Result<u32, MuxError> {
        let tag = self.next_tag;
        self.next_tag = self.next_tag.wrapping_add(1);
        let packet = Packet::plist(tag, payload);
        write_packet(&mut self.stream, &packet).await?;
        Ok(tag)
    }

    /// Receive one complete packet: exactly 16 header bytes, then exactly
    /// the declared payload.
    pub async fn recv(&mut self) -> Result<Packet, MuxError> {
        read_packet(&mut self.stream).await
    }

    /// Receive and parse one daemon message.
    pub async fn recv_message(&mut self) -> Result<MuxMessage, MuxError> {
        let packet = self.recv().await?;
        Ok(MuxMessage::parse(&packet.payload)?)
    }

    /// Read the next message as a handshake reply. `Result.Number != 0`
    /// is a refusal; anything other than a `Result` is a protocol error.
    pub async fn expect_result(&mut self) -> Result<(), MuxError> {
        match self.recv_message().await? {
            MuxMessage::Result { number: 0 } => Ok(()),
            MuxMessage::Result { number } => Err(MuxError::Refused(number)),
            other => Err(MuxError::Unexpected(format!("{:?}", other))),
        }
    }

    /// Consume the connection, yielding the raw socket. Used after a
    /// successful `Connect` handshake, when mux framing no longer applies.
    pub fn into_stream(self) -> UnixStream {
        self.stream
    }
}

/// Write a packet as one contiguous buffer. `write_all` retries short
/// writes internally; any error is fatal for the connection.
pub(crate) async fn write_packet<W: AsyncWrite + Unpin>(
    writer: &mut W,
    packet: &Packet,
) -> Result<(), MuxError> {
    writer.write_all(&packet.encode()).await.map_err(MuxError::Send)
}

/// Read exactly one packet from the stream.
pub(crate) async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Packet, MuxError> {
    let mut header_buf = [0u8; HEADER_LEN];
    reader.read_exact(&mut header_buf).await.map_err(MuxError::Recv)?;
    let header = WireHeader::decode(&header_buf)?;

    let total = header.size as usize;
    if total < HEADER_LEN || total - HEADER_LEN > MAX_PAYLOAD {
        return Err(MuxError::Recv(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("implausible packet size {}", header.size),
        )));
    }

    let mut payload = vec![0u8; total - HEADER_LEN];
    reader.read_exact(&mut payload).await.map_err(MuxError::Recv)?;
    Ok(Packet { header, payload })
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
