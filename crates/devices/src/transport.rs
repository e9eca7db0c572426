// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane transports.
//!
//! Both transports satisfy the same `get`/`post` contract so the device
//! manager can substitute one for the other. Every call opens its own
//! connection and closes it after one exchange; there is no pooling or
//! pipelining.

use async_trait::async_trait;
use devlink_mux::{MuxConnector, MuxError};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use crate::http::{build_request, read_response, HttpError, HttpResponse};

/// Port the on-device control-plane service listens on, both on
/// simulators (loopback) and hardware (through the tunnel).
pub const CONTROL_PLANE_PORT: u16 = 22087;

/// Errors from a transport call.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Mux(#[from] MuxError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("failed to connect to 127.0.0.1:{port}: {source}")]
    LocalConnect {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("request write failed: {0}")]
    Write(std::io::Error),
}

/// Uniform request/response channel to one device's control plane.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn get(&self, path: &str) -> Result<HttpResponse, TransportError>;
    async fn post(&self, path: &str, body: &str) -> Result<HttpResponse, TransportError>;
}

/// Loopback transport for simulators, which share the host network.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    port: u16,
}

impl LocalTransport {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    async fn request(&self, request: Vec<u8>) -> Result<HttpResponse, TransportError> {
        let mut stream = TcpStream::connect(("127.0.0.1", self.port))
            .await
            .map_err(|source| TransportError::LocalConnect { port: self.port, source })?;
        stream.write_all(&request).await.map_err(TransportError::Write)?;
        Ok(read_response(&mut stream).await?)
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn get(&self, path: &str) -> Result<HttpResponse, TransportError> {
        self.request(build_request("GET", path, None)).await
    }

    async fn post(&self, path: &str, body: &str) -> Result<HttpResponse, TransportError> {
        self.request(build_request("POST", path, Some(body))).await
    }
}

/// Transport for physical devices: a fresh mux tunnel per request.
///
/// The UDID is resolved to the daemon's device id on first use and
/// cached. A refused tunnel drops the cache, so the next call after a
/// re-plug resolves the new id; the refusal itself still surfaces to the
/// caller, who owns retry policy.
#[derive(Debug)]
pub struct TunnelTransport {
    connector: MuxConnector,
    udid: String,
    port: u16,
    device_id: Mutex<Option<u32>>,
}

impl TunnelTransport {
    pub fn new(connector: MuxConnector, udid: impl Into<String>, port: u16) -> Self {
        Self { connector, udid: udid.into(), port, device_id: Mutex::new(None) }
    }

    async fn resolve(&self) -> Result<u32, TransportError> {
        let cached = *self.device_id.lock();
        if let Some(id) = cached {
            return Ok(id);
        }
        let id = self.connector.resolve_device_id(&self.udid).await?;
        *self.device_id.lock() = Some(id);
        Ok(id)
    }

    async fn request(&self, request: Vec<u8>) -> Result<HttpResponse, TransportError> {
        let device_id = self.resolve().await?;
        let mut stream = match self.connector.open_tunnel(device_id, self.port).await {
            Ok(stream) => stream,
            Err(e @ MuxError::Refused(_)) => {
                // Stale id: the device re-attached under a new one.
                debug!(udid = %self.udid, device_id, "tunnel refused, dropping cached id");
                *self.device_id.lock() = None;
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        stream.write_all(&request).await.map_err(TransportError::Write)?;
        Ok(read_response(&mut stream).await?)
    }
}

#[async_trait]
impl Transport for TunnelTransport {
    async fn get(&self, path: &str) -> Result<HttpResponse, TransportError> {
        self.request(build_request("GET", path, None)).await
    }

    async fn post(&self, path: &str, body: &str) -> Result<HttpResponse, TransportError> {
        self.request(build_request("POST", path, Some(body))).await
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
