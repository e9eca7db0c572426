// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process fake mux daemon for tests.
//!
//! Speaks the real wire format on a temp-path Unix socket: answers
//! `Listen` with a `Result` plus the current device set, pushes scripted
//! attach/detach events to live listeners, and turns a successful
//! `Connect` into a one-request HTTP responder so transports can be
//! exercised end to end.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use devlink_wire::{attached_event, detached_event, result_reply, MuxDeviceRecord, MuxRequest, Packet};
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::connection::{read_packet, write_packet};
use crate::MuxConnector;

/// `Result.Number` the real daemon uses for a `Connect` to an unknown
/// device.
pub const RESULT_BAD_DEVICE: u64 = 2;

type Responder = dyn Fn(&[u8]) -> Vec<u8> + Send + Sync;

#[derive(Clone)]
enum FakeEvent {
    Attached(MuxDeviceRecord),
    Detached(u32),
}

struct Shared {
    devices: Mutex<Vec<MuxDeviceRecord>>,
    listen_result: AtomicU64,
    connect_result: AtomicU64,
    tunnels_opened: AtomicUsize,
    responder: Mutex<Arc<Responder>>,
    events: broadcast::Sender<FakeEvent>,
    /// Per-connection tasks, aborted on drop so live listeners see the
    /// daemon disappear.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Handle to a running fake daemon. Dropping it stops the accept loop
/// and disconnects live listeners.
pub struct FakeMuxd {
    socket_path: PathBuf,
    shared: Arc<Shared>,
    accept_task: JoinHandle<()>,
    _dir: tempfile::TempDir,
}

impl FakeMuxd {
    /// Bind a fresh daemon on a temp socket with no devices attached.
    pub async fn spawn() -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let socket_path = dir.path().join("muxd.sock");
        let listener = UnixListener::bind(&socket_path)?;

        let (events, _) = broadcast::channel(64);
        let shared = Arc::new(Shared {
            devices: Mutex::new(Vec::new()),
            listen_result: AtomicU64::new(0),
            connect_result: AtomicU64::new(0),
            tunnels_opened: AtomicUsize::new(0),
            responder: Mutex::new(Arc::new(default_responder)),
            events,
            tasks: Mutex::new(Vec::new()),
        });

        let accept_shared = Arc::clone(&shared);
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        let shared = Arc::clone(&accept_shared);
                        let task = tokio::spawn({
                            let shared = Arc::clone(&shared);
                            async move {
                                let _ = handle_connection(stream, &shared).await;
                            }
                        });
                        shared.tasks.lock().push(task);
                    }
                    Err(_) => return,
                }
            }
        });

        Ok(Self { socket_path, shared, accept_task, _dir: dir })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Connector pointed at this fake, with a test-friendly deadline.
    pub fn connector(&self) -> MuxConnector {
        MuxConnector::new(self.socket_path.clone(), Duration::from_secs(2))
    }

    /// Connector with a custom deadline, for timeout-path tests.
    pub fn connector_with_timeout(&self, timeout: Duration) -> MuxConnector {
        MuxConnector::new(self.socket_path.clone(), timeout)
    }

    /// Attach a device: joins the table and is pushed to live listeners.
    pub fn attach(&self, record: MuxDeviceRecord) {
        self.shared.devices.lock().push(record.clone());
        let _ = self.shared.events.send(FakeEvent::Attached(record));
    }

    /// Detach a device by mux id.
    pub fn detach(&self, device_id: u32) {
        self.shared.devices.lock().retain(|r| r.device_id != device_id);
        let _ = self.shared.events.send(FakeEvent::Detached(device_id));
    }

    /// Refuse future `Listen` handshakes with this result number.
    pub fn refuse_listen(&self, number: u64) {
        self.shared.listen_result.store(number, Ordering::SeqCst);
    }

    /// Refuse future `Connect` handshakes with this result number.
    pub fn refuse_connect(&self, number: u64) {
        self.shared.connect_result.store(number, Ordering::SeqCst);
    }

    /// Replace the HTTP responder behind tunnels. Receives the raw
    /// request bytes, returns the raw response bytes.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        *self.shared.responder.lock() = Arc::new(responder);
    }

    /// How many tunnels have completed the `Connect` handshake.
    pub fn tunnels_opened(&self) -> usize {
        self.shared.tunnels_opened.load(Ordering::SeqCst)
    }
}

impl Drop for FakeMuxd {
    fn drop(&mut self) {
        self.accept_task.abort();
        for task in self.shared.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

fn default_responder(_request: &[u8]) -> Vec<u8> {
    let body = r#"{"status":"ok"}"#;
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

async fn handle_connection(mut stream: UnixStream, shared: &Shared) -> std::io::Result<()> {
    let packet = match read_packet(&mut stream).await {
        Ok(packet) => packet,
        Err(_) => return Ok(()),
    };
    let request = match MuxRequest::parse(&packet.payload) {
        Ok(request) => request,
        Err(_) => return Ok(()),
    };

    match request {
        MuxRequest::Listen => handle_listen(stream, shared, packet.header.tag).await,
        MuxRequest::Connect { device_id, .. } => {
            handle_connect(stream, shared, packet.header.tag, device_id).await
        }
        MuxRequest::Other(_) => Ok(()),
    }
}

async fn reply(stream: &mut UnixStream, tag: u32, number: u64) -> std::io::Result<()> {
    let payload = result_reply(number).map_err(other)?;
    write_packet(stream, &Packet::plist(tag, payload)).await.map_err(other)
}

async fn handle_listen(mut stream: UnixStream, shared: &Shared, tag: u32) -> std::io::Result<()> {
    let refusal = shared.listen_result.load(Ordering::SeqCst);
    reply(&mut stream, tag, refusal).await?;
    if refusal != 0 {
        return Ok(());
    }

    // Subscribe before the snapshot so nothing attached in between is
    // lost; a duplicate Attached is a harmless upsert on the client.
    let mut rx = shared.events.subscribe();
    let snapshot: Vec<MuxDeviceRecord> = shared.devices.lock().clone();
    for record in &snapshot {
        let payload = attached_event(record).map_err(other)?;
        write_packet(&mut stream, &Packet::plist(0, payload)).await.map_err(other)?;
    }

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        };
        let payload = match event {
            FakeEvent::Attached(record) => attached_event(&record).map_err(other)?,
            FakeEvent::Detached(device_id) => detached_event(device_id).map_err(other)?,
        };
        if write_packet(&mut stream, &Packet::plist(0, payload)).await.is_err() {
            return Ok(());
        }
    }
}

async fn handle_connect(
    mut stream: UnixStream,
    shared: &Shared,
    tag: u32,
    device_id: u32,
) -> std::io::Result<()> {
    let refusal = shared.connect_result.load(Ordering::SeqCst);
    if refusal != 0 {
        return reply(&mut stream, tag, refusal).await;
    }
    let known = shared.devices.lock().iter().any(|r| r.device_id == device_id);
    if !known {
        return reply(&mut stream, tag, RESULT_BAD_DEVICE).await;
    }

    reply(&mut stream, tag, 0).await?;
    shared.tunnels_opened.fetch_add(1, Ordering::SeqCst);

    // Raw pipe from here on: one HTTP exchange, then close.
    let request = read_http_request(&mut stream).await?;
    let response = {
        let responder = Arc::clone(&*shared.responder.lock());
        responder(&request)
    };
    tokio::io::AsyncWriteExt::write_all(&mut stream, &response).await?;
    Ok(())
}

/// Accumulate one HTTP/1.1 request: headers plus a `Content-Length` body
/// when present.
async fn read_http_request(stream: &mut UnixStream) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        if let Some(header_end) = find_header_end(&buf) {
            let content_length = parse_content_length(&buf[..header_end]).unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                return Ok(buf);
            }
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(buf);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_content_length(headers: &[u8]) -> Option<usize> {
    let text = String::from_utf8_lossy(headers);
    for line in text.split("\r\n") {
        let lower = line.to_ascii_lowercase();
        if let Some(value) = lower.strip_prefix("content-length:") {
            return value.trim().parse().ok();
        }
    }
    None
}

fn other<E: std::fmt::Display>(e: E) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}
