// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal HTTP/1.1 codec for transports.
//!
//! Standard HTTP clients cannot target an already-open tunnel socket, so
//! requests are serialized by hand and responses parsed incrementally.
//! [`ResponseParser`] is decoupled from any socket: it accepts arbitrary
//! chunks, completes on `Content-Length`, and otherwise completes at
//! end of stream.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// A parsed control-plane response. Non-2xx statuses are data, not
/// errors; the caller decides what to do with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Errors from reading or parsing a response.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("response read failed: {0}")]
    Read(std::io::Error),

    #[error("connection closed before response headers arrived")]
    NoHeaders,

    #[error("malformed status line: {0:?}")]
    BadStatusLine(String),

    #[error("connection closed mid-body: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Serialize one request into a single buffer: request line, headers,
/// and body together, written in one call by transports.
pub fn build_request(method: &str, path: &str, body: Option<&str>) -> Vec<u8> {
    let mut request = format!("{} {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n", method, path);
    match body {
        Some(body) => {
            request.push_str(&format!(
                "Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            ));
        }
        None => request.push_str("\r\n"),
    }
    request.into_bytes()
}

/// Incremental HTTP/1.1 response parser.
///
/// Feed chunks with [`ResponseParser::push`] until it yields a response;
/// signal end of stream with [`ResponseParser::finish`]. Without a
/// `Content-Length` header the response is complete only at end of
/// stream, never earlier.
#[derive(Debug, Default)]
pub struct ResponseParser {
    buf: Vec<u8>,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept one chunk. Returns the response once
    /// `header_end + 4 + Content-Length` bytes are buffered; `None`
    /// while incomplete or when completion needs end of stream.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<HttpResponse>, HttpError> {
        self.buf.extend_from_slice(chunk);
        let header_end = match find_header_end(&self.buf) {
            Some(i) => i,
            None => return Ok(None),
        };
        let content_length = match parse_content_length(&self.buf[..header_end]) {
            Some(len) => len,
            None => return Ok(None),
        };
        let body_start = header_end + 4;
        if self.buf.len() < body_start + content_length {
            return Ok(None);
        }
        let status = parse_status_line(&self.buf[..header_end])?;
        let body = String::from_utf8_lossy(&self.buf[body_start..body_start + content_length])
            .into_owned();
        Ok(Some(HttpResponse { status, body }))
    }

    /// End of stream: everything buffered past the headers is the body.
    pub fn finish(self) -> Result<HttpResponse, HttpError> {
        let header_end = find_header_end(&self.buf).ok_or(HttpError::NoHeaders)?;
        let body_start = header_end + 4;
        if let Some(expected) = parse_content_length(&self.buf[..header_end]) {
            let actual = self.buf.len() - body_start;
            if actual < expected {
                return Err(HttpError::Truncated { expected, actual });
            }
        }
        let status = parse_status_line(&self.buf[..header_end])?;
        let body = String::from_utf8_lossy(&self.buf[body_start..]).into_owned();
        Ok(HttpResponse { status, body })
    }
}

/// Drive the parser from a stream until a complete response or EOF.
pub async fn read_response<R: AsyncRead + Unpin>(mut reader: R) -> Result<HttpResponse, HttpError> {
    let mut parser = ResponseParser::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await.map_err(HttpError::Read)?;
        if n == 0 {
            return parser.finish();
        }
        if let Some(response) = parser.push(&chunk[..n])? {
            return Ok(response);
        }
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_status_line(headers: &[u8]) -> Result<u16, HttpError> {
    let text = String::from_utf8_lossy(headers);
    let line = text.split("\r\n").next().unwrap_or_default();
    line.split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| HttpError::BadStatusLine(line.to_string()))
}

fn parse_content_length(headers: &[u8]) -> Option<usize> {
    let text = String::from_utf8_lossy(headers);
    for line in text.split("\r\n").skip(1) {
        let lower = line.to_ascii_lowercase();
        if let Some(value) = lower.strip_prefix("content-length:") {
            return value.trim().parse().ok();
        }
    }
    None
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
