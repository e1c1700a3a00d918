//! Control socket transport
//!
//! Requests and events travel as JSON lines over a Unix socket. A
//! connection sends one request per line; the connection that successfully
//! binds as the window manager is kept open and becomes the event stream.
//!
//! Reads carry a short timeout so a stalled client cannot block the event
//! loop; oversized and malformed messages are rejected before dispatch.

use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::{Event, Request};

/// Maximum wire message size (1 MB)
const MAX_WIRE_MESSAGE_SIZE: usize = 1024 * 1024;

/// Wire errors
#[derive(Debug, Error)]
pub enum WireError {
    /// Timeout reading from socket
    #[error("timeout reading from socket")]
    Timeout,

    /// IO error during read/write
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON parse error
    #[error("failed to parse JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Empty message received
    #[error("empty message received")]
    EmptyMessage,

    /// Message too large
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Read a single request from a Unix stream.
///
/// Returns the parsed request and the stream for the reply path.
///
/// # Errors
///
/// Returns `WireError::Timeout` if the read times out.
/// Returns `WireError::Io` for other IO errors.
/// Returns `WireError::ParseError` if JSON parsing fails.
/// Returns `WireError::EmptyMessage` if an empty line is received.
pub fn read_request(stream: UnixStream) -> Result<(Request, UnixStream), WireError> {
    // Short timeout so a stalled client cannot block the compositor.
    // On macOS, set_read_timeout returns EINVAL on socket pairs when the peer
    // has already disconnected — ignore that since reads will return EOF anyway.
    if let Err(e) = stream.set_read_timeout(Some(std::time::Duration::from_millis(100))) {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => return Err(WireError::Timeout),
            io::ErrorKind::InvalidInput => {} // peer already gone, reads won't block
            _ => return Err(WireError::Io(e)),
        }
    }

    let mut reader = BufReader::new(stream);

    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => return Err(WireError::EmptyMessage),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
            return Err(WireError::Timeout);
        }
        Err(e) => return Err(WireError::Io(e)),
    }

    if line.trim().is_empty() {
        return Err(WireError::EmptyMessage);
    }

    if line.len() > MAX_WIRE_MESSAGE_SIZE {
        return Err(WireError::MessageTooLarge {
            size: line.len(),
            max: MAX_WIRE_MESSAGE_SIZE,
        });
    }

    tracing::debug!(message = %line.trim(), "received wire request");

    let request: Request = serde_json::from_str(&line)?;
    Ok((request, reader.into_inner()))
}

/// Send one event as a JSON line.
///
/// Returns an error if the event cannot be written within the timeout so a
/// disconnected client cannot hang the server.
pub fn send_event(stream: &mut UnixStream, event: &Event) -> Result<(), WireError> {
    stream
        .set_write_timeout(Some(std::time::Duration::from_secs(5)))
        .map_err(|e| {
            tracing::warn!(error = ?e, "failed to set write timeout");
            WireError::Io(e)
        })?;

    let json = serde_json::to_string(event)?;
    writeln!(stream, "{}", json).map_err(|e| {
        tracing::warn!(error = ?e, "failed to write event");
        WireError::Io(e)
    })?;
    stream.flush().map_err(|e| {
        tracing::warn!(error = ?e, "failed to flush event");
        WireError::Io(e)
    })?;
    Ok(())
}

/// Control socket path for the current user.
///
/// `TIDEWM_SOCKET` overrides (for testing); otherwise the per-user runtime
/// directory is used.
pub fn socket_path() -> PathBuf {
    if let Ok(path) = std::env::var("TIDEWM_SOCKET") {
        return PathBuf::from(path);
    }
    let uid = rustix::process::getuid().as_raw();
    PathBuf::from(format!("/run/user/{}/tidewm.sock", uid))
}
