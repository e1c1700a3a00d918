//! tidewm - window-manager engine server
//!
//! Hosts the transaction engine behind a Unix control socket. Connections
//! send one JSON-line request each; the connection that binds as the window
//! manager stays open and becomes the event stream, over which updates, seat
//! notifications, and (when running headless) configure events are
//! delivered. Further requests from the bound client arrive on that same
//! stream.

use std::io::{ErrorKind, Read};
use std::os::unix::net::{UnixListener, UnixStream};
use std::time::Duration;

use anyhow::Context;
use calloop::generic::Generic;
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, Interest, LoopHandle, Mode, PostAction, RegistrationToken};

use wm::config::Config;
use wm::protocol::{Event, ProtocolError, Request};
use wm::wire;
use wm::wm::{TimerRequest, WindowManager};

/// How often the main loop wakes up to flush pending updates even without
/// socket activity
const IDLE_TICK: Duration = Duration::from_millis(16);

struct Server {
    wm: WindowManager,

    /// Write half of the bound window-manager connection
    client_stream: Option<UnixStream>,

    /// Registration of the bound connection's read source
    client_token: Option<RegistrationToken>,

    /// Partial line buffered from the bound connection
    client_buf: Vec<u8>,

    /// Active configure-timeout timer
    timer_token: Option<RegistrationToken>,
}

fn main() -> anyhow::Result<()> {
    setup_logging();

    tracing::info!("starting tidewm");

    let config = Config::load();

    let mut event_loop: EventLoop<Server> =
        EventLoop::try_new().context("failed to create event loop")?;
    let handle = event_loop.handle();

    let socket_path = config.socket.clone().unwrap_or_else(wire::socket_path);
    let _ = std::fs::remove_file(&socket_path); // Clean up a stale socket
    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("failed to bind control socket {}", socket_path.display()))?;
    listener
        .set_nonblocking(true)
        .context("failed to set control socket nonblocking")?;
    tracing::info!(path = %socket_path.display(), "control socket ready");

    let accept_handle = handle.clone();
    handle
        .insert_source(
            Generic::new(listener, Interest::READ, Mode::Level),
            move |_, listener, server: &mut Server| {
                loop {
                    match listener.accept() {
                        Ok((stream, _)) => handle_connection(server, &accept_handle, stream),
                        Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                        Err(e) => {
                            tracing::warn!(error = %e, "control socket accept failed");
                            break;
                        }
                    }
                }
                Ok(PostAction::Continue)
            },
        )
        .map_err(|e| anyhow::anyhow!("failed to register control socket: {e}"))?;

    let mut server = Server {
        wm: WindowManager::new(config.transaction_timeout()),
        client_stream: None,
        client_token: None,
        client_buf: Vec::new(),
        timer_token: None,
    };

    let tick_handle = handle.clone();
    event_loop
        .run(IDLE_TICK, &mut server, move |server| {
            server.after_dispatch(&tick_handle);
        })
        .context("event loop failed")?;

    Ok(())
}

/// Read the single request off a fresh connection and dispatch it
fn handle_connection(
    server: &mut Server,
    handle: &LoopHandle<'static, Server>,
    stream: UnixStream,
) {
    match wire::read_request(stream) {
        Ok((request, stream)) => dispatch(server, handle, request, Some(stream)),
        Err(e) => tracing::warn!(error = %e, "failed to read control request"),
    }
    server.after_dispatch(handle);
}

/// Dispatch one request. `stream` is the originating connection for fresh
/// connections, `None` for requests arriving on the already-bound stream.
fn dispatch(
    server: &mut Server,
    handle: &LoopHandle<'static, Server>,
    request: Request,
    stream: Option<UnixStream>,
) {
    let is_bind = request == Request::Bind;
    match server.wm.request(request) {
        Ok(()) => {
            if is_bind {
                if let Some(stream) = stream {
                    server.adopt_client(handle, stream);
                }
            }
        }
        Err(ProtocolError::AlreadyBound) if is_bind => match stream {
            Some(mut stream) => {
                let _ = wire::send_event(&mut stream, &Event::Unavailable);
            }
            None => {
                // Duplicate bind on the bound stream: refuse it there, the
                // session itself is untouched
                if let Some(stream) = server.client_stream.as_mut() {
                    let _ = wire::send_event(stream, &Event::Unavailable);
                }
            }
        },
        Err(e) => {
            // Protocol violations are fatal to the offending connection
            // only; the error is reported on it before it closes
            tracing::warn!(error = %e, "client protocol error");
            let error = Event::Error { message: e.to_string() };
            match stream {
                Some(mut stream) => {
                    let _ = wire::send_event(&mut stream, &error);
                }
                None => {
                    if let Some(stream) = server.client_stream.as_mut() {
                        let _ = wire::send_event(stream, &error);
                    }
                    server.drop_client(handle, "protocol error");
                }
            }
        }
    }
}

impl Server {
    /// The bind succeeded: this connection becomes the event stream and a
    /// request source.
    fn adopt_client(&mut self, handle: &LoopHandle<'static, Server>, stream: UnixStream) {
        if let Err(e) = stream.set_nonblocking(true) {
            tracing::warn!(error = %e, "failed to set client stream nonblocking");
            self.wm.client_disconnected();
            return;
        }
        let read_half = match stream.try_clone() {
            Ok(clone) => clone,
            Err(e) => {
                tracing::warn!(error = %e, "failed to clone client stream");
                self.wm.client_disconnected();
                return;
            }
        };

        let read_handle = handle.clone();
        let token = handle.insert_source(
            Generic::new(read_half, Interest::READ, Mode::Level),
            move |_, _, server: &mut Server| {
                server.read_client(&read_handle);
                Ok(PostAction::Continue)
            },
        );
        match token {
            Ok(token) => {
                self.client_stream = Some(stream);
                self.client_token = Some(token);
                self.client_buf.clear();
                tracing::info!("window manager connection adopted");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to register client stream");
                self.wm.client_disconnected();
            }
        }
    }

    /// Drain requests from the bound connection
    fn read_client(&mut self, handle: &LoopHandle<'static, Server>) {
        let mut disconnect: Option<&'static str> = None;
        {
            let Some(stream) = self.client_stream.as_mut() else {
                return;
            };
            let mut buf = [0u8; 4096];
            loop {
                match stream.read(&mut buf) {
                    Ok(0) => {
                        disconnect = Some("connection closed");
                        break;
                    }
                    Ok(n) => self.client_buf.extend_from_slice(&buf[..n]),
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "client read failed");
                        disconnect = Some("read error");
                        break;
                    }
                }
            }
        }
        if let Some(reason) = disconnect {
            self.drop_client(handle, reason);
            return;
        }

        while let Some(pos) = self.client_buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.client_buf.drain(..=pos).collect();
            match serde_json::from_slice::<Request>(&line) {
                Ok(request) => dispatch(self, handle, request, None),
                Err(e) => {
                    tracing::warn!(error = %e, "malformed request on client stream");
                    self.drop_client(handle, "malformed request");
                    return;
                }
            }
        }
        self.after_dispatch(handle);
    }

    /// Tear down the bound connection; the engine decides how the current
    /// cycle continues.
    fn drop_client(&mut self, handle: &LoopHandle<'static, Server>, reason: &str) {
        tracing::info!(reason, "dropping window manager connection");
        if let Some(token) = self.client_token.take() {
            handle.remove(token);
        }
        self.client_stream = None;
        self.client_buf.clear();
        self.wm.client_disconnected();
    }

    /// Per-iteration bookkeeping: flush updates, deliver events, apply
    /// timer requests.
    fn after_dispatch(&mut self, handle: &LoopHandle<'static, Server>) {
        self.wm.flush_updates();
        self.flush_events(handle);
        self.apply_timer_request(handle);
    }

    fn flush_events(&mut self, handle: &LoopHandle<'static, Server>) {
        // Headless operation: forward configures on the event stream
        let configures: Vec<_> = self.wm.pending_configures.drain(..).collect();
        let mut events = self.wm.take_events();
        events.extend(configures.into_iter().map(Event::Configure));
        if events.is_empty() {
            return;
        }

        let mut write_failed = false;
        {
            let Some(stream) = self.client_stream.as_mut() else {
                tracing::trace!(count = events.len(), "events dropped, no client connection");
                return;
            };
            for event in &events {
                if let Err(e) = wire::send_event(stream, event) {
                    tracing::warn!(error = %e, "event delivery failed");
                    write_failed = true;
                    break;
                }
            }
        }
        if write_failed {
            self.drop_client(handle, "write error");
            return;
        }

        // A finished stop leaves the engine unbound: close the stream
        if !self.wm.is_bound() {
            if let Some(token) = self.client_token.take() {
                handle.remove(token);
            }
            self.client_stream = None;
            self.client_buf.clear();
        }
    }

    fn apply_timer_request(&mut self, handle: &LoopHandle<'static, Server>) {
        match self.wm.timer_request.take() {
            Some(TimerRequest::Arm(duration)) => {
                if let Some(token) = self.timer_token.take() {
                    handle.remove(token);
                }
                let timer_handle = handle.clone();
                match handle.insert_source(
                    Timer::from_duration(duration),
                    move |_, _, server: &mut Server| {
                        server.timer_token = None;
                        server.wm.handle_configure_timeout();
                        server.after_dispatch(&timer_handle);
                        TimeoutAction::Drop
                    },
                ) {
                    Ok(token) => self.timer_token = Some(token),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to arm configure timer");
                        // Bounded-wait guarantee is lost; commit immediately
                        self.wm.handle_configure_timeout();
                    }
                }
            }
            Some(TimerRequest::Disarm) => {
                if let Some(token) = self.timer_token.take() {
                    handle.remove(token);
                }
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};

    fn test_server() -> (EventLoop<'static, Server>, Server) {
        let event_loop = EventLoop::try_new().expect("event loop");
        let server = Server {
            wm: WindowManager::new(Duration::from_millis(100)),
            client_stream: None,
            client_token: None,
            client_buf: Vec::new(),
            timer_token: None,
        };
        (event_loop, server)
    }

    fn read_event(stream: UnixStream) -> Event {
        let mut line = String::new();
        BufReader::new(stream)
            .read_line(&mut line)
            .expect("event line");
        serde_json::from_str(line.trim()).expect("event json")
    }

    #[test]
    fn protocol_error_reported_before_closing() {
        let (event_loop, mut server) = test_server();
        let handle = event_loop.handle();
        let (ours, theirs) = UnixStream::pair().unwrap();

        // Commit with no acked update is a protocol violation
        dispatch(&mut server, &handle, Request::Commit, Some(ours));

        match read_event(theirs) {
            Event::Error { message } => assert!(message.contains("commit")),
            other => panic!("expected an error event, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_bind_on_bound_stream_keeps_session() {
        let (event_loop, mut server) = test_server();
        let handle = event_loop.handle();
        let (ours, theirs) = UnixStream::pair().unwrap();

        dispatch(&mut server, &handle, Request::Bind, Some(ours));
        assert!(server.client_stream.is_some());

        // A second bind on the already-bound stream is refused in place
        dispatch(&mut server, &handle, Request::Bind, None);
        assert!(server.wm.is_bound());
        assert!(server.client_stream.is_some());
        assert_eq!(read_event(theirs), Event::Unavailable);
    }

    #[test]
    fn violation_on_bound_stream_reports_then_drops() {
        let (event_loop, mut server) = test_server();
        let handle = event_loop.handle();
        let (ours, theirs) = UnixStream::pair().unwrap();

        dispatch(&mut server, &handle, Request::Bind, Some(ours));
        dispatch(&mut server, &handle, Request::Commit, None);

        assert!(server.client_stream.is_none());
        assert!(!server.wm.is_bound());
        assert!(matches!(read_event(theirs), Event::Error { .. }));
    }
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Respect NO_COLOR environment variable for testing
    let use_ansi = std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_ansi(use_ansi),
        )
        .with(filter)
        .init();
}
