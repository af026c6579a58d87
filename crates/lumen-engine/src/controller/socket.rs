//! TCP connection to one controller host.
//!
//! A socket moves from unconnected to connected to dead and never back.
//! Recovery is the owner's job: discard the dead socket and build a new one.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use lumen_errors::TransportError;
use lumen_wire::{DEFAULT_CONTROLLER_PORT, TELEMETRY_RECORD_LEN, TelemetryRecord};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Minimum gap between connect attempts to one host.
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on a single connect attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on one batch write, across all partial writes.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Throughput is averaged over windows of this length.
pub const THROUGHPUT_WINDOW: Duration = Duration::from_secs(10);

const READ_CHUNK: usize = 1024;
const MAX_PENDING_TELEMETRY: usize = 16 * TELEMETRY_RECORD_LEN;

/// Result of [`ControllerSocket::ensure_connected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The socket has a live connection
    Connected,
    /// Too soon after the previous attempt; try again later
    Throttled,
}

/// First half of a connect, decided under the socket lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStep {
    /// The socket has a live connection
    Connected,
    /// Too soon after the previous attempt
    Throttled,
    /// Dial this address, then pass the result to
    /// [`ControllerSocket::finish_connect`]
    Dial(SocketAddr),
}

/// What one successful send produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SendReport {
    /// Bytes written
    pub bytes: usize,
    /// Newest telemetry record read back after the write
    pub telemetry: Option<TelemetryRecord>,
}

/// Split `host` into a name and port.
///
/// Accepts `name`, `name:port`, `[v6]`, `[v6]:port` and bare IPv6 literals;
/// the default port is 49152.
pub fn parse_host(host: &str) -> (String, u16) {
    let host = host.trim();
    if let Some(rest) = host.strip_prefix('[')
        && let Some((addr, tail)) = rest.split_once(']')
    {
        let port = tail
            .strip_prefix(':')
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_CONTROLLER_PORT);
        return (addr.to_string(), port);
    }
    match host.split_once(':') {
        Some((name, port)) if !port.contains(':') => match port.parse() {
            Ok(port) => (name.to_string(), port),
            Err(_) => (host.to_string(), DEFAULT_CONTROLLER_PORT),
        },
        _ => (host.to_string(), DEFAULT_CONTROLLER_PORT),
    }
}

/// Resolve a configured host string to its first address.
///
/// # Errors
///
/// Returns [`TransportError::Resolve`] when the lookup fails or yields
/// nothing.
pub fn resolve_host(host: &str) -> Result<SocketAddr, TransportError> {
    let (name, port) = parse_host(host);
    let resolve_error = |reason: String| TransportError::Resolve {
        host: host.to_string(),
        reason,
    };
    (name.as_str(), port)
        .to_socket_addrs()
        .map_err(|e| resolve_error(e.to_string()))?
        .next()
        .ok_or_else(|| resolve_error("no addresses".to_string()))
}

/// Open a TCP connection to `addr`, bounded by [`CONNECT_TIMEOUT`].
///
/// Blocks; never call it while holding a socket lock.
pub fn dial(addr: SocketAddr) -> std::io::Result<TcpStream> {
    TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
}

/// Connect a shared socket, dialing with its lock released.
///
/// # Errors
///
/// As [`ControllerSocket::ensure_connected`].
pub fn connect_shared(
    socket: &Mutex<ControllerSocket>,
    now: Instant,
) -> Result<ConnectOutcome, TransportError> {
    let step = socket.lock().begin_connect(now)?;
    match step {
        ConnectStep::Connected => Ok(ConnectOutcome::Connected),
        ConnectStep::Throttled => Ok(ConnectOutcome::Throttled),
        ConnectStep::Dial(addr) => {
            let result = dial(addr);
            socket.lock().finish_connect(addr, result, now)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Throughput {
    window_start: Instant,
    bytes: u64,
}

/// Connection state readable without the socket lock.
///
/// The socket lock is held for whole connects and writes; readiness checks
/// from the render thread go through this instead. Its own locks are only
/// held for a field copy.
#[derive(Debug)]
pub struct LinkState {
    connected: AtomicBool,
    last_attempt: Mutex<Option<Instant>>,
    throughput: Mutex<Throughput>,
}

impl LinkState {
    fn new(last_attempt: Option<Instant>, now: Instant) -> Self {
        Self {
            connected: AtomicBool::new(false),
            last_attempt: Mutex::new(last_attempt),
            throughput: Mutex::new(Throughput {
                window_start: now,
                bytes: 0,
            }),
        }
    }

    /// Whether the socket holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Time of the latest connect attempt.
    pub fn last_attempt(&self) -> Option<Instant> {
        *self.last_attempt.lock()
    }

    /// Average write rate over the current throughput window.
    pub fn bytes_per_second(&self, now: Instant) -> f64 {
        let window = *self.throughput.lock();
        let elapsed = now
            .saturating_duration_since(window.window_start)
            .max(Duration::from_secs(1));
        window.bytes as f64 / elapsed.as_secs_f64()
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    fn set_last_attempt(&self, now: Instant) {
        *self.last_attempt.lock() = Some(now);
    }

    fn reset_window(&self, now: Instant) {
        *self.throughput.lock() = Throughput {
            window_start: now,
            bytes: 0,
        };
    }

    fn record_bytes(&self, sent: usize, now: Instant) {
        let mut window = self.throughput.lock();
        if now.saturating_duration_since(window.window_start) >= THROUGHPUT_WINDOW {
            window.window_start = now;
            window.bytes = 0;
        }
        window.bytes = window
            .bytes
            .saturating_add(u64::try_from(sent).unwrap_or(u64::MAX));
    }
}

/// Connection to one controller host.
#[derive(Debug)]
pub struct ControllerSocket {
    host: String,
    addr: Option<SocketAddr>,
    stream: Option<TcpStream>,
    dead: bool,
    link: Arc<LinkState>,
    pending: Vec<u8>,
    telemetry: Option<TelemetryRecord>,
    last_telemetry_at: Option<Instant>,
}

impl ControllerSocket {
    /// Resolve `host` and build an unconnected socket.
    ///
    /// `last_attempt` carries the previous socket's connect time so the retry
    /// throttle spans replacements. A failed lookup leaves the socket dead.
    pub fn new(host: impl Into<String>, last_attempt: Option<Instant>) -> Self {
        let host = host.into();
        let now = Instant::now();
        let (addr, dead, last_attempt) = match resolve_host(&host) {
            Ok(addr) => (Some(addr), false, last_attempt),
            Err(e) => {
                warn!(host = %host, error = %e, "Controller host did not resolve");
                (None, true, Some(now))
            }
        };
        Self {
            host,
            addr,
            stream: None,
            dead,
            link: Arc::new(LinkState::new(last_attempt, now)),
            pending: Vec::new(),
            telemetry: None,
            last_telemetry_at: None,
        }
    }

    /// Configured host string.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Resolved address, if the lookup succeeded.
    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// Whether a live connection exists.
    pub fn is_connected(&self) -> bool {
        !self.dead && self.stream.is_some()
    }

    /// Whether the socket has failed for good.
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Time of the latest connect attempt.
    pub fn last_attempt(&self) -> Option<Instant> {
        self.link.last_attempt()
    }

    /// Lock-free view of this socket's connection state.
    pub fn link(&self) -> Arc<LinkState> {
        Arc::clone(&self.link)
    }

    /// Last telemetry record received.
    pub fn telemetry(&self) -> Option<&TelemetryRecord> {
        self.telemetry.as_ref()
    }

    /// When the last telemetry record arrived.
    pub fn last_telemetry_at(&self) -> Option<Instant> {
        self.last_telemetry_at
    }

    /// Firmware version from the last telemetry record.
    pub fn firmware_version(&self) -> Option<String> {
        self.telemetry.as_ref().map(TelemetryRecord::firmware_version)
    }

    /// Average write rate over the current throughput window.
    pub fn bytes_per_second(&self, now: Instant) -> f64 {
        self.link.bytes_per_second(now)
    }

    /// Connect unless already connected or throttled, dialing in place.
    ///
    /// Shared sockets go through [`connect_shared`] instead so the dial
    /// does not hold the lock.
    ///
    /// # Errors
    ///
    /// [`TransportError::Dead`] once the socket has failed, and
    /// [`TransportError::Connect`] when this attempt fails (the socket is
    /// dead afterwards).
    pub fn ensure_connected(&mut self, now: Instant) -> Result<ConnectOutcome, TransportError> {
        match self.begin_connect(now)? {
            ConnectStep::Connected => Ok(ConnectOutcome::Connected),
            ConnectStep::Throttled => Ok(ConnectOutcome::Throttled),
            ConnectStep::Dial(addr) => self.finish_connect(addr, dial(addr), now),
        }
    }

    /// Decide whether to dial, recording the attempt time when it does.
    ///
    /// # Errors
    ///
    /// [`TransportError::Dead`] once the socket has failed.
    pub fn begin_connect(&mut self, now: Instant) -> Result<ConnectStep, TransportError> {
        if self.dead {
            return Err(TransportError::dead(&self.host));
        }
        if self.stream.is_some() {
            return Ok(ConnectStep::Connected);
        }
        if self
            .last_attempt()
            .is_some_and(|last| now.saturating_duration_since(last) < CONNECT_RETRY_INTERVAL)
        {
            debug!(host = %self.host, "Connect throttled");
            return Ok(ConnectStep::Throttled);
        }

        self.link.set_last_attempt(now);
        let Some(addr) = self.addr else {
            self.dead = true;
            return Err(TransportError::dead(&self.host));
        };
        Ok(ConnectStep::Dial(addr))
    }

    /// Install the result of a dial started by [`Self::begin_connect`].
    ///
    /// # Errors
    ///
    /// [`TransportError::Connect`] when the dial failed, which kills the
    /// socket, and [`TransportError::Dead`] if the socket died meanwhile.
    pub fn finish_connect(
        &mut self,
        addr: SocketAddr,
        result: std::io::Result<TcpStream>,
        now: Instant,
    ) -> Result<ConnectOutcome, TransportError> {
        if self.dead {
            return Err(TransportError::dead(&self.host));
        }
        if self.stream.is_some() {
            return Ok(ConnectOutcome::Connected);
        }
        match result {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(host = %self.host, error = %e, "Could not disable Nagle");
                }
                if let Err(e) = stream.set_write_timeout(Some(WRITE_TIMEOUT)) {
                    debug!(host = %self.host, error = %e, "Could not set write timeout");
                }
                info!(host = %self.host, %addr, "Connected to controller");
                self.stream = Some(stream);
                self.link.reset_window(now);
                self.link.set_connected(true);
                Ok(ConnectOutcome::Connected)
            }
            Err(source) => {
                warn!(host = %self.host, %addr, error = %source, "Controller connect failed");
                self.dead = true;
                Err(TransportError::Connect {
                    host: self.host.clone(),
                    source,
                })
            }
        }
    }

    /// Write all of `data`, then collect any telemetry the controller sent.
    ///
    /// # Errors
    ///
    /// [`TransportError::NotConnected`] before a connect,
    /// [`TransportError::ShortWrite`] or [`TransportError::Io`] when the
    /// write fails or outlasts [`WRITE_TIMEOUT`]. Write failures leave the
    /// socket dead.
    pub fn send(&mut self, data: &[u8], now: Instant) -> Result<SendReport, TransportError> {
        if self.dead {
            return Err(TransportError::dead(&self.host));
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::NotConnected(self.host.clone()));
        };

        let started = Instant::now();
        let mut sent = 0usize;
        let mut failure = None;
        while let Some(rest) = data.get(sent..).filter(|rest| !rest.is_empty()) {
            if sent > 0 && started.elapsed() > WRITE_TIMEOUT {
                break;
            }
            match stream.write(rest) {
                Ok(0) => break,
                Ok(n) => sent = sent.saturating_add(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if sent < data.len() {
            self.mark_dead();
            return Err(match failure {
                Some(source) if sent == 0 => TransportError::io(&self.host, source),
                _ => TransportError::ShortWrite {
                    host: self.host.clone(),
                    sent,
                    expected: data.len(),
                },
            });
        }

        self.link.record_bytes(sent, now);

        let telemetry = self.read_telemetry(now);
        Ok(SendReport {
            bytes: sent,
            telemetry,
        })
    }

    /// Drop the connection and mark the socket dead.
    pub fn mark_dead(&mut self) {
        self.dead = true;
        self.link.set_connected(false);
        if let Some(stream) = self.stream.take()
            && let Err(e) = stream.shutdown(std::net::Shutdown::Both)
        {
            debug!(host = %self.host, error = %e, "Shutdown after failure");
        }
    }

    fn read_telemetry(&mut self, now: Instant) -> Option<TelemetryRecord> {
        let stream = self.stream.as_mut()?;
        if stream.set_nonblocking(true).is_err() {
            return None;
        }

        let mut closed = false;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(n) => self.pending.extend_from_slice(chunk.get(..n).unwrap_or_default()),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!(host = %self.host, error = %e, "Telemetry read failed");
                    closed = true;
                    break;
                }
            }
            if self.pending.len() > MAX_PENDING_TELEMETRY {
                break;
            }
        }
        if let Err(e) = stream.set_nonblocking(false) {
            debug!(host = %self.host, error = %e, "Could not restore blocking mode");
        }

        let newest = self.drain_records(now);
        if closed {
            info!(host = %self.host, "Controller closed the connection");
            self.mark_dead();
        }
        newest
    }

    fn drain_records(&mut self, now: Instant) -> Option<TelemetryRecord> {
        let mut newest = None;
        while self.pending.len() >= TELEMETRY_RECORD_LEN {
            let Some(record) = TelemetryRecord::parse(&self.pending) else {
                debug!(host = %self.host, bytes = self.pending.len(), "Discarding unparseable telemetry");
                self.pending.clear();
                break;
            };
            let stride = usize::try_from(record.size).unwrap_or(usize::MAX);
            if stride > self.pending.len() {
                break;
            }
            self.pending.drain(..stride);
            newest = Some(record);
        }
        if self.pending.len() > MAX_PENDING_TELEMETRY {
            self.pending.clear();
        }
        if let Some(record) = newest {
            self.telemetry = Some(record);
            self.last_telemetry_at = Some(now);
        }
        newest
    }
}

impl Drop for ControllerSocket {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            // Peer may already be gone.
            if stream.shutdown(std::net::Shutdown::Both).is_err() {
                debug!(host = %self.host, "Socket already closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_parse_host_forms() {
        assert_eq!(parse_host("10.0.0.5"), ("10.0.0.5".into(), 49152));
        assert_eq!(parse_host("rail.local:1234"), ("rail.local".into(), 1234));
        assert_eq!(parse_host("[::1]:99"), ("::1".into(), 99));
        assert_eq!(parse_host("[::1]"), ("::1".into(), 49152));
        assert_eq!(parse_host("fe80::1"), ("fe80::1".into(), 49152));
        assert_eq!(parse_host("host:notaport"), ("host:notaport".into(), 49152));
    }

    #[test]
    fn test_unresolvable_host_is_dead() {
        let mut socket = ControllerSocket::new("no-such-host.invalid", None);
        assert!(socket.is_dead());
        assert!(matches!(
            socket.ensure_connected(Instant::now()),
            Err(TransportError::Dead(_))
        ));
    }

    #[test]
    fn test_send_before_connect_is_not_connected() -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let mut socket = ControllerSocket::new(listener.local_addr()?.to_string(), None);
        let result = socket.send(&[1, 2, 3], Instant::now());
        assert!(matches!(result, Err(TransportError::NotConnected(_))));
        assert!(!socket.is_dead());
        Ok(())
    }

    #[test]
    fn test_retry_within_interval_is_throttled() -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let now = Instant::now();
        let mut socket = ControllerSocket::new(listener.local_addr()?.to_string(), Some(now));
        let outcome = socket.ensure_connected(now + Duration::from_millis(500))?;
        assert_eq!(outcome, ConnectOutcome::Throttled);
        let outcome = socket.ensure_connected(now + Duration::from_millis(1_000))?;
        assert_eq!(outcome, ConnectOutcome::Connected);
        assert!(socket.is_connected());
        Ok(())
    }

    #[test]
    fn test_link_follows_connection() -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let socket = Mutex::new(ControllerSocket::new(listener.local_addr()?.to_string(), None));
        let link = socket.lock().link();
        assert!(!link.is_connected());

        let now = Instant::now();
        assert_eq!(connect_shared(&socket, now)?, ConnectOutcome::Connected);
        assert!(link.is_connected());
        assert_eq!(link.last_attempt(), Some(now));

        socket.lock().mark_dead();
        assert!(!link.is_connected());
        Ok(())
    }

    #[test]
    fn test_dial_discarded_when_socket_died_meanwhile() -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let mut socket = ControllerSocket::new(listener.local_addr()?.to_string(), None);
        let now = Instant::now();
        let ConnectStep::Dial(addr) = socket.begin_connect(now)? else {
            return Err("expected a dial".into());
        };
        assert_eq!(socket.begin_connect(now)?, ConnectStep::Throttled);

        socket.mark_dead();
        let result = socket.finish_connect(addr, dial(addr), now);
        assert!(matches!(result, Err(TransportError::Dead(_))));
        assert!(!socket.link().is_connected());
        Ok(())
    }

    #[test]
    fn test_refused_connect_kills_socket() -> Result<(), Box<dyn std::error::Error>> {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0")?;
            listener.local_addr()?
        };
        let mut socket = ControllerSocket::new(addr.to_string(), None);
        assert!(matches!(
            socket.ensure_connected(Instant::now()),
            Err(TransportError::Connect { .. })
        ));
        assert!(socket.is_dead());
        Ok(())
    }

    #[test]
    fn test_telemetry_records_drained_in_order() {
        let mut socket = ControllerSocket::new("127.0.0.1", None);
        let first = TelemetryRecord {
            size: 64,
            flash_version: 3,
            ..TelemetryRecord::default()
        };
        let second = TelemetryRecord {
            size: 64,
            flash_version: 4,
            ..TelemetryRecord::default()
        };
        socket.pending.extend_from_slice(&first.to_bytes());
        socket.pending.extend_from_slice(&second.to_bytes());
        socket.pending.extend_from_slice(&[0u8; 10]);

        let newest = socket.drain_records(Instant::now());
        assert_eq!(newest.map(|r| r.flash_version), Some(4));
        assert_eq!(socket.firmware_version().as_deref(), Some("v4"));
        assert_eq!(socket.pending.len(), 10);
    }
}
