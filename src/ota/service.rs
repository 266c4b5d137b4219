//! OTA listener: implements [`OtaPort`] over TCP.
//!
//! One update session per connection, newline-terminated commands:
//!
//! ```text
//! device → AUTH <nonce-hex>         (or "OK" when no password is set)
//! client → <hmac-hex>
//! device → OK | ERR auth
//! client → BEGIN <size> <sha256-hex>
//! device → OK
//! client → <size raw bytes>
//! device → DONE | ERR <reason>
//! ```
//!
//! The listener is non-blocking: [`OtaPort::handle`] returns immediately
//! when nobody is connecting. Once a client is accepted the session runs to
//! completion against wall-clock deadlines: the whole handshake up to
//! `BEGIN` must finish within the handshake budget, and the image must
//! arrive within a budget scaled by its declared size. A client trickling
//! bytes cannot stretch either.
//!
//! The `ota-upload` host tool speaks the client side through
//! [`client::upload`](super::client::upload).

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use log::{info, warn};

use super::auth::{self, OtaCredentials};
use super::manager::{OtaError, OtaManager};
use super::OtaPoll;
use crate::app::ports::OtaPort;

/// Longest command line accepted.
pub const MAX_LINE_LEN: usize = 160;

const CHUNK_LEN: usize = 4096;
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed from accept until the `BEGIN` line is parsed.
pub const HANDSHAKE_BUDGET: Duration = Duration::from_secs(10);
/// Fixed part of the image transfer budget.
pub const TRANSFER_GRACE: Duration = Duration::from_secs(30);
/// Slowest accepted image transfer rate, bytes per second.
pub const MIN_TRANSFER_RATE: u32 = 8 * 1024;

/// Deadline for receiving an image of `size` bytes.
pub fn transfer_budget(size: u32) -> Duration {
    TRANSFER_GRACE + Duration::from_secs(u64::from(size / MIN_TRANSFER_RATE))
}

/// Session input with a movable wall-clock deadline.
pub trait SessionInput: BufRead {
    fn extend_deadline(&mut self, deadline: Instant);
}

/// In-memory sessions have no clock.
impl<T: AsRef<[u8]>> SessionInput for io::Cursor<T> {
    fn extend_deadline(&mut self, _deadline: Instant) {}
}

/// `TcpStream` reader bounded by a deadline rather than a per-read timeout.
struct DeadlineStream {
    stream: TcpStream,
    deadline: Instant,
}

impl Read for DeadlineStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::ErrorKind::TimedOut.into());
        }
        self.stream.set_read_timeout(Some(remaining))?;
        self.stream.read(buf)
    }
}

impl SessionInput for BufReader<DeadlineStream> {
    fn extend_deadline(&mut self, deadline: Instant) {
        self.get_mut().deadline = deadline;
    }
}

fn read_error(e: &io::Error) -> OtaError {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => OtaError::Timeout,
        _ => OtaError::Io,
    }
}

/// A parsed client command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaCommand {
    Begin { size: u32, sha256: [u8; 32] },
}

/// Parse one command line (without the trailing newline).
pub fn parse_command(line: &str) -> Result<OtaCommand, OtaError> {
    let mut parts = line.split_ascii_whitespace();
    match parts.next() {
        Some("BEGIN") => {
            let size = parts
                .next()
                .and_then(|s| s.parse::<u32>().ok())
                .ok_or(OtaError::Protocol)?;
            let sha256 = parts
                .next()
                .and_then(auth::parse_hex32)
                .ok_or(OtaError::InvalidSha)?;
            if parts.next().is_some() {
                return Err(OtaError::Protocol);
            }
            Ok(OtaCommand::Begin { size, sha256 })
        }
        _ => Err(OtaError::Protocol),
    }
}

fn read_line<R: BufRead>(reader: &mut R) -> Result<String, OtaError> {
    let mut line = String::new();
    reader
        .by_ref()
        .take(MAX_LINE_LEN as u64)
        .read_line(&mut line)
        .map_err(|e| read_error(&e))?;
    if !line.ends_with('\n') {
        return Err(OtaError::Protocol);
    }
    Ok(line.trim_end().to_owned())
}

fn send<W: Write>(writer: &mut W, line: &str) -> Result<(), OtaError> {
    writer
        .write_all(line.as_bytes())
        .and_then(|()| writer.write_all(b"\n"))
        .and_then(|()| writer.flush())
        .map_err(|_| OtaError::Io)
}

/// Run one update session over an established connection.
///
/// Returns `Rejected` on a bad authorisation tag and `Applied` once the
/// image is verified and marked bootable.
pub fn serve_session<R: SessionInput, W: Write>(
    manager: &mut OtaManager,
    credentials: &OtaCredentials,
    reader: &mut R,
    writer: &mut W,
) -> Result<OtaPoll, OtaError> {
    if credentials.requires_auth() {
        let nonce = auth::new_nonce();
        send(writer, &format!("AUTH {}", auth::to_hex(&nonce)))?;
        let reply = read_line(reader)?;
        let tag = auth::parse_hex32(&reply).unwrap_or_default();
        if !credentials.verify(&nonce, &tag) {
            warn!("OTA: authorisation failed");
            send(writer, "ERR auth")?;
            return Ok(OtaPoll::Rejected);
        }
    }
    send(writer, "OK")?;

    let OtaCommand::Begin { size, sha256 } = parse_command(&read_line(reader)?)?;
    manager.begin(size, &sha256)?;
    reader.extend_deadline(Instant::now() + transfer_budget(size));
    send(writer, "OK")?;

    let result = receive_image(manager, size, reader).and_then(|()| manager.finalize());
    if let Err(e) = result {
        manager.abort();
        return Err(e);
    }
    send(writer, "DONE")?;
    info!("OTA: update applied");
    Ok(OtaPoll::Applied)
}

fn receive_image<R: Read>(manager: &mut OtaManager, size: u32, reader: &mut R) -> Result<(), OtaError> {
    let mut buf = vec![0u8; CHUNK_LEN];
    let mut offset = 0u32;
    while offset < size {
        let want = ((size - offset) as usize).min(CHUNK_LEN);
        let n = reader.read(&mut buf[..want]).map_err(|e| read_error(&e))?;
        if n == 0 {
            return Err(OtaError::IncompleteTransfer);
        }
        offset = manager.write_chunk(offset, &buf[..n])?;
    }
    Ok(())
}

/// TCP front end for [`OtaManager`].
pub struct OtaService {
    listener: Option<TcpListener>,
    credentials: OtaCredentials,
    hostname: String,
    manager: OtaManager,
    handshake_budget: Duration,
}

impl OtaService {
    pub fn new() -> Self {
        Self {
            listener: None,
            credentials: OtaCredentials::new(""),
            hostname: String::new(),
            manager: OtaManager::new(),
            handshake_budget: HANDSHAKE_BUDGET,
        }
    }

    #[must_use]
    pub fn with_handshake_budget(mut self, budget: Duration) -> Self {
        self.handshake_budget = budget;
        self
    }

    /// Bound address, once armed.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn manager(&self) -> &OtaManager {
        &self.manager
    }

    fn serve(&mut self, stream: TcpStream, peer: SocketAddr) -> Result<OtaPoll, OtaError> {
        info!("OTA: session from {} for {}", peer, self.hostname);
        stream.set_nonblocking(false).map_err(|_| OtaError::Io)?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT)).map_err(|_| OtaError::Io)?;

        let mut writer = stream.try_clone().map_err(|_| OtaError::Io)?;
        let mut reader = BufReader::new(DeadlineStream {
            stream,
            deadline: Instant::now() + self.handshake_budget,
        });
        let result = serve_session(&mut self.manager, &self.credentials, &mut reader, &mut writer);
        if let Err(e) = result {
            let _ = send(&mut writer, &format!("ERR {e}"));
        }
        result
    }
}

impl Default for OtaService {
    fn default() -> Self {
        Self::new()
    }
}

impl OtaPort for OtaService {
    fn arm(&mut self, hostname: &str, port: u16, password: &str) -> Result<(), OtaError> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).map_err(|e| {
            warn!("OTA: bind to port {} failed: {}", port, e);
            OtaError::Bind
        })?;
        listener.set_nonblocking(true).map_err(|_| OtaError::Bind)?;

        self.hostname = hostname.to_owned();
        self.credentials = OtaCredentials::new(password);
        self.listener = Some(listener);
        if !self.credentials.requires_auth() {
            warn!("OTA: no password set, updates are unauthenticated");
        }
        info!("OTA: listening on port {}", port);
        Ok(())
    }

    fn handle(&mut self) -> Result<OtaPoll, OtaError> {
        let Some(listener) = self.listener.as_ref() else {
            return Ok(OtaPoll::Idle);
        };
        match listener.accept() {
            Ok((stream, peer)) => self.serve(stream, peer),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(OtaPoll::Idle),
            Err(e) => {
                warn!("OTA: accept failed: {}", e);
                Err(OtaError::Io)
            }
        }
    }
}
