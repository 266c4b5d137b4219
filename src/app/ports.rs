//! Port traits: the hexagonal boundary between the bootstrap core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ bootstrap / Device (core)
//! ```
//!
//! Driven adapters (flash filesystem, WiFi portal, mDNS responder, OTA
//! listener, HTTP listener) implement these traits. The core consumes them
//! through a single [`Platform`] bundle, so it never touches hardware
//! directly and every stage can be exercised with mock adapters.
//!
//! ## Security notes
//!
//! - **ProvisioningPort** implementations store WiFi credentials in their
//!   own NVS namespace; the core never sees them.
//! - **OtaPort** implementations MUST reject updates whose authorisation
//!   does not match the password captured at [`OtaPort::arm`] time.

use core::fmt;

use super::events::ProvisioningSender;
use crate::ota::{OtaError, OtaPoll};

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: core ↔ flash filesystem)
// ───────────────────────────────────────────────────────────────

/// Persistent file storage for the configuration record.
///
/// Paths are relative to the adapter's mount point.
pub trait StoragePort {
    /// Mount the filesystem. Called once during bootstrap.
    fn mount(&mut self) -> Result<(), StorageError>;

    /// Read a whole file into `buf`. Returns the number of bytes copied;
    /// a file longer than `buf` is truncated to `buf.len()`.
    fn read(&self, path: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Create (or truncate) `path`, write `data` and close it.
    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Remove `path`. Returns `Ok(())` even if the file didn't exist.
    fn delete(&mut self, path: &str) -> Result<(), StorageError>;

    /// Check whether a file exists without reading it.
    fn exists(&self, path: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Provisioning port (driven adapter: core ↔ WiFi credential portal)
// ───────────────────────────────────────────────────────────────

/// Extra field shown on the provisioning portal next to SSID/password.
///
/// The value is bounded to `max_len` characters on every assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomParameter {
    id: &'static str,
    label: &'static str,
    value: String,
    max_len: usize,
}

impl CustomParameter {
    pub fn new(id: &'static str, label: &'static str, value: &str, max_len: usize) -> Self {
        let mut param = Self {
            id,
            label,
            value: String::new(),
            max_len,
        };
        param.set_value(value);
        param
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Replace the value, keeping at most `max_len` characters.
    pub fn set_value(&mut self, value: &str) {
        self.value.clear();
        self.value.extend(value.chars().take(self.max_len));
    }
}

/// WiFi credential capture: stored credentials first, captive portal second.
pub trait ProvisioningPort {
    /// Hostname announced by the station interface (DHCP option 12).
    fn set_hostname(&mut self, hostname: &str);

    /// Force station-only mode (ESP defaults to STA+AP).
    fn set_station_mode(&mut self) -> Result<(), ProvisioningError>;

    /// Connect with stored credentials; on failure open an access point named
    /// `ap_name` and block until the user submits credentials or the portal
    /// gives up.
    ///
    /// The portal pre-fills every entry of `params` and writes back the
    /// submitted values. When the user saves, the adapter posts
    /// [`ProvisioningEvent::SaveRequested`](super::events::ProvisioningEvent)
    /// through `events`.
    fn auto_connect(
        &mut self,
        ap_name: &str,
        params: &mut [CustomParameter],
        events: ProvisioningSender<'_>,
    ) -> Result<(), ProvisioningError>;

    /// Forget stored WiFi credentials (factory reset).
    fn reset_settings(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Connectivity port
// ───────────────────────────────────────────────────────────────

pub trait ConnectivityPort {
    /// Re-drive the station after a dropped link. Called once per loop
    /// iteration; implementations pace their own reconnect attempts.
    fn poll(&mut self);

    /// Whether the station is associated and has an IP.
    fn is_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Name-service port (driven adapter: core → mDNS responder)
// ───────────────────────────────────────────────────────────────

pub trait NameServicePort {
    /// Record the name to announce as `<hostname>.local`.
    fn set_hostname(&mut self, hostname: &str);

    /// Start the responder with the recorded hostname.
    fn begin(&mut self) -> Result<(), NameServiceError>;
}

// ───────────────────────────────────────────────────────────────
// OTA port (driven adapter: network → flash partition)
// ───────────────────────────────────────────────────────────────

pub trait OtaPort {
    /// Start accepting password-gated updates on `port`. The password is
    /// captured here and not re-read afterwards.
    fn arm(&mut self, hostname: &str, port: u16, password: &str) -> Result<(), OtaError>;

    /// Service at most one pending update session.
    fn handle(&mut self) -> Result<OtaPoll, OtaError>;
}

// ───────────────────────────────────────────────────────────────
// HTTP port (driven adapter: network ↔ diagnostic pages)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Other,
}

/// A parsed request line. Headers and bodies are not needed by any route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            content_type: "text/plain",
            body: b"Not found".to_vec(),
        }
    }
}

/// Polling HTTP transport. No background work happens between polls.
pub trait HttpPort {
    /// Bind the listening socket.
    fn begin(&mut self, port: u16) -> Result<(), HttpError>;

    /// Take the next pending request, if any, without blocking on the
    /// listener.
    fn poll_request(&mut self) -> Option<HttpRequest>;

    /// Answer the request last returned by [`poll_request`](Self::poll_request).
    fn respond(&mut self, response: &HttpResponse) -> Result<(), HttpError>;
}

// ───────────────────────────────────────────────────────────────
// Platform bundle
// ───────────────────────────────────────────────────────────────

/// Binds one concrete adapter to every port so the core takes a single
/// type parameter.
pub trait Platform {
    type Storage: StoragePort;
    type Wifi: ProvisioningPort + ConnectivityPort;
    type NameService: NameServicePort;
    type Ota: OtaPort;
    type Http: HttpPort;
}

/// The adapters handed to [`bootstrap`](super::bootstrap::bootstrap).
pub struct Adapters<P: Platform> {
    pub storage: P::Storage,
    pub wifi: P::Wifi,
    pub name_service: P::NameService,
    pub ota: P::Ota,
    pub http: P::Http,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested file does not exist.
    NotFound,
    /// Filesystem is not mounted.
    NotMounted,
    /// Partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

/// Errors from [`ProvisioningPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningError {
    /// Radio driver rejected a mode or configuration change.
    Radio,
    /// Submitted SSID/password failed validation.
    InvalidCredentials,
    /// Nobody submitted credentials before the portal timed out.
    PortalTimeout,
    /// Association with the access point failed.
    ConnectFailed,
}

/// Errors from [`NameServicePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameServiceError {
    /// The responder could not be initialised.
    InitFailed,
    /// The hostname was rejected.
    InvalidHostname,
}

/// Errors from [`HttpPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    /// The listening socket could not be bound.
    Bind,
    /// `respond` was called with no request in flight.
    NoRequest,
    /// Writing the response failed.
    Io,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "file not found"),
            Self::NotMounted => write!(f, "filesystem not mounted"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radio => write!(f, "WiFi driver error"),
            Self::InvalidCredentials => {
                write!(f, "credentials invalid (SSID 1-32 printable bytes, password empty or 8-64 bytes)")
            }
            Self::PortalTimeout => write!(f, "configuration portal timed out"),
            Self::ConnectFailed => write!(f, "WiFi connection failed"),
        }
    }
}

impl fmt::Display for NameServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed => write!(f, "mDNS responder init failed"),
            Self::InvalidHostname => write!(f, "mDNS hostname rejected"),
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind => write!(f, "could not bind HTTP listener"),
            Self::NoRequest => write!(f, "no request in flight"),
            Self::Io => write!(f, "HTTP write failed"),
        }
    }
}
