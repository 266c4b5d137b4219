//! Device identity.
//!
//! One fixed hostname is used everywhere:
//! - WiFi station hostname (routers often expose it over DNS)
//! - mDNS name (`<hostname>.local`)
//! - provisioning access point name (`<hostname>AP`)

use core::fmt;

/// The hostname of this device.
pub const HOSTNAME: &str = "ESP32BoilerplateRust";

/// Suffix appended to the hostname to name the provisioning access point.
pub const AP_SUFFIX: &str = "AP";

/// Longest hostname accepted (also the SSID limit).
pub const MAX_HOSTNAME_LEN: usize = 32;

pub type HostnameString = heapless::String<MAX_HOSTNAME_LEN>;
pub type ApNameString = heapless::String<{ MAX_HOSTNAME_LEN + AP_SUFFIX.len() }>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityError {
    Empty,
    TooLong,
    /// Spaces or non-printable bytes.
    InvalidCharacter,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "hostname is empty"),
            Self::TooLong => write!(f, "hostname longer than {MAX_HOSTNAME_LEN} bytes"),
            Self::InvalidCharacter => write!(f, "hostname must be printable ASCII without spaces"),
        }
    }
}

/// Validated hostname plus the names derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    hostname: HostnameString,
}

impl DeviceIdentity {
    pub fn new(hostname: &str) -> Result<Self, IdentityError> {
        if hostname.is_empty() {
            return Err(IdentityError::Empty);
        }
        if hostname.len() > MAX_HOSTNAME_LEN {
            return Err(IdentityError::TooLong);
        }
        // Visible ASCII only; rules out spaces, controls and multibyte text.
        if !hostname.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(IdentityError::InvalidCharacter);
        }
        let mut name = HostnameString::new();
        name.push_str(hostname)
            .map_err(|()| IdentityError::TooLong)?;
        Ok(Self { hostname: name })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Name of the provisioning access point: `<hostname>AP`.
    pub fn ap_name(&self) -> ApNameString {
        let mut name = ApNameString::new();
        // Capacity covers the longest hostname plus the suffix.
        let _ = name.push_str(&self.hostname);
        let _ = name.push_str(AP_SUFFIX);
        name
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        let mut hostname = HostnameString::new();
        let _ = hostname.push_str(HOSTNAME);
        Self { hostname }
    }
}
