//! Unified error type for the bootstrap firmware.
//!
//! Each port keeps its own small error enum next to its trait; this `Error`
//! is what the bootstrap sequence funnels them into so a failed stage can be
//! reported uniformly. All variants are `Copy`.

use core::fmt;

use crate::app::ports::{HttpError, NameServiceError, ProvisioningError};
use crate::ota::OtaError;

/// Every fallible bootstrap step funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// WiFi provisioning or connection failure.
    Provisioning(ProvisioningError),
    /// mDNS responder failure.
    NameService(NameServiceError),
    /// OTA listener or update failure.
    Ota(OtaError),
    /// Diagnostic web listener failure.
    Http(HttpError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisioning(e) => write!(f, "provisioning: {e}"),
            Self::NameService(e) => write!(f, "mdns: {e}"),
            Self::Ota(e) => write!(f, "ota: {e}"),
            Self::Http(e) => write!(f, "http: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ProvisioningError> for Error {
    fn from(e: ProvisioningError) -> Self {
        Self::Provisioning(e)
    }
}

impl From<NameServiceError> for Error {
    fn from(e: NameServiceError) -> Self {
        Self::NameService(e)
    }
}

impl From<OtaError> for Error {
    fn from(e: OtaError) -> Self {
        Self::Ota(e)
    }
}

impl From<HttpError> for Error {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}
