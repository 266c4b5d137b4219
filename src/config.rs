//! Configuration.
//!
//! Two kinds live here:
//! - [`DeviceConfig`]: the single record persisted to flash as JSON and
//!   available across reboots.
//! - [`RuntimeSettings`]: compile-time tunables for ports, delays and
//!   limits.

use core::fmt;

use log::LevelFilter;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Name of the configuration file, relative to the storage mount point.
pub const CONFIG_FILE: &str = "config.json";

/// Largest on-flash configuration file accepted by `load` and produced by
/// `handle_save`.
pub const MAX_CONFIG_FILE_SIZE_BYTES: usize = 1024;

/// Maximum length of the OTA password, in characters.
pub const MAX_OTA_PASSWORD_CHARS: usize = 64;

/// Bytes needed to hold [`MAX_OTA_PASSWORD_CHARS`] characters of UTF-8.
pub const MAX_OTA_PASSWORD_BYTES: usize = MAX_OTA_PASSWORD_CHARS * 4;

/// Bounded OTA password storage. The bound is enforced in characters.
pub type OtaPassword = heapless::String<MAX_OTA_PASSWORD_BYTES>;

// ───────────────────────────────────────────────────────────────
// Persisted record
// ───────────────────────────────────────────────────────────────

/// The configuration loaded from internal flash.
///
/// Every field has a default, so a missing or unrecognised key never leaves
/// the record half-built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Password authorising Over-The-Air updates. Empty disables the check.
    #[serde(rename = "OTAPassword", deserialize_with = "bounded_password")]
    pub ota_password: OtaPassword,
}

fn bounded_password<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OtaPassword, D::Error> {
    let password = OtaPassword::deserialize(deserializer)?;
    let chars = password.chars().count();
    if chars > MAX_OTA_PASSWORD_CHARS {
        return Err(D::Error::invalid_length(
            chars,
            &"an OTA password of at most 64 characters",
        ));
    }
    Ok(password)
}

impl DeviceConfig {
    /// Parse the on-flash JSON representation.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Serialise to the on-flash JSON representation.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Replace the OTA password, keeping at most
    /// [`MAX_OTA_PASSWORD_CHARS`] characters.
    pub fn set_ota_password(&mut self, password: &str) {
        self.ota_password.clear();
        for c in password.chars().take(MAX_OTA_PASSWORD_CHARS) {
            if self.ota_password.push(c).is_err() {
                break;
            }
        }
        if password.chars().count() > MAX_OTA_PASSWORD_CHARS {
            log::warn!("config: OTA password truncated to {MAX_OTA_PASSWORD_CHARS} characters");
        }
    }
}

impl fmt::Display for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The password is never rendered.
        write!(f, "OTAPassword: <hidden>")
    }
}

// ───────────────────────────────────────────────────────────────
// Tunables
// ───────────────────────────────────────────────────────────────

/// Runtime tunables. Not persisted.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Port of the diagnostic web interface.
    pub web_port: u16,
    /// Port the OTA listener accepts update sessions on.
    pub ota_port: u16,
    /// Wait after a failed connectivity check before the next tick (ms).
    pub reconnect_delay_ms: u32,
    /// How long the provisioning portal waits for credentials (seconds).
    pub portal_timeout_secs: u32,
    /// Sleep after every completed loop iteration (ms); 0 disables.
    pub loop_yield_ms: u32,
    /// Requests serviced per web poll.
    pub max_requests_per_poll: usize,
    /// Console/capture log level.
    pub log_level: LevelFilter,
    /// Where the flash filesystem is mounted.
    pub storage_mount_point: &'static str,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            web_port: 80,
            ota_port: 3232,
            reconnect_delay_ms: 1000,
            portal_timeout_secs: 180,
            loop_yield_ms: 10,
            max_requests_per_poll: 4,
            log_level: LevelFilter::Info,
            storage_mount_point: "/spiffs",
        }
    }
}

impl RuntimeSettings {
    /// Reject settings that would wedge the runtime loop.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.web_port == self.ota_port && self.web_port != 0 {
            return Err("web_port and ota_port must differ");
        }
        if !(100..=60_000).contains(&self.reconnect_delay_ms) {
            return Err("reconnect_delay_ms must be 100-60000");
        }
        if self.loop_yield_ms > 1000 {
            return Err("loop_yield_ms must be at most 1000");
        }
        if self.portal_timeout_secs == 0 {
            return Err("portal_timeout_secs must be non-zero");
        }
        if self.max_requests_per_poll == 0 {
            return Err("max_requests_per_poll must be non-zero");
        }
        if !self.storage_mount_point.starts_with('/') {
            return Err("storage_mount_point must be absolute");
        }
        Ok(())
    }
}
