//! Bootstrap sequence.
//!
//! ```text
//! Identity-Set ─▶ Filesystem-Ready ─▶ Config-Loaded ─▶ WiFi-Connected
//!                                                           │
//!      Web-Serving ◀── OTA-Ready ◀── Name-Resolved ◀────────┘
//! ```
//!
//! Each stage either advances or fails the whole boot with a [`BootError`];
//! the caller answers that with a process restart. Nothing survives the
//! restart except what is already on flash.

use core::fmt;

use log::{error, info, warn};

use super::events::ProvisioningChannel;
use super::ports::{
    Adapters, CustomParameter, NameServicePort, OtaPort, Platform, ProvisioningPort, StoragePort,
};
use super::runtime::Device;
use super::store::ConfigStore;
use super::web::WebInterface;
use crate::capture::CaptureReader;
use crate::config::{MAX_OTA_PASSWORD_CHARS, RuntimeSettings};
use crate::error::Error;
use crate::identity::DeviceIdentity;

/// Portal field carrying the OTA password.
pub const OTA_PASSWORD_PARAM_ID: &str = "OTAPassword";
pub const OTA_PASSWORD_PARAM_LABEL: &str = "Password protecting future Over-The-Air updates.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStage {
    IdentitySet,
    FilesystemReady,
    ConfigLoaded,
    WifiConnected,
    NameResolved,
    OtaReady,
    WebServing,
}

impl fmt::Display for BootStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IdentitySet => "Identity-Set",
            Self::FilesystemReady => "Filesystem-Ready",
            Self::ConfigLoaded => "Config-Loaded",
            Self::WifiConnected => "WiFi-Connected",
            Self::NameResolved => "Name-Resolved",
            Self::OtaReady => "OTA-Ready",
            Self::WebServing => "Web-Serving",
        };
        f.write_str(name)
    }
}

/// The stage that could not be reached, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootError {
    pub stage: BootStage,
    pub cause: Error,
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.cause)
    }
}

impl std::error::Error for BootError {}

fn fatal<E: Into<Error>>(stage: BootStage, message: &'static str) -> impl FnOnce(E) -> BootError {
    move |e| {
        let cause = e.into();
        error!("{}: {}. Restarting the ESP", message, cause);
        BootError { stage, cause }
    }
}

/// Run every boot stage in order and hand back the runtime context.
pub fn bootstrap<P: Platform>(
    identity: DeviceIdentity,
    settings: RuntimeSettings,
    adapters: Adapters<P>,
    capture: CaptureReader,
) -> Result<Device<P>, BootError> {
    let Adapters {
        mut storage,
        mut wifi,
        mut name_service,
        mut ota,
        http,
    } = adapters;

    info!("Starting up.");

    // ── Identity-Set ──
    wifi.set_hostname(identity.hostname());
    name_service.set_hostname(identity.hostname());

    // ── Filesystem-Ready ──
    info!("Starting FS...");
    match storage.mount() {
        Ok(()) => info!("FS started."),
        Err(e) => warn!("FS mount failed ({}), continuing with defaults", e),
    }

    // ── Config-Loaded ──
    info!("Loading config...");
    let mut store = ConfigStore::new(storage);
    store.load();
    info!("Config loaded.");

    // ── WiFi-Connected ──
    info!("Connecting to the WiFi...");
    wifi.set_station_mode()
        .map_err(fatal(BootStage::WifiConnected, "Failed to enter station mode"))?;

    let mut ota_password = CustomParameter::new(
        OTA_PASSWORD_PARAM_ID,
        OTA_PASSWORD_PARAM_LABEL,
        &store.config().ota_password,
        MAX_OTA_PASSWORD_CHARS,
    );
    let events = ProvisioningChannel::new();
    let connected = wifi.auto_connect(
        &identity.ap_name(),
        core::slice::from_mut(&mut ota_password),
        events.sender(),
    );
    // Saves requested on the portal are flushed by the runtime loop.
    while events.try_receive().is_ok() {
        store.set_save_flag();
    }
    connected.map_err(fatal(BootStage::WifiConnected, "Failed to connect"))?;
    info!("Successfully connected to the WiFi");
    store.config_mut().set_ota_password(ota_password.value());

    // ── Name-Resolved ──
    info!("Setting up mDNS...");
    name_service
        .begin()
        .map_err(fatal(BootStage::NameResolved, "Error setting up mDNS responder"))?;
    info!("mDNS started");

    // ── OTA-Ready ──
    info!("Setting up OTA support...");
    ota.arm(
        identity.hostname(),
        settings.ota_port,
        &store.config().ota_password,
    )
    .map_err(fatal(BootStage::OtaReady, "Error setting up OTA support"))?;
    info!("OTA support set up completed.");

    // ── Web-Serving ──
    info!("Setting up the web server...");
    let web = WebInterface::new(settings.web_port, capture, http)
        .map_err(fatal(BootStage::WebServing, "Error setting up the web server"))?
        .with_max_requests_per_poll(settings.max_requests_per_poll);
    info!("Web server setup completed.");

    info!("Setup completed.");
    Ok(Device {
        identity,
        settings,
        store,
        wifi,
        name_service,
        ota,
        web,
    })
}
