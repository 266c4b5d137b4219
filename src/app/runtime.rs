//! Runtime loop.
//!
//! One [`Device::tick`] per iteration, in fixed order:
//! 1. connectivity: re-drive a dropped link, then back off and skip the
//!    rest while offline
//! 2. OTA
//! 3. pending configuration save
//! 4. diagnostic web interface

use core::fmt;
use core::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use super::bootstrap::BootStage;
use super::ports::{ConnectivityPort, OtaPort, Platform, ProvisioningPort};
use super::store::ConfigStore;
use super::web::{WebAction, WebInterface};
use crate::config::RuntimeSettings;
use crate::identity::DeviceIdentity;
use crate::ota::OtaPoll;

/// Why the process is about to restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    BootFailure(BootStage),
    /// `/resetresetreset` was requested.
    FactoryReset,
    /// A new firmware image is ready to boot.
    OtaApplied,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BootFailure(stage) => write!(f, "boot failed at {stage}"),
            Self::FactoryReset => write!(f, "factory reset"),
            Self::OtaApplied => write!(f, "OTA update applied"),
        }
    }
}

/// What the loop driver should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    /// WiFi is down; wait before the next tick.
    Backoff(Duration),
    Restart(RestartReason),
}

/// Everything bootstrap set up, owned for the rest of the process.
pub struct Device<P: Platform> {
    pub(super) identity: DeviceIdentity,
    pub(super) settings: RuntimeSettings,
    pub(super) store: ConfigStore<P::Storage>,
    pub(super) wifi: P::Wifi,
    pub(super) name_service: P::NameService,
    pub(super) ota: P::Ota,
    pub(super) web: WebInterface<P::Http>,
}

impl<P: Platform> Device<P> {
    /// One loop iteration.
    pub fn tick(&mut self) -> LoopControl {
        self.wifi.poll();
        if !self.wifi.is_connected() {
            info!("No WiFi connection. Attempting to reconnect to the WiFi...");
            return LoopControl::Backoff(Duration::from_millis(
                self.settings.reconnect_delay_ms.into(),
            ));
        }

        let restart = match self.ota.handle() {
            Ok(OtaPoll::Applied) => Some(RestartReason::OtaApplied),
            Ok(OtaPoll::Idle | OtaPoll::Rejected) => None,
            Err(e) => {
                warn!("OTA update failed: {}", e);
                None
            }
        };

        self.store.handle_save();

        if let Some(reason) = restart {
            return LoopControl::Restart(reason);
        }

        if let Some(WebAction::FactoryReset) = self.web.handle_client() {
            warn!("Clearing WiFi settings and restarting");
            self.wifi.reset_settings();
            return LoopControl::Restart(RestartReason::FactoryReset);
        }

        LoopControl::Continue
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn store(&self) -> &ConfigStore<P::Storage> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore<P::Storage> {
        &mut self.store
    }

    pub fn wifi(&self) -> &P::Wifi {
        &self.wifi
    }

    pub fn wifi_mut(&mut self) -> &mut P::Wifi {
        &mut self.wifi
    }

    pub fn name_service(&self) -> &P::NameService {
        &self.name_service
    }

    pub fn ota(&self) -> &P::Ota {
        &self.ota
    }

    pub fn ota_mut(&mut self) -> &mut P::Ota {
        &mut self.ota
    }

    pub fn web(&self) -> &WebInterface<P::Http> {
        &self.web
    }

    pub fn web_mut(&mut self) -> &mut WebInterface<P::Http> {
        &mut self.web
    }
}

/// Tick until something asks for a restart.
///
/// `loop_yield_ms` is slept after every completed tick so the idle task can
/// feed the task watchdog.
pub fn run<P: Platform, D: DelayNs>(device: &mut Device<P>, delay: &mut D) -> RestartReason {
    loop {
        match device.tick() {
            LoopControl::Continue => {
                if device.settings.loop_yield_ms > 0 {
                    delay.delay_ms(device.settings.loop_yield_ms);
                }
            }
            LoopControl::Backoff(wait) => delay.delay_ms(wait.as_millis() as u32),
            LoopControl::Restart(reason) => {
                info!("Restart requested: {}", reason);
                return reason;
            }
        }
    }
}
