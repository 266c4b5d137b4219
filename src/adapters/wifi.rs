//! WiFi station adapter with a provisioning portal.
//!
//! Implements [`ProvisioningPort`] and [`ConnectivityPort`].
//!
//! `auto_connect` tries the credentials stored in NVS first. When there are
//! none, or they fail, it brings up an open access point named after the
//! device, serves the [`portal`](super::portal) form and blocks until the
//! user submits credentials or the portal times out.
//!
//! After a successful connect the adapter remembers the station and
//! [`poll`](ConnectivityPort::poll) re-drives it when the link drops, with
//! exponential backoff between attempts.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi`, NVS
//!   namespace `wifi`, `EspHttpServer` for the portal.
//! - **all other targets**: a scripted simulation for host-side tests.

use core::time::Duration;
use std::time::Instant;

use log::{info, warn};

use super::portal::{self, PortalSubmission};
use crate::app::events::{self, ProvisioningEvent, ProvisioningSender};
use crate::app::ports::{ConnectivityPort, CustomParameter, ProvisioningError, ProvisioningPort};
use crate::identity::HostnameString;

#[cfg(target_os = "espidf")]
use esp_idf_hal::modem::Modem;
#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault},
    wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
        EspWifi,
    },
};

#[cfg(target_os = "espidf")]
const CRED_NAMESPACE: &str = "wifi";
#[cfg(target_os = "espidf")]
const SSID_KEY: &str = "ssid";
#[cfg(target_os = "espidf")]
const PASS_KEY: &str = "pass";

#[cfg(target_os = "espidf")]
const PORTAL_POLL: Duration = Duration::from_millis(100);

/// First wait between reconnect attempts; doubled after each failure.
pub const RECONNECT_BACKOFF_MIN: Duration = Duration::from_secs(2);
pub const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Stored station credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

impl Credentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, ProvisioningError> {
        portal::validate_ssid(ssid)?;
        portal::validate_password(password)?;
        let mut creds = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
        };
        creds
            .ssid
            .push_str(ssid)
            .map_err(|()| ProvisioningError::InvalidCredentials)?;
        creds
            .password
            .push_str(password)
            .map_err(|()| ProvisioningError::InvalidCredentials)?;
        Ok(creds)
    }
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

/// Lost link being re-driven by [`ConnectivityPort::poll`].
#[derive(Debug, Clone, Copy)]
struct Reconnecting {
    attempt: u32,
    backoff: Duration,
    next_attempt: Instant,
}

pub struct WifiAdapter {
    hostname: HostnameString,
    portal_timeout: Duration,
    /// Network last joined successfully; `None` until then and after a reset.
    station: Option<heapless::String<32>>,
    reconnecting: Option<Reconnecting>,
    backoff_min: Duration,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    #[cfg(target_os = "espidf")]
    nvs: EspNvs<NvsDefault>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimRadio,
}

/// Simulation state: what is "stored", what a portal user would submit, and
/// whether the link is up.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimRadio {
    pub stored: Option<Credentials>,
    /// Form body the next portal session receives; `None` times out.
    pub portal_form: Option<String>,
    /// Stored credentials are rejected by the access point.
    pub reject_stored: bool,
    pub connected: bool,
    pub station_mode: bool,
    pub portal_sessions: u32,
    /// The access point is unreachable; reconnect attempts fail.
    pub ap_down: bool,
    pub reconnect_attempts: u32,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs_partition: EspDefaultNvsPartition,
        portal_timeout: Duration,
    ) -> Result<Self, ProvisioningError> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs_partition.clone()))
            .map_err(|e| {
                warn!("WiFi: driver init failed: {}", e);
                ProvisioningError::Radio
            })?;
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop).map_err(|_| ProvisioningError::Radio)?;
        let nvs = EspNvs::new(nvs_partition, CRED_NAMESPACE, true)
            .map_err(|_| ProvisioningError::Radio)?;
        Ok(Self {
            hostname: HostnameString::new(),
            portal_timeout,
            station: None,
            reconnecting: None,
            backoff_min: RECONNECT_BACKOFF_MIN,
            wifi,
            nvs,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(portal_timeout: Duration) -> Self {
        Self {
            hostname: HostnameString::new(),
            portal_timeout,
            station: None,
            reconnecting: None,
            backoff_min: RECONNECT_BACKOFF_MIN,
            sim: SimRadio::default(),
        }
    }

    /// Override the first reconnect backoff.
    #[must_use]
    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.backoff_min = backoff;
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Reconnect attempts made since the link was last lost.
    pub fn reconnect_attempt(&self) -> Option<u32> {
        self.reconnecting.map(|r| r.attempt)
    }

    fn connect_station(&mut self, creds: &Credentials) -> Result<(), ProvisioningError> {
        self.connect_with(creds)?;
        self.station = Some(creds.ssid.clone());
        self.reconnecting = None;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&self) -> &SimRadio {
        &self.sim
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_mut(&mut self) -> &mut SimRadio {
        &mut self.sim
    }

    fn apply_submission(
        &mut self,
        submission: &PortalSubmission,
        params: &mut [CustomParameter],
        events: &ProvisioningSender<'_>,
    ) -> Result<Credentials, ProvisioningError> {
        let creds = Credentials::new(&submission.ssid, &submission.password)?;
        submission.apply_to(params);
        self.store_credentials(&creds);
        events::notify(events, ProvisioningEvent::SaveRequested);
        info!("WiFi: portal saved credentials for '{}'", creds.ssid);
        Ok(creds)
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn load_credentials(&self) -> Option<Credentials> {
        let mut ssid_buf = [0u8; 33];
        let mut pass_buf = [0u8; 65];
        let ssid = self.nvs.get_str(SSID_KEY, &mut ssid_buf).ok().flatten()?;
        let pass = self
            .nvs
            .get_str(PASS_KEY, &mut pass_buf)
            .ok()
            .flatten()
            .unwrap_or("");
        Credentials::new(ssid, pass).ok()
    }

    #[cfg(not(target_os = "espidf"))]
    fn load_credentials(&self) -> Option<Credentials> {
        self.sim.stored.clone()
    }

    #[cfg(target_os = "espidf")]
    fn store_credentials(&mut self, creds: &Credentials) {
        if self.nvs.set_str(SSID_KEY, &creds.ssid).is_err()
            || self.nvs.set_str(PASS_KEY, &creds.password).is_err()
        {
            warn!("WiFi: could not persist credentials");
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn store_credentials(&mut self, creds: &Credentials) {
        self.sim.stored = Some(creds.clone());
    }

    #[cfg(target_os = "espidf")]
    fn client_config(creds: &Credentials) -> ClientConfiguration {
        ClientConfiguration {
            ssid: creds.ssid.clone(),
            password: creds.password.clone(),
            auth_method: if creds.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        }
    }

    #[cfg(target_os = "espidf")]
    fn connect_with(&mut self, creds: &Credentials) -> Result<(), ProvisioningError> {
        info!("WiFi: connecting to '{}'", creds.ssid);
        let _ = self.wifi.stop();
        self.wifi
            .set_configuration(&Configuration::Client(Self::client_config(creds)))
            .map_err(|_| ProvisioningError::Radio)?;
        if let Err(e) = self.wifi.wifi_mut().sta_netif_mut().set_hostname(&self.hostname) {
            warn!("WiFi: could not set hostname: {}", e);
        }
        self.wifi.start().map_err(|_| ProvisioningError::Radio)?;
        self.wifi
            .connect()
            .and_then(|()| self.wifi.wait_netif_up())
            .map_err(|e| {
                warn!("WiFi: connect failed: {}", e);
                ProvisioningError::ConnectFailed
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn connect_with(&mut self, creds: &Credentials) -> Result<(), ProvisioningError> {
        if self.sim.reject_stored && self.sim.stored.as_ref() == Some(creds) && self.sim.portal_sessions == 0 {
            warn!("WiFi(sim): '{}' rejected the stored credentials", creds.ssid);
            return Err(ProvisioningError::ConnectFailed);
        }
        self.sim.connected = true;
        info!("WiFi(sim): connected to '{}'", creds.ssid);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn link_up(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn link_up(&self) -> bool {
        self.sim.connected
    }

    /// Ask the driver to rejoin the configured network. Returns once the
    /// attempt is started; the link comes up asynchronously.
    #[cfg(target_os = "espidf")]
    fn start_reconnect(&mut self) -> Result<(), ProvisioningError> {
        self.wifi.wifi_mut().connect().map_err(|e| {
            warn!("WiFi: reconnect request rejected: {}", e);
            ProvisioningError::ConnectFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn start_reconnect(&mut self) -> Result<(), ProvisioningError> {
        self.sim.reconnect_attempts += 1;
        if self.sim.ap_down {
            return Err(ProvisioningError::ConnectFailed);
        }
        self.sim.connected = true;
        Ok(())
    }

    /// Serve the portal until a valid form arrives or the timeout elapses.
    #[cfg(target_os = "espidf")]
    fn run_portal(
        &mut self,
        ap_name: &str,
        params: &[CustomParameter],
    ) -> Result<PortalSubmission, ProvisioningError> {
        use std::sync::{Arc, Mutex};

        use esp_idf_svc::http::Method;
        use esp_idf_svc::http::server::{Configuration as HttpConfig, EspHttpServer};
        use esp_idf_svc::io::{Read, Write};

        let _ = self.wifi.stop();
        let ap = AccessPointConfiguration {
            ssid: ap_name.try_into().map_err(|_| ProvisioningError::Radio)?,
            auth_method: AuthMethod::None,
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::Mixed(ClientConfiguration::default(), ap))
            .map_err(|_| ProvisioningError::Radio)?;
        self.wifi.start().map_err(|_| ProvisioningError::Radio)?;
        info!("WiFi: portal '{}' open for {:?}", ap_name, self.portal_timeout);

        let page = portal::render_form(ap_name, params);
        let submitted: Arc<Mutex<Option<PortalSubmission>>> = Arc::new(Mutex::new(None));
        let mut server =
            EspHttpServer::new(&HttpConfig::default()).map_err(|_| ProvisioningError::Radio)?;

        server
            .fn_handler(portal::FORM_PATH, Method::Get, move |req| {
                req.into_ok_response()?.write_all(page.as_bytes())
            })
            .map_err(|_| ProvisioningError::Radio)?;

        let slot = Arc::clone(&submitted);
        server
            .fn_handler(portal::SAVE_PATH, Method::Post, move |mut req| {
                let mut body = [0u8; portal::MAX_FORM_LEN];
                let mut len = 0;
                while len < body.len() {
                    let n = req.read(&mut body[len..])?;
                    if n == 0 {
                        break;
                    }
                    len += n;
                }
                let parsed = core::str::from_utf8(&body[..len])
                    .map_err(|_| ProvisioningError::InvalidCredentials)
                    .and_then(portal::parse_form);
                match parsed {
                    Ok(submission) => {
                        *slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
                            Some(submission);
                        req.into_ok_response()?
                            .write_all(b"Credentials saved. Connecting...")
                    }
                    Err(e) => req
                        .into_status_response(400)?
                        .write_all(e.to_string().as_bytes()),
                }
            })
            .map_err(|_| ProvisioningError::Radio)?;

        let deadline = Instant::now() + self.portal_timeout;
        loop {
            if let Some(submission) = submitted
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .take()
            {
                return Ok(submission);
            }
            if Instant::now() >= deadline {
                return Err(ProvisioningError::PortalTimeout);
            }
            std::thread::sleep(PORTAL_POLL);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn run_portal(
        &mut self,
        ap_name: &str,
        params: &[CustomParameter],
    ) -> Result<PortalSubmission, ProvisioningError> {
        self.sim.portal_sessions += 1;
        let page = portal::render_form(ap_name, params);
        info!("WiFi(sim): portal '{}' open ({} byte form)", ap_name, page.len());
        match self.sim.portal_form.take() {
            Some(body) => portal::parse_form(&body),
            None => {
                warn!("WiFi(sim): portal timed out after {:?}", self.portal_timeout);
                Err(ProvisioningError::PortalTimeout)
            }
        }
    }
}

impl ProvisioningPort for WifiAdapter {
    fn set_hostname(&mut self, hostname: &str) {
        self.hostname.clear();
        if self.hostname.push_str(hostname).is_err() {
            warn!("WiFi: hostname '{}' too long, ignored", hostname);
        }
    }

    #[cfg(target_os = "espidf")]
    fn set_station_mode(&mut self) -> Result<(), ProvisioningError> {
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration::default()))
            .map_err(|_| ProvisioningError::Radio)
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_station_mode(&mut self) -> Result<(), ProvisioningError> {
        self.sim.station_mode = true;
        Ok(())
    }

    fn auto_connect(
        &mut self,
        ap_name: &str,
        params: &mut [CustomParameter],
        events: ProvisioningSender<'_>,
    ) -> Result<(), ProvisioningError> {
        if let Some(creds) = self.load_credentials() {
            match self.connect_station(&creds) {
                Ok(()) => return Ok(()),
                Err(e) => warn!("WiFi: stored credentials failed ({}), opening portal", e),
            }
        } else {
            info!("WiFi: no stored credentials, opening portal");
        }

        let submission = self.run_portal(ap_name, params)?;
        let creds = self.apply_submission(&submission, params, &events)?;
        self.connect_station(&creds)
    }

    #[cfg(target_os = "espidf")]
    fn reset_settings(&mut self) {
        self.station = None;
        self.reconnecting = None;
        let _ = self.nvs.remove(SSID_KEY);
        let _ = self.nvs.remove(PASS_KEY);
        let _ = self.wifi.disconnect();
        info!("WiFi: stored credentials erased");
    }

    #[cfg(not(target_os = "espidf"))]
    fn reset_settings(&mut self) {
        self.station = None;
        self.reconnecting = None;
        self.sim.stored = None;
        self.sim.connected = false;
        info!("WiFi(sim): stored credentials erased");
    }
}

impl ConnectivityPort for WifiAdapter {
    fn poll(&mut self) {
        let Some(ssid) = self.station.clone() else {
            return;
        };
        if self.link_up() {
            if let Some(r) = self.reconnecting.take() {
                info!("WiFi: reconnected to '{}' after {} attempt(s)", ssid, r.attempt);
            }
            return;
        }

        let now = Instant::now();
        let backoff_min = self.backoff_min;
        let reconnecting = self.reconnecting.get_or_insert_with(|| {
            warn!("WiFi: connection to '{}' lost, reconnecting", ssid);
            Reconnecting {
                attempt: 0,
                backoff: backoff_min,
                next_attempt: now,
            }
        });
        if now < reconnecting.next_attempt {
            return;
        }
        reconnecting.attempt += 1;
        reconnecting.next_attempt = now + reconnecting.backoff;
        reconnecting.backoff = (reconnecting.backoff * 2).min(RECONNECT_BACKOFF_MAX);
        let attempt = reconnecting.attempt;

        info!("WiFi: reconnect attempt {} to '{}'", attempt, ssid);
        if let Err(e) = self.start_reconnect() {
            warn!("WiFi: reconnect attempt {} failed: {}", attempt, e);
        }
    }

    fn is_connected(&self) -> bool {
        self.link_up()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
