//! mDNS responder adapter.
//!
//! Implements [`NameServicePort`]: answers for `<hostname>.local` and
//! advertises the diagnostic web interface as `_http._tcp`. Uses the
//! ESP-IDF `mdns` component on ESP-IDF and is a recording stub on
//! simulation targets.

use log::info;

use crate::app::ports::{NameServiceError, NameServicePort};
use crate::identity::{DeviceIdentity, HostnameString};

const MDNS_SERVICE_TYPE: &str = "_http";
const MDNS_SERVICE_PROTO: &str = "_tcp";

pub struct MdnsAdapter {
    hostname: HostnameString,
    web_port: u16,
    active: bool,
}

impl MdnsAdapter {
    /// `web_port` is the port advertised for `_http._tcp`.
    pub fn new(web_port: u16) -> Self {
        Self {
            hostname: HostnameString::new(),
            web_port,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&self) -> Result<(), NameServiceError> {
        use esp_idf_svc::sys::*;

        let mut hostname_buf = [0u8; 33];
        let hb = self.hostname.as_bytes();
        hostname_buf[..hb.len()].copy_from_slice(hb);

        // SAFETY: every pointer passed below is a NUL-terminated buffer that
        // outlives the call; mdns copies what it keeps.
        unsafe {
            let ret = mdns_init();
            if ret != ESP_OK as i32 {
                log::error!("mDNS: mdns_init failed ({})", ret);
                return Err(NameServiceError::InitFailed);
            }
            if mdns_hostname_set(hostname_buf.as_ptr().cast()) != ESP_OK as i32 {
                mdns_free();
                return Err(NameServiceError::InvalidHostname);
            }
            mdns_instance_name_set(hostname_buf.as_ptr().cast());

            let ret = mdns_service_add(
                core::ptr::null(),
                b"_http\0".as_ptr().cast(),
                b"_tcp\0".as_ptr().cast(),
                self.web_port,
                core::ptr::null_mut(),
                0,
            );
            if ret != ESP_OK as i32 {
                log::warn!("mDNS: _http._tcp advertisement failed ({})", ret);
            }
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&self) -> Result<(), NameServiceError> {
        info!("mDNS(sim): registered {}.local", self.hostname);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&self) {
        // SAFETY: mdns_free is valid after a successful mdns_init.
        unsafe {
            esp_idf_svc::sys::mdns_free();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&self) {
        info!("mDNS(sim): unregistered");
    }
}

impl NameServicePort for MdnsAdapter {
    fn set_hostname(&mut self, hostname: &str) {
        self.hostname.clear();
        // Over-long names are caught by `begin`.
        let _ = self.hostname.push_str(hostname);
    }

    fn begin(&mut self) -> Result<(), NameServiceError> {
        if self.active {
            return Ok(());
        }
        if DeviceIdentity::new(&self.hostname).is_err() {
            return Err(NameServiceError::InvalidHostname);
        }
        self.platform_start()?;
        self.active = true;
        info!(
            "mDNS: advertising {}.local {}.{}:{}",
            self.hostname, MDNS_SERVICE_TYPE, MDNS_SERVICE_PROTO, self.web_port
        );
        Ok(())
    }
}

impl Drop for MdnsAdapter {
    fn drop(&mut self) {
        if self.active {
            self.platform_stop();
        }
    }
}
