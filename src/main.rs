//! Bootstrap firmware entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  FlashFs        WifiAdapter        MdnsAdapter                 │
//! │  (Storage)      (Provisioning)     (NameService)               │
//! │  OtaService     HttpListener       CaptureLogger               │
//! │  (OTA)          (HTTP)             (log + capture ring)        │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │   bootstrap() ──▶ Device::tick() loop ──▶ restart      │    │
//! │  │   ConfigStore · WebInterface                           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::time::Duration;

use anyhow::Result;
use log::{error, info};

use esp_boilerplate::adapters::flash_fs::FlashFs;
use esp_boilerplate::adapters::http::HttpListener;
use esp_boilerplate::adapters::mdns::MdnsAdapter;
use esp_boilerplate::adapters::wifi::WifiAdapter;
use esp_boilerplate::adapters::{DevicePlatform, log_sink, system};
use esp_boilerplate::app::ports::Adapters;
use esp_boilerplate::app::{self, RestartReason};
use esp_boilerplate::config::RuntimeSettings;
use esp_boilerplate::identity::DeviceIdentity;
use esp_boilerplate::ota::{OtaService, check_rollback};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();

    let settings = RuntimeSettings::default();
    settings.validate().map_err(anyhow::Error::msg)?;

    let capture = log_sink::init(Box::new(std::io::stdout()), settings.log_level)?;

    info!("╔══════════════════════════════════════╗");
    info!("║  ESP Boilerplate v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");
    info!("Reset reason: {}", system::last_reset_reason());

    // ── 2. OTA rollback check ─────────────────────────────────
    check_rollback();

    // ── 3. Peripherals and adapters ───────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let wifi = WifiAdapter::new(
        peripherals.modem,
        sysloop,
        nvs,
        Duration::from_secs(u64::from(settings.portal_timeout_secs)),
    )
    .map_err(|e| anyhow::anyhow!("WiFi init: {}", e))?;

    let adapters = Adapters::<DevicePlatform> {
        storage: FlashFs::new(settings.storage_mount_point),
        wifi,
        name_service: MdnsAdapter::new(settings.web_port),
        ota: OtaService::new(),
        http: HttpListener::new(),
    };

    // ── 4. Boot stages ────────────────────────────────────────
    let mut device = match app::bootstrap(DeviceIdentity::default(), settings, adapters, capture) {
        Ok(device) => device,
        Err(e) => {
            error!("Boot aborted: {}", e);
            system::restart(RestartReason::BootFailure(e.stage));
        }
    };

    // ── 5. Runtime loop ───────────────────────────────────────
    let reason = app::run(&mut device, &mut FreeRtos);
    system::restart(reason)
}
