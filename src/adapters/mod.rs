//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                         | Connects to              |
//! |-------------|------------------------------------|--------------------------|
//! | `flash_fs`  | StoragePort                        | SPIFFS via ESP-IDF VFS   |
//! | `wifi`      | ProvisioningPort, ConnectivityPort | ESP-IDF WiFi + portal AP |
//! | `portal`    | (used by `wifi`)                   | Portal form HTML         |
//! | `mdns`      | NameServicePort                    | ESP-IDF mdns component   |
//! | `http`      | HttpPort                           | TCP listener             |
//! | `log_sink`  | `log::Log`                         | UART console + capture   |
//! | `system`    | (free functions)                   | Restart, reset cause     |
//!
//! The OTA listener lives in [`crate::ota`] next to the update manager it
//! drives.

pub mod flash_fs;
pub mod http;
pub mod log_sink;
pub mod mdns;
pub mod portal;
pub mod system;
pub mod wifi;

use crate::app::ports::Platform;
use crate::ota::OtaService;

/// The production adapter set.
pub struct DevicePlatform;

impl Platform for DevicePlatform {
    type Storage = flash_fs::FlashFs;
    type Wifi = wifi::WifiAdapter;
    type NameService = mdns::MdnsAdapter;
    type Ota = OtaService;
    type Http = http::HttpListener;
}
