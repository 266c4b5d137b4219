//! ESP32 bootstrap firmware library.
//!
//! Brings a device from power-on to a networked, remotely updatable state:
//! log capture, persisted configuration, WiFi provisioning, mDNS, password
//! protected OTA and a small diagnostic web interface. All ESP-IDF-specific
//! code is guarded by `#[cfg(target_os = "espidf")]` within each module, so
//! the whole boot path runs on the host against simulated adapters.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod capture;
pub mod config;
pub mod error;
pub mod identity;
pub mod ota;
