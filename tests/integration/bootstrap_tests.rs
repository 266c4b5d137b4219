//! Integration tests for the boot sequence: stage order, configuration
//! hand-off through the portal, and which failures are fatal.

use esp_boilerplate::app::BootStage;
use esp_boilerplate::app::ports::{NameServiceError, ProvisioningError};
use esp_boilerplate::config::{CONFIG_FILE, RuntimeSettings};
use esp_boilerplate::error::Error;
use esp_boilerplate::identity::HOSTNAME;
use esp_boilerplate::ota::OtaError;

use crate::mock_device::{Call, Rig};

fn arm(password: &str) -> Call {
    Call::OtaArm {
        hostname: HOSTNAME.to_owned(),
        port: 3232,
        password: password.to_owned(),
    }
}

// ── Ordering ──────────────────────────────────────────────────

#[test]
fn stages_run_in_order_without_writing() {
    let booted = Rig::new().with_config_file(r#"{"OTAPassword":"abc123"}"#).boot();
    assert!(booted.result.is_ok());

    let host = HOSTNAME.to_owned();
    assert_eq!(
        booted.calls(),
        vec![
            Call::WifiHostname(host.clone()),
            Call::NameServiceHostname(host.clone()),
            Call::Mount,
            Call::Exists(CONFIG_FILE.to_owned()),
            Call::Read(CONFIG_FILE.to_owned()),
            Call::StationMode,
            Call::AutoConnect(format!("{HOSTNAME}AP")),
            Call::NameServiceBegin,
            arm("abc123"),
            Call::HttpBegin(80),
        ]
    );
}

#[test]
fn stored_password_arms_ota_without_save() {
    let mut booted = Rig::new().with_config_file(r#"{"OTAPassword":"abc123"}"#).boot();
    let device = booted.device();
    assert_eq!(device.store().config().ota_password, "abc123");
    assert!(!device.store().is_save_pending());
}

#[test]
fn custom_ports_are_used() {
    let settings = RuntimeSettings {
        web_port: 8080,
        ota_port: 4000,
        ..RuntimeSettings::default()
    };
    let booted = Rig::new().boot_with(settings);
    let calls = booted.calls();
    assert!(calls.contains(&Call::HttpBegin(8080)));
    assert!(calls.iter().any(|c| matches!(c, Call::OtaArm { port: 4000, .. })));
}

// ── Portal hand-off ───────────────────────────────────────────

#[test]
fn portal_password_replaces_stored_one() {
    let mut booted = Rig::new()
        .with_config_file(r#"{"OTAPassword":"abc123"}"#)
        .with_portal_password("xyz789")
        .boot();
    assert!(booted.calls().contains(&arm("xyz789")));

    let device = booted.device();
    assert_eq!(device.store().config().ota_password, "xyz789");
    assert!(device.store().is_save_pending());
    // Persisted by the runtime loop, not during boot.
    assert_eq!(
        device.store().storage().config_file(),
        Some(br#"{"OTAPassword":"abc123"}"#.as_slice())
    );
}

#[test]
fn portal_on_blank_device_sets_password() {
    let mut booted = Rig::new().with_portal_password("helloworld").boot();
    assert!(booted.calls().contains(&arm("helloworld")));
    assert_eq!(booted.device().store().config().ota_password, "helloworld");
}

#[test]
fn overlong_portal_password_is_truncated() {
    let long = "p".repeat(100);
    let mut booted = Rig::new().with_portal_password(&long).boot();
    assert_eq!(booted.device().store().config().ota_password.len(), 64);
}

#[test]
fn multibyte_portal_password_arms_ota_in_full() {
    let password = "\u{e9}".repeat(40);
    let mut booted = Rig::new().with_portal_password(&password).boot();
    assert!(booted.calls().contains(&arm(&password)));
    assert_eq!(booted.device().store().config().ota_password, password.as_str());
}

#[test]
fn multibyte_stored_password_loads() {
    let password = "\u{e9}".repeat(40);
    let booted = Rig::new()
        .with_config_file(&format!(r#"{{"OTAPassword":"{password}"}}"#))
        .boot();
    assert!(booted.calls().contains(&arm(&password)));
}

// ── Non-fatal conditions ──────────────────────────────────────

#[test]
fn mount_failure_continues_with_defaults() {
    let mut rig = Rig::new().with_config_file(r#"{"OTAPassword":"abc123"}"#);
    rig.adapters.storage.fail_mount = true;
    let mut booted = rig.boot();
    assert!(booted.result.is_ok());
    assert_eq!(booted.device().store().config().ota_password, "");
    assert!(booted.calls().contains(&arm("")));
}

#[test]
fn missing_config_is_not_read() {
    let mut booted = Rig::new().boot();
    let calls = booted.calls();
    assert!(calls.contains(&Call::Exists(CONFIG_FILE.to_owned())));
    assert!(!calls.iter().any(|c| matches!(c, Call::Read(_))));
    assert_eq!(booted.device().store().config().ota_password, "");
}

#[test]
fn corrupt_config_uses_defaults() {
    let mut booted = Rig::new().with_config_file("{not json").boot();
    assert_eq!(booted.device().store().config().ota_password, "");
}

#[test]
fn oversized_config_uses_defaults() {
    let padded = format!(r#"{{"OTAPassword":"abc123","pad":"{}"}}"#, "x".repeat(1024));
    let mut booted = Rig::new().with_config_file(&padded).boot();
    assert_eq!(booted.device().store().config().ota_password, "");
}

#[test]
fn unknown_keys_are_ignored() {
    let mut booted = Rig::new()
        .with_config_file(r#"{"OTAPassword":"abc123","extra":1}"#)
        .boot();
    assert_eq!(booted.device().store().config().ota_password, "abc123");
}

// ── Fatal stages ──────────────────────────────────────────────

#[test]
fn wifi_failure_is_fatal() {
    let mut rig = Rig::new();
    rig.adapters.wifi.fail_connect = Some(ProvisioningError::PortalTimeout);
    let booted = rig.boot();
    let err = booted.error();
    assert_eq!(err.stage, BootStage::WifiConnected);
    assert_eq!(err.cause, Error::Provisioning(ProvisioningError::PortalTimeout));
    assert!(!booted.calls().contains(&Call::NameServiceBegin));
}

#[test]
fn portal_save_before_failed_connect_is_not_written() {
    let mut rig = Rig::new().with_portal_password("xyz789");
    rig.adapters.wifi.fail_connect = Some(ProvisioningError::ConnectFailed);
    let booted = rig.boot();
    assert_eq!(booted.error().stage, BootStage::WifiConnected);
    assert!(!booted.calls().iter().any(|c| matches!(c, Call::Write(_))));
}

#[test]
fn name_service_failure_is_fatal() {
    let mut rig = Rig::new();
    rig.adapters.name_service.fail = true;
    let booted = rig.boot();
    let err = booted.error();
    assert_eq!(err.stage, BootStage::NameResolved);
    assert_eq!(err.cause, Error::NameService(NameServiceError::InitFailed));
    assert!(!booted.calls().iter().any(|c| matches!(c, Call::OtaArm { .. })));
}

#[test]
fn ota_failure_is_fatal() {
    let mut rig = Rig::new();
    rig.adapters.ota.fail_arm = true;
    let booted = rig.boot();
    assert_eq!(booted.error().stage, BootStage::OtaReady);
    assert_eq!(booted.error().cause, Error::Ota(OtaError::Bind));
    assert!(!booted.calls().iter().any(|c| matches!(c, Call::HttpBegin(_))));
}

#[test]
fn web_bind_failure_is_fatal() {
    let mut rig = Rig::new();
    rig.adapters.http.fail_bind = true;
    let booted = rig.boot();
    assert_eq!(booted.error().stage, BootStage::WebServing);
    assert_eq!(booted.error().to_string(), "Web-Serving failed: http: could not bind HTTP listener");
}
