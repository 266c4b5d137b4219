//! Integration tests for the runtime loop: per-tick ordering, deferred
//! saves, OTA restarts and the factory-reset route.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use esp_boilerplate::app::store::SaveOutcome;
use esp_boilerplate::app::{LoopControl, RestartReason, run};
use esp_boilerplate::ota::{OtaError, OtaPoll};

use crate::mock_device::{Booted, Call, Rig};

/// Records every requested delay instead of sleeping.
#[derive(Default)]
struct RecordingDelay {
    waits_ms: Vec<u32>,
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.waits_ms.push(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.waits_ms.push(ms);
    }
}

fn booted_with_portal(password: &str) -> Booted {
    let booted = Rig::new()
        .with_config_file(r#"{"OTAPassword":"abc123"}"#)
        .with_portal_password(password)
        .boot();
    assert!(booted.result.is_ok());
    booted.clear_calls();
    booted
}

fn booted() -> Booted {
    let booted = Rig::new().boot();
    assert!(booted.result.is_ok());
    booted.clear_calls();
    booted
}

// ── Tick ordering ─────────────────────────────────────────────

#[test]
fn offline_tick_backs_off_and_skips_services() {
    let mut booted = booted();
    booted.device().wifi_mut().connected = false;
    assert_eq!(
        booted.device().tick(),
        LoopControl::Backoff(Duration::from_millis(1000))
    );
    assert_eq!(booted.calls(), vec![Call::WifiPoll]);
}

#[test]
fn every_tick_drives_connectivity_first() {
    let mut booted = booted();
    booted.device().wifi_mut().connected = false;
    booted.device().tick();
    booted.device().wifi_mut().connected = true;
    booted.device().tick();
    assert_eq!(
        booted.calls(),
        vec![Call::WifiPoll, Call::WifiPoll, Call::OtaHandle, Call::HttpPoll]
    );
}

#[test]
fn online_tick_polls_ota_then_web() {
    let mut booted = booted();
    assert_eq!(booted.device().tick(), LoopControl::Continue);
    assert_eq!(
        booted.calls(),
        vec![Call::WifiPoll, Call::OtaHandle, Call::HttpPoll]
    );
}

#[test]
fn portal_save_is_flushed_on_first_tick() {
    let mut booted = booted_with_portal("xyz789");
    booted.device().tick();

    let calls = booted.calls();
    let handle = calls.iter().position(|c| *c == Call::OtaHandle).unwrap();
    let write = calls.iter().position(|c| matches!(c, Call::Write(_))).unwrap();
    let poll = calls.iter().position(|c| *c == Call::HttpPoll).unwrap();
    assert!(handle < write && write < poll);

    let device = booted.device();
    assert!(!device.store().is_save_pending());
    assert_eq!(
        device.store().storage().config_file(),
        Some(br#"{"OTAPassword":"xyz789"}"#.as_slice())
    );

    // Nothing left to save.
    booted.clear_calls();
    booted.device().tick();
    assert!(!booted.calls().iter().any(|c| matches!(c, Call::Write(_))));
}

#[test]
fn save_waits_for_connectivity() {
    let mut booted = booted_with_portal("xyz789");
    booted.device().wifi_mut().connected = false;
    booted.device().tick();
    assert!(booted.device().store().is_save_pending());

    booted.device().wifi_mut().connected = true;
    booted.device().tick();
    assert!(!booted.device().store().is_save_pending());
}

#[test]
fn failed_save_is_not_retried() {
    let mut booted = booted_with_portal("xyz789");
    booted.device().store_mut().storage_mut().fail_write = true;
    booted.device().tick();
    booted.device().tick();

    let writes = booted
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::Write(_)))
        .count();
    assert_eq!(writes, 1);
    assert!(!booted.device().store().is_save_pending());
    assert_eq!(booted.device().store_mut().handle_save(), SaveOutcome::Idle);
}

// ── OTA ───────────────────────────────────────────────────────

#[test]
fn applied_update_saves_then_restarts() {
    let mut booted = booted_with_portal("xyz789");
    booted.device().ota_mut().polls.push_back(Ok(OtaPoll::Applied));
    assert_eq!(
        booted.device().tick(),
        LoopControl::Restart(RestartReason::OtaApplied)
    );
    assert!(!booted.calls().contains(&Call::HttpPoll));
    assert!(booted.calls().iter().any(|c| matches!(c, Call::Write(_))));
}

#[test]
fn rejected_or_failed_update_keeps_running() {
    let mut booted = booted();
    booted.device().ota_mut().polls.push_back(Ok(OtaPoll::Rejected));
    booted.device().ota_mut().polls.push_back(Err(OtaError::VerifyFailed));
    assert_eq!(booted.device().tick(), LoopControl::Continue);
    assert_eq!(booted.device().tick(), LoopControl::Continue);
}

// ── Web ───────────────────────────────────────────────────────

#[test]
fn reset_route_clears_wifi_and_restarts() {
    let mut booted = booted();
    booted.device().web_mut().http_mut().request("/resetresetreset");
    assert_eq!(
        booted.device().tick(),
        LoopControl::Restart(RestartReason::FactoryReset)
    );
    assert!(booted.calls().contains(&Call::ResetSettings));
    assert!(booted.device().web().http().sent.is_empty());
}

#[test]
fn serial_out_serves_captured_log() {
    let mut booted = booted();
    booted.tee.write_bytes(b"Starting up.\n");
    booted.device().web_mut().http_mut().request("/serialOut");
    booted.device().tick();

    let sent = &booted.device().web().http().sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "/serialOut");
    assert_eq!(sent[0].1.body, b"Starting up.\n");
}

// ── run() ─────────────────────────────────────────────────────

#[test]
fn run_yields_between_ticks_until_restart() {
    let mut booted = booted();
    booted.device().ota_mut().polls.extend([
        Ok(OtaPoll::Idle),
        Ok(OtaPoll::Idle),
        Ok(OtaPoll::Applied),
    ]);
    let mut delay = RecordingDelay::default();
    let reason = run(booted.device(), &mut delay);
    assert_eq!(reason, RestartReason::OtaApplied);
    assert_eq!(delay.waits_ms, vec![10, 10]);
}

#[test]
fn backoff_uses_configured_reconnect_delay() {
    use esp_boilerplate::config::RuntimeSettings;

    let settings = RuntimeSettings {
        reconnect_delay_ms: 2500,
        ..RuntimeSettings::default()
    };
    let mut booted = Rig::new().boot_with(settings);
    booted.device().wifi_mut().connected = false;
    assert_eq!(
        booted.device().tick(),
        LoopControl::Backoff(Duration::from_millis(2500))
    );
}
