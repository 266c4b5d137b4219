//! Fuzz target: OTA command lines and portal form bodies
//!
//! Both arrive from the network before any authorisation is complete:
//! - `parse_command` must never panic and only accept well-formed BEGIN
//! - `parse_form` must never panic and only return validated credentials
//!
//! cargo fuzz run fuzz_ota_command

#![no_main]

use libfuzzer_sys::fuzz_target;

use esp_boilerplate::adapters::portal::{parse_form, validate_password, validate_ssid};
use esp_boilerplate::ota::service::{OtaCommand, parse_command};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok(OtaCommand::Begin { size, .. }) = parse_command(text) {
        assert!(text.trim_start().starts_with("BEGIN"));
        let _ = size;
    }

    if let Ok(submission) = parse_form(text) {
        assert!(validate_ssid(&submission.ssid).is_ok());
        assert!(validate_password(&submission.password).is_ok());
    }
});
