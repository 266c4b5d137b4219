//! Provisioning portal pages.
//!
//! The access point started by the WiFi adapter serves one HTML form
//! (SSID, password and every [`CustomParameter`]) and accepts it back as
//! `application/x-www-form-urlencoded`. Rendering and parsing live here so
//! they can be tested without a radio.

use core::fmt::Write;

use crate::app::ports::{CustomParameter, ProvisioningError};
use super::utils::is_printable_ascii;

pub const FORM_PATH: &str = "/";
pub const SAVE_PATH: &str = "/save";

/// Largest form body accepted.
pub const MAX_FORM_LEN: usize = 1024;

pub const SSID_FIELD: &str = "s";
pub const PASSWORD_FIELD: &str = "p";

/// Credentials and extra fields submitted through the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalSubmission {
    pub ssid: String,
    pub password: String,
    pub fields: Vec<(String, String)>,
}

impl PortalSubmission {
    /// Copy submitted values into the matching parameters. Fields not
    /// present in the form leave their parameter untouched.
    pub fn apply_to(&self, params: &mut [CustomParameter]) {
        for param in params.iter_mut() {
            if let Some((_, value)) = self.fields.iter().find(|(id, _)| id == param.id()) {
                param.set_value(value);
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

pub fn validate_ssid(ssid: &str) -> Result<(), ProvisioningError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ProvisioningError::InvalidCredentials);
    }
    Ok(())
}

/// Empty (open network) or 8-64 bytes (WPA2).
pub fn validate_password(password: &str) -> Result<(), ProvisioningError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ProvisioningError::InvalidCredentials);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Rendering
// ───────────────────────────────────────────────────────────────

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// The configuration form, pre-filled with every parameter's value.
pub fn render_form(ap_name: &str, params: &[CustomParameter]) -> String {
    let mut page = String::new();
    let _ = write!(
        page,
        "<html><head><title>{title}</title></head><body>\
         <h1>{title}</h1>\
         <form method=\"POST\" action=\"{SAVE_PATH}\">\
         <label for=\"{SSID_FIELD}\">SSID</label><br>\
         <input id=\"{SSID_FIELD}\" name=\"{SSID_FIELD}\" maxlength=\"32\"><br>\
         <label for=\"{PASSWORD_FIELD}\">Password</label><br>\
         <input id=\"{PASSWORD_FIELD}\" name=\"{PASSWORD_FIELD}\" type=\"password\" maxlength=\"64\"><br>",
        title = html_escape(ap_name),
    );
    for param in params {
        let _ = write!(
            page,
            "<label for=\"{id}\">{label}</label><br>\
             <input id=\"{id}\" name=\"{id}\" maxlength=\"{max}\" value=\"{value}\"><br>",
            id = html_escape(param.id()),
            label = html_escape(param.label()),
            max = param.max_len(),
            value = html_escape(param.value()),
        );
    }
    page.push_str("<button type=\"submit\">Save</button></form></body></html>");
    page
}

// ───────────────────────────────────────────────────────────────
// Parsing
// ───────────────────────────────────────────────────────────────

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode one `x-www-form-urlencoded` component.
pub fn url_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hi = hex_val(*bytes.get(i + 1)?)?;
                let lo = hex_val(*bytes.get(i + 2)?)?;
                out.push((hi << 4) | lo);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).ok()
}

/// Parse a submitted form body and validate the credentials in it.
pub fn parse_form(body: &str) -> Result<PortalSubmission, ProvisioningError> {
    if body.len() > MAX_FORM_LEN {
        return Err(ProvisioningError::InvalidCredentials);
    }
    let mut ssid = None;
    let mut password = String::new();
    let mut fields = Vec::new();

    for pair in body.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = url_decode(key).ok_or(ProvisioningError::InvalidCredentials)?;
        let value = url_decode(value).ok_or(ProvisioningError::InvalidCredentials)?;
        match key.as_str() {
            SSID_FIELD => ssid = Some(value),
            PASSWORD_FIELD => password = value,
            _ => fields.push((key, value)),
        }
    }

    let ssid = ssid.ok_or(ProvisioningError::InvalidCredentials)?;
    validate_ssid(&ssid)?;
    validate_password(&password)?;
    Ok(PortalSubmission {
        ssid,
        password,
        fields,
    })
}
