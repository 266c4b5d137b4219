//! OTA authorisation: challenge-response with HMAC-SHA256.
//!
//! 1. Device sends a random 32-byte nonce
//! 2. Client replies with `HMAC-SHA256(password, nonce)`
//! 3. Device verifies the tag in constant time
//!
//! An empty password disables the challenge entirely.

use log::warn;

pub type Nonce = [u8; 32];
pub type Tag = [u8; 32];

/// Password captured when OTA is armed.
#[derive(Clone)]
pub struct OtaCredentials {
    password: String,
}

impl OtaCredentials {
    pub fn new(password: &str) -> Self {
        Self {
            password: password.to_owned(),
        }
    }

    pub fn requires_auth(&self) -> bool {
        !self.password.is_empty()
    }

    /// Check `tag` against the password for `nonce`.
    pub fn verify(&self, nonce: &Nonce, tag: &[u8]) -> bool {
        let Ok(tag) = <&Tag>::try_from(tag) else {
            warn!("ota auth: tag length invalid ({})", tag.len());
            return false;
        };
        hmac_sha256::HMAC::verify(nonce, self.password.as_bytes(), tag)
    }
}

impl core::fmt::Debug for OtaCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OtaCredentials")
            .field("requires_auth", &self.requires_auth())
            .finish_non_exhaustive()
    }
}

/// Client side of the handshake.
pub fn compute_tag(password: &[u8], nonce: &Nonce) -> Tag {
    hmac_sha256::HMAC::mac(nonce, password)
}

// ── Platform-specific nonce generation ───────────────────────

/// Fill a nonce from the hardware RNG.
#[cfg(target_os = "espidf")]
pub fn new_nonce() -> Nonce {
    let mut buf = [0u8; 32];
    // SAFETY: esp_fill_random writes exactly `len` bytes into a buffer we
    // exclusively own.
    unsafe {
        esp_idf_sys::esp_fill_random(buf.as_mut_ptr().cast(), buf.len());
    }
    buf
}

/// Simulation stub: `RandomState` gives non-cryptographic entropy.
#[cfg(not(target_os = "espidf"))]
pub fn new_nonce() -> Nonce {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut buf = [0u8; 32];
    for chunk in buf.chunks_mut(8) {
        let val = RandomState::new().build_hasher().finish().to_le_bytes();
        chunk.copy_from_slice(&val[..chunk.len()]);
    }
    buf
}

// ── Hex helpers for the line protocol ────────────────────────

pub fn to_hex(bytes: &[u8]) -> String {
    use core::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Decode exactly 32 bytes of hex (64 digits, either case).
pub fn parse_hex32(s: &str) -> Option<[u8; 32]> {
    let s = s.as_bytes();
    if s.len() != 64 {
        return None;
    }
    let mut out = [0u8; 32];
    for (byte, pair) in out.iter_mut().zip(s.chunks_exact(2)) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        *byte = ((hi << 4) | lo) as u8;
    }
    Some(out)
}
