//! Client side of the OTA session.
//!
//! Used by the `ota-upload` host tool. Runs the handshake from
//! [`service`](super::service), streams the image and waits for `DONE`.

use core::fmt;
use std::io::{BufRead, Read, Write};

use super::auth;

/// Bytes written between progress callbacks.
pub const UPLOAD_CHUNK_LEN: usize = 4096;

/// Longest device line accepted by the client.
const MAX_REPLY_LEN: u64 = 160;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The connection failed or closed early.
    Io,
    /// The device sent something outside the session protocol.
    Protocol,
    /// The device rejected the password.
    Unauthorised,
    /// The image does not fit the `BEGIN` size field.
    ImageTooLarge,
    /// The device reported `ERR <reason>`.
    Device(String),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "connection to the device failed"),
            Self::Protocol => write!(f, "unexpected reply from the device"),
            Self::Unauthorised => write!(f, "OTA password rejected"),
            Self::ImageTooLarge => write!(f, "image larger than 4 GiB"),
            Self::Device(reason) => write!(f, "device error: {reason}"),
        }
    }
}

impl std::error::Error for UploadError {}

fn read_reply<R: BufRead>(reader: &mut R) -> Result<String, UploadError> {
    let mut line = String::new();
    reader
        .by_ref()
        .take(MAX_REPLY_LEN)
        .read_line(&mut line)
        .map_err(|_| UploadError::Io)?;
    if !line.ends_with('\n') {
        return Err(UploadError::Io);
    }
    Ok(line.trim_end().to_owned())
}

fn refusal(line: &str) -> UploadError {
    match line.strip_prefix("ERR ") {
        Some("auth") => UploadError::Unauthorised,
        Some(reason) => UploadError::Device(reason.to_owned()),
        None => UploadError::Protocol,
    }
}

fn expect_line<R: BufRead>(reader: &mut R, expected: &str) -> Result<(), UploadError> {
    let line = read_reply(reader)?;
    if line == expected {
        Ok(())
    } else {
        Err(refusal(&line))
    }
}

/// Push `image` through one session. `progress` receives the running byte
/// count after every chunk.
pub fn upload<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    password: &str,
    image: &[u8],
    mut progress: impl FnMut(usize),
) -> Result<(), UploadError> {
    let size = u32::try_from(image.len()).map_err(|_| UploadError::ImageTooLarge)?;

    let greeting = read_reply(reader)?;
    if let Some(nonce_hex) = greeting.strip_prefix("AUTH ") {
        let nonce = auth::parse_hex32(nonce_hex).ok_or(UploadError::Protocol)?;
        let tag = auth::compute_tag(password.as_bytes(), &nonce);
        writeln!(writer, "{}", auth::to_hex(&tag)).map_err(|_| UploadError::Io)?;
        expect_line(reader, "OK")?;
    } else if greeting != "OK" {
        return Err(refusal(&greeting));
    }

    let sha256 = hmac_sha256::Hash::hash(image);
    writeln!(writer, "BEGIN {} {}", size, auth::to_hex(&sha256)).map_err(|_| UploadError::Io)?;
    expect_line(reader, "OK")?;

    let mut sent = 0;
    for chunk in image.chunks(UPLOAD_CHUNK_LEN) {
        writer.write_all(chunk).map_err(|_| UploadError::Io)?;
        sent += chunk.len();
        progress(sent);
    }
    writer.flush().map_err(|_| UploadError::Io)?;

    expect_line(reader, "DONE")
}
