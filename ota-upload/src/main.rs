//! Host-side uploader for the device's OTA listener.
//!
//! ```text
//! ota-upload target/xtensa-esp32-espidf/release/esp-boilerplate.bin
//! ota-upload firmware.bin --host 192.168.1.40 --password xyz789
//! ```

use std::fs;
use std::io::BufReader;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use esp_boilerplate::config::RuntimeSettings;
use esp_boilerplate::identity::HOSTNAME;
use esp_boilerplate::ota::client::upload;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Covers image verification and the boot-partition switch after the
/// last byte.
const REPLY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "ota-upload")]
#[command(about = "Upload firmware to an esp-boilerplate device", long_about = None)]
struct Cli {
    /// Firmware image to upload
    firmware: PathBuf,

    /// Device address [default: <hostname>.local]
    #[arg(long)]
    host: Option<String>,

    /// OTA port [default: the firmware's OTA port]
    #[arg(short, long)]
    port: Option<u16>,

    /// OTA password set on the provisioning portal
    #[arg(long, env = "OTA_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let host = cli.host.unwrap_or_else(|| format!("{HOSTNAME}.local"));
    let port = cli.port.unwrap_or(RuntimeSettings::default().ota_port);

    let image = fs::read(&cli.firmware)
        .with_context(|| format!("reading {}", cli.firmware.display()))?;
    if image.is_empty() {
        bail!("{} is empty", cli.firmware.display());
    }

    let addr = (host.as_str(), port)
        .to_socket_addrs()
        .with_context(|| format!("resolving {host}"))?
        .next()
        .with_context(|| format!("{host} has no address"))?;

    println!("Uploading {} ({} bytes) to {host} ({addr})", cli.firmware.display(), image.len());
    let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
        .with_context(|| format!("connecting to {addr}"))?;
    stream.set_read_timeout(Some(REPLY_TIMEOUT))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    let pb = ProgressBar::new(image.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("   {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );
    let result = upload(&mut reader, &mut writer, &cli.password, &image, |sent| {
        pb.set_position(sent as u64);
    });
    pb.finish_and_clear();
    result.context("upload failed")?;

    println!("Update applied. {host} is restarting.");
    Ok(())
}
