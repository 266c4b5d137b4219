//! End-to-end tests on the host adapter set: simulated WiFi portal, flash
//! filesystem, real loopback sockets for the web interface and OTA listener.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpStream};
use std::thread;
use std::time::Duration;

use esp_boilerplate::adapters::DevicePlatform;
use esp_boilerplate::adapters::flash_fs::FlashFs;
use esp_boilerplate::adapters::http::HttpListener;
use esp_boilerplate::adapters::mdns::MdnsAdapter;
use esp_boilerplate::adapters::wifi::{Credentials, WifiAdapter};
use esp_boilerplate::app::ports::{Adapters, StoragePort};
use esp_boilerplate::app::{Device, LoopControl, RestartReason, bootstrap};
use esp_boilerplate::capture::CaptureTee;
use esp_boilerplate::config::{CONFIG_FILE, RuntimeSettings};
use esp_boilerplate::identity::DeviceIdentity;
use esp_boilerplate::ota::OtaService;

fn settings() -> RuntimeSettings {
    RuntimeSettings {
        web_port: 0,
        ota_port: 0,
        ..RuntimeSettings::default()
    }
}

fn host_adapters(wifi: WifiAdapter) -> Adapters<DevicePlatform> {
    Adapters {
        storage: FlashFs::new("/spiffs"),
        wifi,
        name_service: MdnsAdapter::new(80),
        ota: OtaService::new(),
        http: HttpListener::new(),
    }
}

/// Issue one GET from a client thread while ticking the device.
fn get(device: &mut Device<DevicePlatform>, path: &str) -> (String, Option<LoopControl>) {
    let port = device.web().http().local_addr().unwrap().port();
    let request = format!("GET {path} HTTP/1.1\r\nHost: device\r\nConnection: close\r\n\r\n");
    let client = thread::spawn(move || {
        let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        stream.write_all(request.as_bytes()).unwrap();
        let mut reply = String::new();
        let _ = stream.read_to_string(&mut reply);
        reply
    });

    let mut last = None;
    for _ in 0..200 {
        let control = device.tick();
        if control != LoopControl::Continue {
            last = Some(control);
            break;
        }
        if client.is_finished() {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    (client.join().unwrap(), last)
}

#[test]
fn portal_boot_persists_password_and_serves_log() {
    let mut wifi = WifiAdapter::new(Duration::from_secs(180));
    wifi.sim_mut().portal_form = Some("s=HomeNet&p=password1&OTAPassword=xyz789".to_owned());

    let mut tee = CaptureTee::new(std::io::sink());
    let mut device = bootstrap(
        DeviceIdentity::default(),
        settings(),
        host_adapters(wifi),
        tee.reader(),
    )
    .unwrap();
    assert!(device.store().is_save_pending());

    tee.write_bytes(b"[boot] hello from the capture ring\n");
    let (reply, control) = get(&mut device, "/serialOut");
    assert_eq!(control, None);
    assert!(reply.starts_with("HTTP/1.1 200 OK"));
    assert!(reply.contains("Content-Type: text/plain"));
    assert!(reply.ends_with("[boot] hello from the capture ring\n"));

    // The first tick flushed the portal's save request.
    assert!(!device.store().is_save_pending());
    let mut buf = [0u8; 64];
    let n = device.store().storage().read(CONFIG_FILE, &mut buf).unwrap();
    assert_eq!(&buf[..n], br#"{"OTAPassword":"xyz789"}"#);
}

#[test]
fn home_page_and_not_found() {
    let mut wifi = WifiAdapter::new(Duration::from_secs(180));
    wifi.sim_mut().stored = Some(Credentials::new("HomeNet", "password1").unwrap());

    let tee = CaptureTee::new(std::io::sink());
    let mut device = bootstrap(
        DeviceIdentity::default(),
        settings(),
        host_adapters(wifi),
        tee.reader(),
    )
    .unwrap();
    assert!(!device.store().is_save_pending());

    let (home, _) = get(&mut device, "/");
    assert!(home.starts_with("HTTP/1.1 200 OK"));
    assert!(home.contains(r#"<a href="/serialOut">"#));

    let (missing, _) = get(&mut device, "/nope");
    assert!(missing.starts_with("HTTP/1.1 404"));
}

#[test]
fn reset_route_erases_credentials() {
    let mut wifi = WifiAdapter::new(Duration::from_secs(180));
    wifi.sim_mut().stored = Some(Credentials::new("HomeNet", "password1").unwrap());

    let tee = CaptureTee::new(std::io::sink());
    let mut device = bootstrap(
        DeviceIdentity::default(),
        settings(),
        host_adapters(wifi),
        tee.reader(),
    )
    .unwrap();

    let (reply, control) = get(&mut device, "/resetresetreset");
    assert_eq!(control, Some(LoopControl::Restart(RestartReason::FactoryReset)));
    // Never answered: the connection is dropped with the restart.
    assert!(reply.is_empty());
    assert!(device.wifi().sim().stored.is_none());
}

#[test]
fn portal_timeout_aborts_boot() {
    let wifi = WifiAdapter::new(Duration::from_secs(180));
    let tee = CaptureTee::new(std::io::sink());
    let result = bootstrap(
        DeviceIdentity::default(),
        settings(),
        host_adapters(wifi),
        tee.reader(),
    );
    assert!(result.is_err());
}
