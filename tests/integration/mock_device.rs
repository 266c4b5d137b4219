//! Mock adapters for integration tests.
//!
//! Every adapter appends to one shared call log so tests can assert on the
//! order in which bootstrap and the runtime loop touch the outside world.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use esp_boilerplate::app::{BootError, Device, bootstrap};
use esp_boilerplate::app::events::{self, ProvisioningEvent, ProvisioningSender};
use esp_boilerplate::app::ports::{
    Adapters, ConnectivityPort, CustomParameter, HttpError, HttpMethod, HttpPort, HttpRequest,
    HttpResponse, NameServiceError, NameServicePort, OtaPort, Platform, ProvisioningError,
    ProvisioningPort, StorageError, StoragePort,
};
use esp_boilerplate::capture::{CaptureReader, CaptureTee};
use esp_boilerplate::config::{CONFIG_FILE, RuntimeSettings};
use esp_boilerplate::identity::DeviceIdentity;
use esp_boilerplate::ota::{OtaError, OtaPoll};

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    WifiHostname(String),
    NameServiceHostname(String),
    Mount,
    Exists(String),
    Read(String),
    Write(String),
    Delete(String),
    StationMode,
    AutoConnect(String),
    ResetSettings,
    WifiPoll,
    NameServiceBegin,
    OtaArm { hostname: String, port: u16, password: String },
    OtaHandle,
    HttpBegin(u16),
    HttpPoll,
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

fn record(log: &CallLog, call: Call) {
    log.borrow_mut().push(call);
}

// ── Storage ───────────────────────────────────────────────────

pub struct MockStorage {
    log: CallLog,
    pub files: HashMap<String, Vec<u8>>,
    pub fail_mount: bool,
    pub fail_write: bool,
    mounted: bool,
}

#[allow(dead_code)]
impl MockStorage {
    pub fn config_file(&self) -> Option<&[u8]> {
        self.files.get(CONFIG_FILE).map(Vec::as_slice)
    }

    pub fn writes(&self) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::Write(_)))
            .count()
    }
}

impl StoragePort for MockStorage {
    fn mount(&mut self) -> Result<(), StorageError> {
        record(&self.log, Call::Mount);
        if self.fail_mount {
            return Err(StorageError::IoError);
        }
        self.mounted = true;
        Ok(())
    }

    fn read(&self, path: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        record(&self.log, Call::Read(path.to_owned()));
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        let data = self.files.get(path).ok_or(StorageError::NotFound)?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        record(&self.log, Call::Write(path.to_owned()));
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        if self.fail_write {
            return Err(StorageError::Full);
        }
        self.files.insert(path.to_owned(), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<(), StorageError> {
        record(&self.log, Call::Delete(path.to_owned()));
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        self.files.remove(path);
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        record(&self.log, Call::Exists(path.to_owned()));
        self.mounted && self.files.contains_key(path)
    }
}

// ── WiFi / portal ─────────────────────────────────────────────

pub struct MockWifi {
    log: CallLog,
    /// Parameter values a portal user submits; `None` means stored
    /// credentials connect without a portal.
    pub portal_submission: Option<Vec<(&'static str, String)>>,
    pub fail_connect: Option<ProvisioningError>,
    pub connected: bool,
    pub hostname: String,
}

impl ProvisioningPort for MockWifi {
    fn set_hostname(&mut self, hostname: &str) {
        record(&self.log, Call::WifiHostname(hostname.to_owned()));
        self.hostname = hostname.to_owned();
    }

    fn set_station_mode(&mut self) -> Result<(), ProvisioningError> {
        record(&self.log, Call::StationMode);
        Ok(())
    }

    fn auto_connect(
        &mut self,
        ap_name: &str,
        params: &mut [CustomParameter],
        sender: ProvisioningSender<'_>,
    ) -> Result<(), ProvisioningError> {
        record(&self.log, Call::AutoConnect(ap_name.to_owned()));
        if let Some(submission) = self.portal_submission.take() {
            for (id, value) in &submission {
                if let Some(param) = params.iter_mut().find(|p| p.id() == *id) {
                    param.set_value(value);
                }
            }
            events::notify(&sender, ProvisioningEvent::SaveRequested);
        }
        if let Some(e) = self.fail_connect {
            return Err(e);
        }
        self.connected = true;
        Ok(())
    }

    fn reset_settings(&mut self) {
        record(&self.log, Call::ResetSettings);
        self.connected = false;
    }
}

impl ConnectivityPort for MockWifi {
    fn poll(&mut self) {
        record(&self.log, Call::WifiPoll);
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ── Name service ──────────────────────────────────────────────

pub struct MockNameService {
    log: CallLog,
    pub fail: bool,
}

impl NameServicePort for MockNameService {
    fn set_hostname(&mut self, hostname: &str) {
        record(&self.log, Call::NameServiceHostname(hostname.to_owned()));
    }

    fn begin(&mut self) -> Result<(), NameServiceError> {
        record(&self.log, Call::NameServiceBegin);
        if self.fail {
            Err(NameServiceError::InitFailed)
        } else {
            Ok(())
        }
    }
}

// ── OTA ───────────────────────────────────────────────────────

pub struct MockOta {
    log: CallLog,
    pub fail_arm: bool,
    /// Results handed out by `handle`, then `Idle` forever.
    pub polls: VecDeque<Result<OtaPoll, OtaError>>,
}

impl OtaPort for MockOta {
    fn arm(&mut self, hostname: &str, port: u16, password: &str) -> Result<(), OtaError> {
        record(
            &self.log,
            Call::OtaArm {
                hostname: hostname.to_owned(),
                port,
                password: password.to_owned(),
            },
        );
        if self.fail_arm { Err(OtaError::Bind) } else { Ok(()) }
    }

    fn handle(&mut self) -> Result<OtaPoll, OtaError> {
        record(&self.log, Call::OtaHandle);
        self.polls.pop_front().unwrap_or(Ok(OtaPoll::Idle))
    }
}

// ── HTTP ──────────────────────────────────────────────────────

pub struct MockHttp {
    log: CallLog,
    pub fail_bind: bool,
    pub pending: VecDeque<String>,
    pub sent: Vec<(String, HttpResponse)>,
    in_flight: Option<String>,
}

#[allow(dead_code)]
impl MockHttp {
    pub fn request(&mut self, path: &str) {
        self.pending.push_back(path.to_owned());
    }
}

impl HttpPort for MockHttp {
    fn begin(&mut self, port: u16) -> Result<(), HttpError> {
        record(&self.log, Call::HttpBegin(port));
        if self.fail_bind { Err(HttpError::Bind) } else { Ok(()) }
    }

    fn poll_request(&mut self) -> Option<HttpRequest> {
        record(&self.log, Call::HttpPoll);
        let path = self.pending.pop_front()?;
        self.in_flight = Some(path.clone());
        Some(HttpRequest {
            method: HttpMethod::Get,
            path,
        })
    }

    fn respond(&mut self, response: &HttpResponse) -> Result<(), HttpError> {
        let path = self.in_flight.take().ok_or(HttpError::NoRequest)?;
        self.sent.push((path, response.clone()));
        Ok(())
    }
}

// ── Platform bundle ───────────────────────────────────────────

pub struct MockPlatform;

impl Platform for MockPlatform {
    type Storage = MockStorage;
    type Wifi = MockWifi;
    type NameService = MockNameService;
    type Ota = MockOta;
    type Http = MockHttp;
}

/// A fresh adapter set sharing one call log, plus a capture tee whose
/// reader is handed to the web interface.
pub struct Rig {
    pub log: CallLog,
    pub adapters: Adapters<MockPlatform>,
    pub tee: CaptureTee<std::io::Sink>,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        let log: CallLog = Rc::new(RefCell::new(Vec::new()));
        let adapters = Adapters {
            storage: MockStorage {
                log: Rc::clone(&log),
                files: HashMap::new(),
                fail_mount: false,
                fail_write: false,
                mounted: false,
            },
            wifi: MockWifi {
                log: Rc::clone(&log),
                portal_submission: None,
                fail_connect: None,
                connected: false,
                hostname: String::new(),
            },
            name_service: MockNameService {
                log: Rc::clone(&log),
                fail: false,
            },
            ota: MockOta {
                log: Rc::clone(&log),
                fail_arm: false,
                polls: VecDeque::new(),
            },
            http: MockHttp {
                log: Rc::clone(&log),
                fail_bind: false,
                pending: VecDeque::new(),
                sent: Vec::new(),
                in_flight: None,
            },
        };
        Self {
            log,
            adapters,
            tee: CaptureTee::new(std::io::sink()),
        }
    }

    /// Seed the persisted configuration file.
    pub fn with_config_file(mut self, contents: &str) -> Self {
        self.adapters
            .storage
            .files
            .insert(CONFIG_FILE.to_owned(), contents.as_bytes().to_vec());
        self
    }

    /// Make the portal run and submit `OTAPassword = password`.
    pub fn with_portal_password(mut self, password: &str) -> Self {
        self.adapters.wifi.portal_submission = Some(vec![("OTAPassword", password.to_owned())]);
        self
    }

    pub fn boot(self) -> Booted {
        self.boot_with(RuntimeSettings::default())
    }

    pub fn boot_with(self, settings: RuntimeSettings) -> Booted {
        let reader: CaptureReader = self.tee.reader();
        let result = bootstrap(DeviceIdentity::default(), settings, self.adapters, reader);
        Booted {
            log: self.log,
            tee: self.tee,
            result,
        }
    }
}

/// Outcome of [`Rig::boot`].
pub struct Booted {
    pub log: CallLog,
    pub tee: CaptureTee<std::io::Sink>,
    pub result: Result<Device<MockPlatform>, BootError>,
}

#[allow(dead_code)]
impl Booted {
    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn device(&mut self) -> &mut Device<MockPlatform> {
        self.result.as_mut().expect("bootstrap should succeed")
    }

    pub fn error(&self) -> &BootError {
        self.result.as_ref().err().expect("bootstrap should fail")
    }
}
