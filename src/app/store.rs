//! Configuration store with deferred, lossy persistence.
//!
//! - [`ConfigStore::load`] never fails outward: a missing, unreadable or
//!   malformed file yields the default record.
//! - [`ConfigStore::set_save_flag`] only marks a save as pending.
//! - [`ConfigStore::handle_save`] is the flush point, called once per
//!   runtime-loop iteration. The pending flag is cleared *before* any I/O,
//!   so a failing flash write is attempted once per request and then
//!   dropped.

use core::fmt;

use log::{error, info, warn};

use super::ports::{StorageError, StoragePort};
use crate::config::{CONFIG_FILE, DeviceConfig, MAX_CONFIG_FILE_SIZE_BYTES};

/// Why a flush was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveError {
    /// Serialisation produced no bytes.
    Empty,
    /// Serialised record exceeds [`MAX_CONFIG_FILE_SIZE_BYTES`].
    TooLarge(usize),
    /// Serialiser rejected the record.
    Serialize,
    /// The file could not be created or written.
    Storage(StorageError),
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "serialised config is empty"),
            Self::TooLarge(n) => {
                write!(f, "serialised config is {n} bytes (max {MAX_CONFIG_FILE_SIZE_BYTES})")
            }
            Self::Serialize => write!(f, "could not serialise config"),
            Self::Storage(e) => write!(f, "could not write config file: {e}"),
        }
    }
}

/// Result of one [`ConfigStore::handle_save`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing was pending.
    Idle,
    Saved { bytes: usize },
    /// The attempt failed and will not be retried.
    Failed(SaveError),
}

pub struct ConfigStore<S: StoragePort> {
    storage: S,
    config: DeviceConfig,
    save_pending: bool,
    path: &'static str,
}

impl<S: StoragePort> ConfigStore<S> {
    /// Wrap `storage`. The record starts at its defaults until [`load`](Self::load).
    pub fn new(storage: S) -> Self {
        Self::with_path(storage, CONFIG_FILE)
    }

    pub fn with_path(storage: S, path: &'static str) -> Self {
        Self {
            storage,
            config: DeviceConfig::default(),
            save_pending: false,
            path,
        }
    }

    /// Replace the in-memory record with the persisted one, or with defaults
    /// when the file is missing, unreadable, oversized or malformed.
    pub fn load(&mut self) -> &DeviceConfig {
        if !self.storage.exists(self.path) {
            info!("No configuration file, using defaults");
            self.config = DeviceConfig::default();
            return &self.config;
        }

        // One byte of headroom detects files over the limit.
        let mut buf = [0u8; MAX_CONFIG_FILE_SIZE_BYTES + 1];
        self.config = match self.storage.read(self.path, &mut buf) {
            Ok(n) if n > MAX_CONFIG_FILE_SIZE_BYTES => {
                error!("Config file exceeds {} bytes, using defaults", MAX_CONFIG_FILE_SIZE_BYTES);
                DeviceConfig::default()
            }
            Ok(n) => DeviceConfig::from_json(&buf[..n]).unwrap_or_else(|e| {
                error!("Failed to deserialize configuration file: {}", e);
                DeviceConfig::default()
            }),
            Err(StorageError::NotFound) => {
                info!("No configuration file, using defaults");
                DeviceConfig::default()
            }
            Err(e) => {
                error!("Failed to read configuration file: {}", e);
                DeviceConfig::default()
            }
        };

        info!(
            "\n--------------------------\n\
             | The live configuration |\n\
             --------------------------\n\
             {}\n\
             --------------------------",
            self.config
        );
        &self.config
    }

    /// Mark the record for persistence on the next [`handle_save`](Self::handle_save).
    pub fn set_save_flag(&mut self) {
        self.save_pending = true;
    }

    pub fn is_save_pending(&self) -> bool {
        self.save_pending
    }

    /// Persist the record if a save is pending.
    pub fn handle_save(&mut self) -> SaveOutcome {
        if !self.save_pending {
            return SaveOutcome::Idle;
        }
        info!("Saving configuration to file...");
        // Cleared first: a failing medium gets one attempt per request.
        self.save_pending = false;

        match self.write_record() {
            Ok(bytes) => {
                info!("Configuration saved to file ({} bytes).", bytes);
                SaveOutcome::Saved { bytes }
            }
            Err(e) => {
                error!("Failed to save configuration: {}", e);
                SaveOutcome::Failed(e)
            }
        }
    }

    fn write_record(&mut self) -> Result<usize, SaveError> {
        if let Err(e) = self.storage.delete(self.path) {
            warn!("Could not remove old configuration file: {}", e);
        }

        let json = self.config.to_json().map_err(|_| SaveError::Serialize)?;
        if json.is_empty() {
            return Err(SaveError::Empty);
        }
        if json.len() > MAX_CONFIG_FILE_SIZE_BYTES {
            return Err(SaveError::TooLarge(json.len()));
        }
        self.storage
            .write(self.path, &json)
            .map_err(SaveError::Storage)?;
        Ok(json.len())
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut DeviceConfig {
        &mut self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}
