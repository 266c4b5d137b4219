//! Flash filesystem adapter.
//!
//! Implements [`StoragePort`] over a SPIFFS partition mounted through the
//! ESP-IDF VFS layer, after which plain `std::fs` calls work on paths under
//! the mount point. The simulation backend keeps files in memory.
//!
//! A failed mount is reported but not fatal: reads then miss and writes
//! fail, which the configuration store already treats as recoverable.

use log::info;

use crate::app::ports::{StorageError, StoragePort};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use std::io::ErrorKind;

/// Open file handles the VFS may hold at once.
#[cfg(target_os = "espidf")]
const MAX_OPEN_FILES: usize = 4;

pub struct FlashFs {
    mount_point: &'static str,
    mounted: bool,
    #[cfg(not(target_os = "espidf"))]
    files: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl FlashFs {
    pub fn new(mount_point: &'static str) -> Self {
        Self {
            mount_point,
            mounted: false,
            #[cfg(not(target_os = "espidf"))]
            files: std::cell::RefCell::new(HashMap::new()),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn full_path(&self, path: &str) -> String {
        format!("{}/{}", self.mount_point, path.trim_start_matches('/'))
    }

    fn check_mounted(&self) -> Result<(), StorageError> {
        if self.mounted {
            Ok(())
        } else {
            Err(StorageError::NotMounted)
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_mount(&mut self) -> Result<(), StorageError> {
        use esp_idf_svc::sys::*;

        let base_path =
            std::ffi::CString::new(self.mount_point).map_err(|_| StorageError::IoError)?;
        let conf = esp_vfs_spiffs_conf_t {
            base_path: base_path.as_ptr(),
            partition_label: core::ptr::null(),
            max_files: MAX_OPEN_FILES,
            format_if_mount_failed: true,
        };
        // SAFETY: `conf` and `base_path` are valid for the duration of the
        // call; the VFS copies the base path.
        let ret = unsafe { esp_vfs_spiffs_register(&conf) };
        if ret != ESP_OK {
            log::warn!("FlashFs: esp_vfs_spiffs_register failed ({})", ret);
            return Err(StorageError::IoError);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_mount(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
fn map_io(e: &std::io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound,
        ErrorKind::StorageFull => StorageError::Full,
        _ => StorageError::IoError,
    }
}

impl StoragePort for FlashFs {
    fn mount(&mut self) -> Result<(), StorageError> {
        if self.mounted {
            return Ok(());
        }
        self.platform_mount()?;
        self.mounted = true;
        info!("FlashFs: mounted at {}", self.mount_point);
        Ok(())
    }

    fn read(&self, path: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.check_mounted()?;

        #[cfg(not(target_os = "espidf"))]
        {
            let files = self.files.borrow();
            let data = files.get(&self.full_path(path)).ok_or(StorageError::NotFound)?;
            let len = data.len().min(buf.len());
            buf[..len].copy_from_slice(&data[..len]);
            Ok(len)
        }

        #[cfg(target_os = "espidf")]
        {
            use std::io::Read;
            let file = std::fs::File::open(self.full_path(path)).map_err(|e| map_io(&e))?;
            let mut total = 0;
            let mut reader = file.take(buf.len() as u64);
            loop {
                match reader.read(&mut buf[total..]) {
                    Ok(0) => break,
                    Ok(n) => total += n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => {}
                    Err(e) => return Err(map_io(&e)),
                }
            }
            Ok(total)
        }
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        self.check_mounted()?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.files
                .borrow_mut()
                .insert(self.full_path(path), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            std::fs::write(self.full_path(path), data).map_err(|e| {
                log::warn!("FlashFs: write {} failed: {}", path, e);
                map_io(&e)
            })
        }
    }

    fn delete(&mut self, path: &str) -> Result<(), StorageError> {
        self.check_mounted()?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.files.borrow_mut().remove(&self.full_path(path));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            match std::fs::remove_file(self.full_path(path)) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(map_io(&e)),
            }
        }
    }

    fn exists(&self, path: &str) -> bool {
        if !self.mounted {
            return false;
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.files.borrow().contains_key(&self.full_path(path))
        }

        #[cfg(target_os = "espidf")]
        {
            std::path::Path::new(&self.full_path(path)).exists()
        }
    }
}
