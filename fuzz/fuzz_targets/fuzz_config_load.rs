//! Fuzz target: configuration file loading
//!
//! Feeds arbitrary bytes through `ConfigStore::load` as the on-flash
//! `config.json` and checks:
//! - No panics on malformed, truncated or oversized files
//! - The loaded password always respects its length bound
//! - A loaded record always serialises back within the file size limit
//!
//! cargo fuzz run fuzz_config_load

#![no_main]

use libfuzzer_sys::fuzz_target;

use esp_boilerplate::adapters::flash_fs::FlashFs;
use esp_boilerplate::app::ports::StoragePort;
use esp_boilerplate::app::store::ConfigStore;
use esp_boilerplate::config::{CONFIG_FILE, MAX_CONFIG_FILE_SIZE_BYTES, MAX_OTA_PASSWORD_CHARS};

fuzz_target!(|data: &[u8]| {
    let mut fs = FlashFs::new("/spiffs");
    if fs.mount().is_err() || fs.write(CONFIG_FILE, data).is_err() {
        return;
    }

    let mut store = ConfigStore::new(fs);
    let config = store.load().clone();
    assert!(config.ota_password.chars().count() <= MAX_OTA_PASSWORD_CHARS);

    let json = config.to_json().expect("loaded config must serialise");
    assert!(json.len() <= MAX_CONFIG_FILE_SIZE_BYTES);
});
