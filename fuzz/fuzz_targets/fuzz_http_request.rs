//! Fuzz target: diagnostic web request routing
//!
//! Drives arbitrary request targets through path extraction and the router:
//! - No panics on any input
//! - The extracted path is a prefix of the target with no query string
//! - Routing is total
//!
//! cargo fuzz run fuzz_http_request

#![no_main]

use libfuzzer_sys::fuzz_target;

use esp_boilerplate::adapters::http::request_path;
use esp_boilerplate::app::web::route;

fuzz_target!(|data: &[u8]| {
    let Ok(target) = core::str::from_utf8(data) else {
        return;
    };
    let path = request_path(target);
    assert!(target.starts_with(path));
    assert!(!path.contains('?'));
    let _ = route(path);
});
