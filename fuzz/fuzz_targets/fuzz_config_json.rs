//! Fuzz target: config and credential JSON parsing
//!
//! Feeds arbitrary bytes to `DeviceConfig::from_json` and
//! `Credentials::from_json` and verifies:
//! - No panics under arbitrary input
//! - Anything accepted also passes `validate()`
//! - Accepted base URLs never end in `/`
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use libfuzzer_sys::fuzz_target;
use whenpress::config::{Credentials, DeviceConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok(config) = DeviceConfig::from_json(text) {
        assert!(config.validate().is_ok());
        assert!(config.ping_period_ms() >= 10_000);
    }

    if let Ok(creds) = Credentials::from_json(text) {
        assert!(creds.validate().is_ok());
        assert!(!creds.base_url.ends_with('/'));
    }
});
