//! NVS (Non-Volatile Storage) adapter.
//!
//! Holds the provisioned [`Credentials`] and an optional
//! [`DeviceConfig`] override, both as JSON strings in the `whenpress`
//! namespace.  Implements [`CredentialStore`].
//!
//! | Key      | Contents                                        |
//! |----------|-------------------------------------------------|
//! | `creds`  | `{"device_name","password","base_url"}`         |
//! | `config` | partial `DeviceConfig`, missing fields default  |
//!
//! The event queue is never persisted.

use log::{info, warn};

use crate::app::ports::CredentialStore;
use crate::config::{Credentials, DeviceConfig};
use crate::error::Error;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

pub const NAMESPACE: &str = "whenpress";
pub const CREDENTIALS_KEY: &str = "creds";
pub const CONFIG_KEY: &str = "config";

const MAX_VALUE_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(target_os = "espidf")]
    nvs: EspNvs<NvsDefault>,
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, String>,
}

impl NvsAdapter {
    /// Open the namespace read/write on the default partition.
    #[cfg(target_os = "espidf")]
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, esp_idf_svc::sys::EspError> {
        let nvs = EspNvs::new(partition, NAMESPACE, true)?;
        info!("NvsAdapter: namespace '{}' open", NAMESPACE);
        Ok(Self { nvs })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        info!("NvsAdapter: simulation backend");
        Self {
            store: HashMap::new(),
        }
    }

    #[cfg(target_os = "espidf")]
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let mut buf = [0u8; MAX_VALUE_SIZE];
        self.nvs
            .get_str(key, &mut buf)
            .map(|v| v.map(str::to_owned))
            .map_err(|e| {
                warn!("NvsAdapter: read '{}' failed: {}", key, e);
                Error::Config("NVS read failed")
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.store.get(key).cloned())
    }

    /// Store a value under `key` in the namespace.
    #[cfg(target_os = "espidf")]
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        if value.len() >= MAX_VALUE_SIZE {
            return Err(Error::Config("NVS value too large"));
        }
        self.nvs.set_str(key, value).map_err(|e| {
            warn!("NvsAdapter: write '{}' failed: {}", key, e);
            Error::Config("NVS write failed")
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        if value.len() >= MAX_VALUE_SIZE {
            return Err(Error::Config("NVS value too large"));
        }
        self.store.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    /// Stored config override, or defaults if absent or invalid.
    pub fn load_config(&self) -> DeviceConfig {
        match self.get(CONFIG_KEY) {
            Ok(Some(json)) => match DeviceConfig::from_json(&json) {
                Ok(config) => {
                    info!("NvsAdapter: loaded config override");
                    config
                }
                Err(e) => {
                    warn!("NvsAdapter: stored config rejected ({}), using defaults", e);
                    DeviceConfig::default()
                }
            },
            Ok(None) => DeviceConfig::default(),
            Err(e) => {
                warn!("NvsAdapter: {}, using default config", e);
                DeviceConfig::default()
            }
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for NvsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for NvsAdapter {
    fn load(&self) -> Result<Credentials, Error> {
        let json = self
            .get(CREDENTIALS_KEY)?
            .ok_or(Error::Config("no credentials provisioned in NVS"))?;
        Credentials::from_json(&json)
    }
}
