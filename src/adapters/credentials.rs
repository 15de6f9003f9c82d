//! Build-time credential store.
//!
//! Reads `WHENPRESS_DEVICE_NAME`, `WHENPRESS_PASSWORD` and
//! `WHENPRESS_BASE_URL` from the environment at compile time, so a
//! development image can be flashed without provisioning NVS.

use crate::app::ports::CredentialStore;
use crate::config::Credentials;
use crate::error::Error;

#[derive(Debug, Clone, Copy)]
pub struct BuildTimeCredentials {
    device_name: Option<&'static str>,
    password: Option<&'static str>,
    base_url: Option<&'static str>,
}

impl BuildTimeCredentials {
    pub const fn new() -> Self {
        Self {
            device_name: option_env!("WHENPRESS_DEVICE_NAME"),
            password: option_env!("WHENPRESS_PASSWORD"),
            base_url: option_env!("WHENPRESS_BASE_URL"),
        }
    }
}

impl Default for BuildTimeCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for BuildTimeCredentials {
    fn load(&self) -> Result<Credentials, Error> {
        match (self.device_name, self.password, self.base_url) {
            (Some(name), Some(password), Some(url)) => Credentials::new(name, password, url),
            _ => Err(Error::Config("WHENPRESS_* credentials were not set at build time")),
        }
    }
}
