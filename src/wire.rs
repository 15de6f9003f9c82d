//! HTTP/JSON wire contract with the relay endpoint.
//!
//! | Request                          | Body                                         |
//! |----------------------------------|----------------------------------------------|
//! | `POST {base}/{device}/data`      | `{"password": ..., "pressTimestamp": <f64>}` |
//! | `POST {base}/{device}/ping`      | `{"password": ...}`                          |
//!
//! Success is HTTP 200 for both.  The server de-duplicates repeated
//! `data` posts, which is what makes at-least-once delivery safe.

use serde::Serialize;

use crate::config::Credentials;
use crate::error::DeliveryError;
use crate::queue::PressEvent;

/// Headers sent with every request.
pub const JSON_HEADERS: &[(&str, &str)] = &[("Content-Type", "application/json")];

/// The only status treated as success.
pub const HTTP_OK: u16 = 200;

#[derive(Serialize)]
struct DataBody<'a> {
    password: &'a str,
    #[serde(rename = "pressTimestamp")]
    press_timestamp: f64,
}

#[derive(Serialize)]
struct PingBody<'a> {
    password: &'a str,
}

/// Pre-built request targets for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    data_url: String,
    ping_url: String,
}

impl Endpoints {
    pub fn new(creds: &Credentials) -> Self {
        Self {
            data_url: format!("{}/{}/data", creds.base_url, creds.device_name),
            ping_url: format!("{}/{}/ping", creds.base_url, creds.device_name),
        }
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn ping_url(&self) -> &str {
        &self.ping_url
    }
}

pub fn data_body(password: &str, event: &PressEvent) -> Result<Vec<u8>, DeliveryError> {
    serde_json::to_vec(&DataBody {
        password,
        press_timestamp: event.press_timestamp(),
    })
    .map_err(|_| DeliveryError::Encode)
}

pub fn ping_body(password: &str) -> Result<Vec<u8>, DeliveryError> {
    serde_json::to_vec(&PingBody { password }).map_err(|_| DeliveryError::Encode)
}
