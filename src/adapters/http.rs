//! HTTP client adapter.
//!
//! Implements [`HttpClient`] for the relay endpoint.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspHttpConnection` with the ESP-IDF
//!   certificate bundle for HTTPS and a bounded request timeout.
//! - **all other targets**: simulation stub that logs the request and
//!   answers with a fixed status.

use log::debug;

use crate::app::ports::{HttpClient, HttpResponse};
use crate::error::DeliveryError;

/// Upper bound on one request, connect through last body byte.
pub const REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Response bodies beyond this are truncated in logs.
const MAX_BODY_BYTES: usize = 256;

// ───────────────────────────────────────────────────────────────
// ESP-IDF client
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct EspHttpClient {
    conn: esp_idf_svc::http::client::EspHttpConnection,
}

#[cfg(target_os = "espidf")]
impl EspHttpClient {
    pub fn new() -> Result<Self, esp_idf_svc::sys::EspError> {
        use esp_idf_svc::http::client::{Configuration, EspHttpConnection};

        let conn = EspHttpConnection::new(&Configuration {
            timeout: Some(core::time::Duration::from_millis(REQUEST_TIMEOUT_MS)),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        })?;
        Ok(Self { conn })
    }

    fn exchange(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, esp_idf_svc::sys::EspError> {
        use esp_idf_svc::http::Method;

        let length = body.len().to_string();
        let mut all: heapless::Vec<(&str, &str), 8> = heapless::Vec::new();
        for header in headers.iter().copied().chain([("Content-Length", length.as_str())]) {
            let _ = all.push(header);
        }

        self.conn.initiate_request(Method::Post, url, &all)?;
        let mut written = 0;
        while written < body.len() {
            written += self.conn.write(&body[written..])?;
        }
        self.conn.initiate_response()?;

        let status = self.conn.status();
        let reason = self.conn.status_message().unwrap_or_default().to_string();
        let mut buf = [0u8; MAX_BODY_BYTES];
        let mut filled = 0;
        while filled < buf.len() {
            match self.conn.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        Ok(HttpResponse {
            status,
            reason,
            body: String::from_utf8_lossy(&buf[..filled]).into_owned(),
        })
    }
}

#[cfg(target_os = "espidf")]
impl HttpClient for EspHttpClient {
    fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, DeliveryError> {
        debug!("POST {} ({} bytes)", url, body.len());
        self.exchange(url, headers, body).map_err(|e| {
            log::warn!("HTTP transport error: {}", e);
            DeliveryError::Transport
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

/// Logs requests and answers every one with `status`.
#[cfg(not(target_os = "espidf"))]
pub struct SimHttpClient {
    status: u16,
    requests: u32,
}

#[cfg(not(target_os = "espidf"))]
impl SimHttpClient {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            requests: 0,
        }
    }

    pub fn requests(&self) -> u32 {
        self.requests
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for SimHttpClient {
    fn default() -> Self {
        Self::new(crate::wire::HTTP_OK)
    }
}

#[cfg(not(target_os = "espidf"))]
impl HttpClient for SimHttpClient {
    fn post(
        &mut self,
        url: &str,
        _headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, DeliveryError> {
        self.requests += 1;
        debug!(
            "SIM POST {} {}",
            url,
            String::from_utf8_lossy(&body[..body.len().min(MAX_BODY_BYTES)])
        );
        Ok(HttpResponse::new(self.status))
    }
}
