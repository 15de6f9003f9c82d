//! System configuration parameters
//!
//! All tunable parameters for the WhenPress device, plus the credentials
//! that identify it to the relay endpoint.  Both are loaded once at
//! startup and never change afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    // --- Pacing ---
    /// Sleep between two Running iterations (milliseconds)
    pub loop_interval_ms: u32,

    // --- Startup gates ---
    /// Retry interval while waiting for network connectivity (milliseconds)
    pub connectivity_retry_ms: u32,
    /// Retry interval while waiting for network time (milliseconds)
    pub clock_retry_ms: u32,
    /// Host (name or address) the connectivity probe connects to
    pub probe_host: heapless::String<64>,
    /// TCP port the connectivity probe connects to
    pub probe_port: u16,
    /// Connect timeout for the connectivity probe (milliseconds)
    pub probe_timeout_ms: u32,

    // --- Peripheral ---
    /// `begin()` attempts before the peripheral is declared down
    pub peripheral_init_attempts: u32,
    /// Delay between `begin()` attempts during init (milliseconds)
    pub peripheral_init_retry_ms: u32,
    /// Consecutive failed polls before entering Degraded
    pub max_consecutive_peripheral_errors: u32,
    /// Slow retry cadence while Degraded (milliseconds)
    pub degraded_retry_ms: u32,

    // --- Clock ---
    /// Period between re-anchoring the tick counter (seconds)
    pub reanchor_interval_secs: u32,
    /// Largest accepted half-width of the anchor sample bracket (milliseconds)
    pub max_anchor_skew_ms: u32,

    // --- Delivery ---
    /// Liveness ping period (seconds)
    pub ping_period_secs: u32,
    /// 4xx rejections of one event before it is dead-lettered
    pub max_rejections: u32,
    /// A successful event delivery also counts as a liveness ping
    pub ping_suppressed_by_delivery: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let mut probe_host = heapless::String::new();
        let _ = probe_host.push_str("8.8.8.8");

        Self {
            loop_interval_ms: 100,

            connectivity_retry_ms: 5_000,
            clock_retry_ms: 5_000,
            probe_host,
            probe_port: 53,
            probe_timeout_ms: 3_000,

            peripheral_init_attempts: 10,
            peripheral_init_retry_ms: 1_000,
            max_consecutive_peripheral_errors: 20,
            degraded_retry_ms: 30_000,

            reanchor_interval_secs: 6 * 3600,
            max_anchor_skew_ms: 50,

            ping_period_secs: 300,
            max_rejections: 5,
            ping_suppressed_by_delivery: false,
        }
    }
}

/// Longer anchor ages let the peripheral crystal drift visibly from wall time.
const MAX_REANCHOR_INTERVAL_SECS: u32 = 7 * 24 * 3600;

impl DeviceConfig {
    /// Parse a JSON config blob; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("config is not valid JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        if !(10..=10_000).contains(&self.loop_interval_ms) {
            return Err(Error::Config("loop_interval_ms must be 10–10000"));
        }
        if !(100..=600_000).contains(&self.connectivity_retry_ms) {
            return Err(Error::Config("connectivity_retry_ms must be 100–600000"));
        }
        if !(100..=600_000).contains(&self.clock_retry_ms) {
            return Err(Error::Config("clock_retry_ms must be 100–600000"));
        }
        if self.probe_host.is_empty() {
            return Err(Error::Config("probe_host must not be empty"));
        }
        if !(100..=30_000).contains(&self.probe_timeout_ms) {
            return Err(Error::Config("probe_timeout_ms must be 100–30000"));
        }
        if self.peripheral_init_attempts == 0 {
            return Err(Error::Config("peripheral_init_attempts must be at least 1"));
        }
        if self.max_consecutive_peripheral_errors == 0 {
            return Err(Error::Config(
                "max_consecutive_peripheral_errors must be at least 1",
            ));
        }
        if self.degraded_retry_ms < self.loop_interval_ms {
            return Err(Error::Config(
                "degraded_retry_ms must not be shorter than loop_interval_ms",
            ));
        }
        if !(60..=MAX_REANCHOR_INTERVAL_SECS).contains(&self.reanchor_interval_secs) {
            return Err(Error::Config("reanchor_interval_secs must be 60–604800"));
        }
        if !(1..=1_000).contains(&self.max_anchor_skew_ms) {
            return Err(Error::Config("max_anchor_skew_ms must be 1–1000"));
        }
        if !(10..=86_400).contains(&self.ping_period_secs) {
            return Err(Error::Config("ping_period_secs must be 10–86400"));
        }
        if self.max_rejections == 0 {
            return Err(Error::Config("max_rejections must be at least 1"));
        }
        Ok(())
    }

    pub fn ping_period_ms(&self) -> u64 {
        u64::from(self.ping_period_secs) * 1000
    }

    pub fn reanchor_interval_ms(&self) -> u64 {
        u64::from(self.reanchor_interval_secs) * 1000
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Device identity and shared secret for the relay endpoint.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub device_name: String,
    pub password: String,
    pub base_url: String,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("device_name", &self.device_name)
            .field("password", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Credentials {
    /// Build and validate credentials.  A trailing `/` on the base URL is dropped.
    pub fn new(device_name: &str, password: &str, base_url: &str) -> Result<Self> {
        let creds = Self {
            device_name: device_name.to_owned(),
            password: password.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        };
        creds.validate()?;
        Ok(creds)
    }

    /// Parse `{"device_name": ..., "password": ..., "base_url": ...}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Self = serde_json::from_str(json)
            .map_err(|_| Error::Config("credentials are not valid JSON"))?;
        Self::new(&raw.device_name, &raw.password, &raw.base_url)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device_name.is_empty() || self.device_name.len() > 64 {
            return Err(Error::Config("device_name must be 1–64 bytes"));
        }
        if !self
            .device_name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(Error::Config(
                "device_name must contain only ASCII letters, digits, '-' or '_'",
            ));
        }
        if self.password.is_empty() {
            return Err(Error::Config("password must not be empty"));
        }
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(Error::Config("base_url must start with http:// or https://"));
        }
        Ok(())
    }
}
