//! Time adapters.
//!
//! [`Esp32TimeAdapter`] provides monotonic time and the SNTP-backed wall
//! clock:
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` for monotonic
//!   milliseconds, `EspSntp` sync status gating the wall clock.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and the host
//!   system clock, always considered synced.
//!
//! [`RtcTimeSource`] turns a battery-backed RTC into a [`TimeSource`], and
//! [`FallbackTimeSource`] puts it behind SNTP on boards that carry one
//! (the `rtc` feature of the firmware image).

use log::{info, warn};

use crate::app::ports::{MonotonicClock, RtcPeripheral, TimeSource};
use crate::clock::DeviceEpoch;
use crate::error::ClockError;

/// Wall clocks reading earlier than this have not been set.
const EPOCH_2020: u64 = 1_577_836_800;

fn system_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ───────────────────────────────────────────────────────────────
// Esp32TimeAdapter
// ───────────────────────────────────────────────────────────────

/// Time adapter for the ESP32 platform.
pub struct Esp32TimeAdapter {
    #[cfg(target_os = "espidf")]
    sntp: esp_idf_svc::sntp::EspSntp<'static>,
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Esp32TimeAdapter {
    /// Start SNTP with the default pool servers.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, esp_idf_svc::sys::EspError> {
        Ok(Self {
            sntp: esp_idf_svc::sntp::EspSntp::new_default()?,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, core::convert::Infallible> {
        Ok(Self {
            start: std::time::Instant::now(),
        })
    }

    #[cfg(target_os = "espidf")]
    fn synced(&self) -> bool {
        self.sntp.get_sync_status() == esp_idf_svc::sntp::SyncStatus::Completed
            || system_seconds() >= EPOCH_2020 as f64
    }

    #[cfg(not(target_os = "espidf"))]
    fn synced(&self) -> bool {
        system_seconds() >= EPOCH_2020 as f64
    }
}

impl MonotonicClock for Esp32TimeAdapter {
    #[cfg(target_os = "espidf")]
    fn now_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1000
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl TimeSource for Esp32TimeAdapter {
    fn epoch(&self) -> DeviceEpoch {
        DeviceEpoch::Unix1970
    }

    /// The system clock is kept in UTC once SNTP has run.
    fn utc_offset(&mut self) -> Result<i32, ClockError> {
        if self.synced() {
            Ok(0)
        } else {
            Err(ClockError::NotSynced)
        }
    }

    fn device_seconds(&mut self) -> f64 {
        system_seconds()
    }
}

// ───────────────────────────────────────────────────────────────
// RtcTimeSource
// ───────────────────────────────────────────────────────────────

/// Wall clock read from an RTC kept in UTC.
pub struct RtcTimeSource<R> {
    rtc: R,
    started: bool,
    last_seconds: u64,
}

impl<R: RtcPeripheral> RtcTimeSource<R> {
    pub fn new(rtc: R) -> Self {
        Self {
            rtc,
            started: false,
            last_seconds: 0,
        }
    }

    fn read(&mut self) -> Result<u64, ClockError> {
        if !self.started {
            self.started = self.rtc.begin();
            if !self.started {
                return Err(ClockError::QueryFailed);
            }
        }
        let secs = self.rtc.epoch_time().map_err(|e| {
            warn!("RTC read failed: {}", e);
            ClockError::QueryFailed
        })?;
        self.last_seconds = secs;
        Ok(secs)
    }
}

impl<R: RtcPeripheral> TimeSource for RtcTimeSource<R> {
    fn epoch(&self) -> DeviceEpoch {
        DeviceEpoch::Unix1970
    }

    /// A chip that lost backup power reads as year 2000; treat that as unset.
    fn utc_offset(&mut self) -> Result<i32, ClockError> {
        match self.read()? {
            secs if secs >= EPOCH_2020 => Ok(0),
            _ => Err(ClockError::NotSynced),
        }
    }

    /// Falls back to the last good reading on a bus error.
    fn device_seconds(&mut self) -> f64 {
        let secs = self.read().unwrap_or(self.last_seconds);
        secs as f64
    }
}

// ───────────────────────────────────────────────────────────────
// FallbackTimeSource
// ───────────────────────────────────────────────────────────────

/// Network time from `primary` when it has it, otherwise wall time from
/// `secondary`.  Monotonic time always comes from `primary`.
///
/// Whichever source answered the last [`utc_offset`](TimeSource::utc_offset)
/// query also serves `epoch` and `device_seconds`, so a calibration never
/// mixes the two clocks.
pub struct FallbackTimeSource<P, S> {
    primary: P,
    secondary: S,
    on_secondary: bool,
}

impl<P: TimeSource, S: TimeSource> FallbackTimeSource<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self {
            primary,
            secondary,
            on_secondary: false,
        }
    }

    pub fn on_secondary(&self) -> bool {
        self.on_secondary
    }
}

impl<P: TimeSource, S: TimeSource> TimeSource for FallbackTimeSource<P, S> {
    fn epoch(&self) -> DeviceEpoch {
        if self.on_secondary {
            self.secondary.epoch()
        } else {
            self.primary.epoch()
        }
    }

    fn utc_offset(&mut self) -> Result<i32, ClockError> {
        match self.primary.utc_offset() {
            Ok(offset) => {
                self.on_secondary = false;
                Ok(offset)
            }
            Err(primary_err) => {
                let offset = self.secondary.utc_offset().map_err(|_| primary_err)?;
                if !self.on_secondary {
                    info!("Time: network time unavailable ({}), using RTC", primary_err);
                }
                self.on_secondary = true;
                Ok(offset)
            }
        }
    }

    fn device_seconds(&mut self) -> f64 {
        if self.on_secondary {
            self.secondary.device_seconds()
        } else {
            self.primary.device_seconds()
        }
    }
}

impl<P: MonotonicClock, S> MonotonicClock for FallbackTimeSource<P, S> {
    fn now_ms(&self) -> u64 {
        self.primary.now_ms()
    }
}
