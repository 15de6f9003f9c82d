//! Board adapter: bundles the non-input ports into one [`Board`].
//!
//! Owns the connectivity probe, time source and HTTP client, exposing
//! them through their port traits so the control loop borrows a single
//! `&mut` per step.  Any combination of adapters can be plugged in,
//! which is how host simulation and the ESP-IDF image share one loop.
//!
//! [`Board`]: crate::app::ports::Board

use crate::app::ports::{
    ConnectivityProbe, HttpClient, HttpResponse, MonotonicClock, TimeSource,
};
use crate::clock::DeviceEpoch;
use crate::error::{ClockError, DeliveryError};

pub struct BoardAdapter<N, T, H> {
    probe: N,
    time: T,
    http: H,
}

impl<N, T, H> BoardAdapter<N, T, H>
where
    N: ConnectivityProbe,
    T: TimeSource + MonotonicClock,
    H: HttpClient,
{
    pub fn new(probe: N, time: T, http: H) -> Self {
        Self { probe, time, http }
    }

    pub fn http(&self) -> &H {
        &self.http
    }
}

// ── ConnectivityProbe ─────────────────────────────────────────

impl<N: ConnectivityProbe, T, H> ConnectivityProbe for BoardAdapter<N, T, H> {
    fn is_connected(&mut self) -> bool {
        self.probe.is_connected()
    }
}

// ── TimeSource / MonotonicClock ───────────────────────────────

impl<N, T: TimeSource, H> TimeSource for BoardAdapter<N, T, H> {
    fn epoch(&self) -> DeviceEpoch {
        self.time.epoch()
    }

    fn utc_offset(&mut self) -> Result<i32, ClockError> {
        self.time.utc_offset()
    }

    fn device_seconds(&mut self) -> f64 {
        self.time.device_seconds()
    }
}

impl<N, T: MonotonicClock, H> MonotonicClock for BoardAdapter<N, T, H> {
    fn now_ms(&self) -> u64 {
        self.time.now_ms()
    }
}

// ── HttpClient ────────────────────────────────────────────────

impl<N, T, H: HttpClient> HttpClient for BoardAdapter<N, T, H> {
    fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, DeliveryError> {
        self.http.post(url, headers, body)
    }
}
