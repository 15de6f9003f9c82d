//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlLoop (domain)
//! ```
//!
//! Driven adapters (network probe, time source, button peripheral, HTTP
//! client, credential store, event sink) implement these traits.  The
//! [`ControlLoop`](super::service::ControlLoop) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! All I/O behind these ports is blocking but must carry a bounded
//! timeout; the loop has no cancellation mechanism of its own.

use crate::clock::DeviceEpoch;
use crate::config::Credentials;
use crate::error::{ClockError, DeliveryError, Error, PeripheralError};

/// Peripheral-local tick counter reading (milliseconds since the
/// peripheral's own power-on, wraps at `u32::MAX`).
pub type Tick = u32;

/// Absolute UTC time in seconds since 1970-01-01, fractional.
pub type Timestamp = f64;

// ───────────────────────────────────────────────────────────────
// Network (driven adapter: modem → domain)
// ───────────────────────────────────────────────────────────────

/// Cheap reachability check, e.g. a TCP handshake with a well-known host.
pub trait ConnectivityProbe {
    /// `false` on any lookup or connect error.
    fn is_connected(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Time (driven adapter: modem / RTC / MCU timer → domain)
// ───────────────────────────────────────────────────────────────

/// The device's wall clock as delivered by the network.
pub trait TimeSource {
    /// Epoch the device's own clock counts from.
    fn epoch(&self) -> DeviceEpoch;

    /// Seconds to add to device time (after epoch correction) to get UTC.
    /// Fails with [`ClockError::NotSynced`] until network time has arrived.
    fn utc_offset(&mut self) -> Result<i32, ClockError>;

    /// Current device time in seconds since [`epoch`](Self::epoch).
    fn device_seconds(&mut self) -> f64;
}

/// Monotonic milliseconds since boot.  Never jumps when wall time is set.
pub trait MonotonicClock {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Peripherals (driven adapter: I2C devices → domain)
// ───────────────────────────────────────────────────────────────

/// A button peripheral that debounces internally and queues click ticks.
pub trait ButtonPeripheral {
    /// Probe and initialise the device.  `false` if it did not answer.
    fn begin(&mut self) -> bool;

    /// Whether the click queue currently holds no entries.
    fn queue_empty(&mut self) -> Result<bool, PeripheralError>;

    /// Remove and return the oldest queued click.
    ///
    /// Implementations must only consume the entry once its value has
    /// been read successfully, so a failed pop leaves it queued.
    fn pop_queue(&mut self) -> Result<Tick, PeripheralError>;

    /// Current value of the peripheral's free-running tick counter.
    fn ticks(&mut self) -> Result<Tick, PeripheralError>;

    /// Drive the peripheral's on-board indicator LED.
    fn set_indicator(&mut self, on: bool) -> Result<(), PeripheralError>;
}

/// A battery-backed real-time clock.
pub trait RtcPeripheral {
    /// Probe and initialise the device.  `false` if it did not answer.
    fn begin(&mut self) -> bool;

    /// Current time in whole seconds since 1970-01-01 UTC.
    fn epoch_time(&mut self) -> Result<u64, PeripheralError>;
}

// ───────────────────────────────────────────────────────────────
// Press source (driven adapter: button inputs → domain)
// ───────────────────────────────────────────────────────────────

/// How much of the input hardware a poll may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollScope {
    /// GPIO button and queued peripheral.
    All,
    /// GPIO button only (peripheral considered down).
    GpioOnly,
}

/// A press observed by the detector, before clock reconciliation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawPress {
    /// Peripheral tick at which the click happened.
    Tick(Tick),
    /// Recognised just now on a level-sensed input; stamp with wall time.
    Immediate,
}

/// Upper bound on presses reported by one poll.
pub const MAX_PRESSES_PER_POLL: usize = 16;

/// Presses collected during one poll cycle.
pub type RawPresses = heapless::Vec<RawPress, MAX_PRESSES_PER_POLL>;

/// The input side the control loop polls each iteration.
///
/// Implemented by [`PressDetector`](crate::detector::PressDetector);
/// tests substitute scripted sources.
pub trait PressSource {
    /// (Re)initialise the queued peripheral, if any.
    fn begin_peripheral(&mut self) -> bool;

    /// Tick counter used to anchor peripheral clicks.
    fn peripheral_ticks(&mut self) -> Result<Tick, PeripheralError>;

    /// Append new presses to `out`.
    ///
    /// On error, presses already appended remain valid and must be
    /// processed by the caller.
    fn poll(&mut self, scope: PollScope, out: &mut RawPresses) -> Result<(), PeripheralError>;
}

// ───────────────────────────────────────────────────────────────
// HTTP (driven adapter: domain → relay endpoint)
// ───────────────────────────────────────────────────────────────

/// Status line and body of an HTTP answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            reason: String::new(),
            body: String::new(),
        }
    }
}

/// Blocking HTTP client with bounded timeouts.
pub trait HttpClient {
    /// POST `body` to `url`.  Any status is `Ok`; only transport
    /// failures are `Err`.
    fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, DeliveryError>;
}

// ───────────────────────────────────────────────────────────────
// Credentials (driven adapter: flash / build env → domain)
// ───────────────────────────────────────────────────────────────

/// Loads the device's identity and shared secret.  Read once at startup.
pub trait CredentialStore {
    fn load(&self) -> Result<Credentials, Error>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Combined board port
// ───────────────────────────────────────────────────────────────

/// Everything the control loop needs from the board besides inputs.
///
/// Blanket-implemented, so any adapter satisfying the four ports can be
/// handed to [`ControlLoop::step`](super::service::ControlLoop::step)
/// as a single `&mut` without double borrows.
pub trait Board: ConnectivityProbe + TimeSource + MonotonicClock + HttpClient {}

impl<T> Board for T where T: ConnectivityProbe + TimeSource + MonotonicClock + HttpClient {}
