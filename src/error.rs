//! Unified error types for the WhenPress firmware.
//!
//! A single `Error` enum that every subsystem can convert into, one
//! variant per failure class the control loop distinguishes.  All
//! variants are `Copy` so they can be passed through the loop, logged
//! and embedded in [`AppEvent`](crate::app::events::AppEvent)s without
//! allocation.
//!
//! | Class        | Retry policy                                        |
//! |--------------|-----------------------------------------------------|
//! | Connectivity | always retryable, gated at startup                  |
//! | Clock        | retryable during startup; re-anchor keeps old anchor |
//! | Peripheral   | bounded at init, logged-and-skipped while polling   |
//! | Delivery     | event requeued; 4xx counts toward the rejection cap |

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The network is not reachable (connectivity probe failed).
    Connectivity,
    /// The wall clock or the peripheral tick counter is unusable.
    Clock(ClockError),
    /// A button/RTC peripheral did not respond.
    Peripheral(PeripheralError),
    /// An event or ping POST failed.
    Delivery(DeliveryError),
    /// Configuration or credentials are invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity => write!(f, "connectivity: network unreachable"),
            Self::Clock(e) => write!(f, "clock: {e}"),
            Self::Peripheral(e) => write!(f, "peripheral: {e}"),
            Self::Delivery(e) => write!(f, "delivery: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Clock errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    /// Network time has not been delivered to the device yet.
    NotSynced,
    /// The time query failed for another (transient) reason.
    QueryFailed,
    /// The peripheral tick counter could not be read.
    TickReadFailed,
    /// The wall/tick sample pair was too far apart to anchor on.
    SkewTooLarge { skew_ms: u32 },
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSynced => write!(f, "network time not synced"),
            Self::QueryFailed => write!(f, "time query failed"),
            Self::TickReadFailed => write!(f, "tick counter read failed"),
            Self::SkewTooLarge { skew_ms } => write!(f, "anchor skew {skew_ms}ms too large"),
        }
    }
}

impl From<ClockError> for Error {
    fn from(e: ClockError) -> Self {
        Self::Clock(e)
    }
}

// ---------------------------------------------------------------------------
// Peripheral errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralError {
    /// A bus transaction (I2C read/write) failed.
    Bus,
    /// The device answered with an unexpected identity.
    WrongDevice { id: u8 },
    /// A GPIO read or write failed.
    Gpio,
    /// The device answered with data that cannot be decoded.
    InvalidData,
}

impl fmt::Display for PeripheralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => write!(f, "bus transaction failed"),
            Self::WrongDevice { id } => write!(f, "unexpected device id 0x{id:02X}"),
            Self::Gpio => write!(f, "GPIO access failed"),
            Self::InvalidData => write!(f, "invalid register data"),
        }
    }
}

impl From<PeripheralError> for Error {
    fn from(e: PeripheralError) -> Self {
        Self::Peripheral(e)
    }
}

// ---------------------------------------------------------------------------
// Delivery errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// DNS, socket, TLS or timeout failure before a status was received.
    Transport,
    /// The endpoint answered with a status other than 200.
    Status(u16),
    /// The request body could not be encoded.
    Encode,
}

impl DeliveryError {
    /// A 4xx answer (other than timeout/rate-limit) means the endpoint
    /// rejected the request itself; retrying unchanged will not help.
    pub const fn is_rejection(self) -> bool {
        match self {
            Self::Transport => false,
            Self::Encode => true,
            Self::Status(code) => code >= 400 && code < 500 && code != 408 && code != 429,
        }
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport error"),
            Self::Status(code) => write!(f, "HTTP status {code}"),
            Self::Encode => write!(f, "request body encoding failed"),
        }
    }
}

impl From<DeliveryError> for Error {
    fn from(e: DeliveryError) -> Self {
        Self::Delivery(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
