//! Clock reconciliation between the network wall clock and peripheral ticks.
//!
//! Two independent clock domains meet here:
//!
//! ```text
//!  modem wall clock ──(epoch + utc offset)──▶ WallClock ──▶ UTC seconds
//!                                                │
//!  peripheral ms counter ──(anchor pair)─────────┴──▶ ClockAnchor ──▶ UTC seconds
//! ```
//!
//! The [`WallClock`] calibration happens once network time is available.
//! The [`ClockAnchor`] pairs one wall-clock reading with one tick reading,
//! after which [`to_utc`] converts any later tick with no I/O.
//!
//! ## Wraparound
//!
//! [`to_utc`] counts forward from the anchor modulo 2^32, so every tick
//! at or after the anchor converts linearly, including across a wrap of
//! the counter.  The counter alone cannot tell a click from before the
//! anchor apart from one 49.7 days after it, so [`ClockReconciler`] also
//! remembers when (on the monotonic clock) the anchor was taken and
//! resolves the wrap count with [`ticks_from_anchor`].  Conversion then
//! stays exact however old the anchor is, as long as each click is
//! drained within ~24.8 days of happening.

use log::{debug, info};

use crate::app::ports::{Tick, TimeSource, Timestamp};
use crate::error::{ClockError, PeripheralError};

/// Seconds between 1970-01-01 and 2000-01-01 (UTC).
pub const Y2000_UNIX_OFFSET_SECS: i64 = 946_684_800;

/// Resolution of peripheral tick counters.
pub const TICKS_PER_SECOND: f64 = 1000.0;

/// Epoch a device clock counts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEpoch {
    /// 1970-01-01, as used by POSIX `time()`.
    Unix1970,
    /// 2000-01-01, as used by cellular modem firmware.  The bundled time
    /// sources (SNTP, RTC) are all Unix-based; this serves modem-backed
    /// [`TimeSource`] implementations.
    Y2000,
}

impl DeviceEpoch {
    /// Seconds to add to a device timestamp to make it Unix-based.
    pub const fn unix_offset_secs(self) -> i64 {
        match self {
            Self::Unix1970 => 0,
            Self::Y2000 => Y2000_UNIX_OFFSET_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Wall clock calibration
// ---------------------------------------------------------------------------

/// Converts device clock readings into UTC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallClock {
    device_to_utc_secs: f64,
}

impl WallClock {
    pub fn new(epoch: DeviceEpoch, utc_offset_secs: i32) -> Self {
        Self {
            device_to_utc_secs: (epoch.unix_offset_secs() + i64::from(utc_offset_secs)) as f64,
        }
    }

    /// Query the time source once.  Fails until network time is available.
    pub fn calibrate(time: &mut impl TimeSource) -> Result<Self, ClockError> {
        let offset = time.utc_offset()?;
        Ok(Self::new(time.epoch(), offset))
    }

    pub fn to_utc(&self, device_seconds: f64) -> Timestamp {
        device_seconds + self.device_to_utc_secs
    }

    pub fn now(&self, time: &mut impl TimeSource) -> Timestamp {
        self.to_utc(time.device_seconds())
    }
}

// ---------------------------------------------------------------------------
// Tick anchor
// ---------------------------------------------------------------------------

/// One paired sample of wall-clock time and peripheral tick value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockAnchor {
    pub anchor_wall_time: Timestamp,
    pub anchor_tick_value: Tick,
}

/// Milliseconds from the anchor forward to `tick`, modulo 2^32.
pub fn ticks_since(anchor_tick: Tick, tick: Tick) -> u32 {
    tick.wrapping_sub(anchor_tick)
}

/// Convert a tick at or after the anchor into UTC.  Pure; performs no I/O.
pub fn to_utc(tick_value: Tick, anchor: &ClockAnchor) -> Timestamp {
    anchor.anchor_wall_time
        + f64::from(ticks_since(anchor.anchor_tick_value, tick_value)) / TICKS_PER_SECOND
}

/// Signed milliseconds from the anchor to `tick`, when `elapsed_ms` have
/// passed on the monotonic clock since the anchor was taken.
///
/// The tick fixes the distance modulo 2^32; the wrap count chosen is the
/// one placing the click within 2^31 ms of now.  Clicks from before the
/// anchor come out negative.
pub fn ticks_from_anchor(anchor_tick: Tick, tick: Tick, elapsed_ms: u64) -> i64 {
    let expected_now = anchor_tick.wrapping_add(elapsed_ms as u32);
    let age_ms = expected_now.wrapping_sub(tick) as i32;
    elapsed_ms as i64 - i64::from(age_ms)
}

/// Convert any tick, before or after the anchor, into UTC.  Pure.
pub fn to_utc_elapsed(tick_value: Tick, anchor: &ClockAnchor, elapsed_ms: u64) -> Timestamp {
    let offset_ms = ticks_from_anchor(anchor.anchor_tick_value, tick_value, elapsed_ms);
    anchor.anchor_wall_time + offset_ms as f64 / TICKS_PER_SECOND
}

/// Sample wall time bracketed by two tick reads.
///
/// The anchor tick is the bracket midpoint; its error is at most half
/// the bracket, which must not exceed `max_skew_ms`.
pub fn establish_anchor(
    wall: &WallClock,
    time: &mut impl TimeSource,
    mut read_ticks: impl FnMut() -> Result<Tick, PeripheralError>,
    max_skew_ms: u32,
) -> Result<ClockAnchor, ClockError> {
    let before = read_ticks().map_err(|_| ClockError::TickReadFailed)?;
    let anchor_wall_time = wall.now(time);
    let after = read_ticks().map_err(|_| ClockError::TickReadFailed)?;

    let span = after.wrapping_sub(before);
    let skew_ms = span / 2;
    if skew_ms > max_skew_ms {
        debug!("Anchor bracket {}..{} rejected (skew {}ms)", before, after, skew_ms);
        return Err(ClockError::SkewTooLarge { skew_ms });
    }

    Ok(ClockAnchor {
        anchor_wall_time,
        anchor_tick_value: before.wrapping_add(skew_ms),
    })
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Owns the calibration state and stamps raw presses with UTC time.
#[derive(Debug, Clone, Default)]
pub struct ClockReconciler {
    wall: Option<WallClock>,
    anchor: Option<ClockAnchor>,
    /// Monotonic time at which `anchor` was taken.
    anchored_at_ms: u64,
}

impl ClockReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt wall-clock calibration.  Retryable.
    pub fn calibrate(&mut self, time: &mut impl TimeSource) -> Result<WallClock, ClockError> {
        let wall = WallClock::calibrate(time)?;
        self.wall = Some(wall);
        info!("Clock: wall clock calibrated (UTC = device + {:.0}s)", wall.device_to_utc_secs);
        Ok(wall)
    }

    /// Attempt a (re-)anchor at monotonic time `now_ms`.  On failure any
    /// previous anchor is kept.
    pub fn anchor(
        &mut self,
        time: &mut impl TimeSource,
        now_ms: u64,
        read_ticks: impl FnMut() -> Result<Tick, PeripheralError>,
        max_skew_ms: u32,
    ) -> Result<ClockAnchor, ClockError> {
        let wall = self.wall.ok_or(ClockError::NotSynced)?;
        let anchor = establish_anchor(&wall, time, read_ticks, max_skew_ms)?;
        self.anchor = Some(anchor);
        self.anchored_at_ms = now_ms;
        info!(
            "Clock: anchored tick {} at {:.3}",
            anchor.anchor_tick_value, anchor.anchor_wall_time
        );
        Ok(anchor)
    }

    pub fn wall(&self) -> Option<WallClock> {
        self.wall
    }

    pub fn current_anchor(&self) -> Option<ClockAnchor> {
        self.anchor
    }

    /// Current UTC time, if calibrated.
    pub fn now(&self, time: &mut impl TimeSource) -> Option<Timestamp> {
        self.wall.map(|w| w.now(time))
    }

    /// Tick conversion at monotonic time `now_ms`, if anchored.
    pub fn tick_to_utc(&self, tick: Tick, now_ms: u64) -> Option<Timestamp> {
        let elapsed_ms = now_ms.saturating_sub(self.anchored_at_ms);
        self.anchor.as_ref().map(|a| to_utc_elapsed(tick, a, elapsed_ms))
    }
}
