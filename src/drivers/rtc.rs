//! RV-8803 real-time clock over I2C.
//!
//! Time registers are BCD, starting at `HUNDREDTHS` and auto-incrementing
//! through `YEAR` (two-digit, 2000-based).  The clock is assumed to be
//! kept in UTC.
//!
//! Calendar conversion uses Howard Hinnant's `days_from_civil`, valid for
//! every date the chip can represent (2000–2099).

use embedded_hal::i2c::I2c;
use log::warn;

use crate::app::ports::RtcPeripheral;
use crate::error::PeripheralError;

pub const DEFAULT_ADDRESS: u8 = 0x32;

pub mod reg {
    pub const HUNDREDTHS: u8 = 0x10;
    pub const SECONDS: u8 = 0x11;
    pub const MINUTES: u8 = 0x12;
    pub const HOURS: u8 = 0x13;
    pub const WEEKDAY: u8 = 0x14;
    pub const DATE: u8 = 0x15;
    pub const MONTH: u8 = 0x16;
    pub const YEAR: u8 = 0x17;
}

pub struct Rv8803<I2C> {
    i2c: I2C,
    address: u8,
}

/// Decode one packed BCD byte; `None` if either nibble exceeds 9.
pub fn bcd_to_dec(value: u8) -> Option<u8> {
    let (hi, lo) = (value >> 4, value & 0x0F);
    (hi <= 9 && lo <= 9).then_some(hi * 10 + lo)
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
pub fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = i64::from((month + 9) % 12);
    let doy = (153 * mp + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

impl<I2C: I2c> Rv8803<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            address: DEFAULT_ADDRESS,
        }
    }

    fn read_block(&mut self, start: u8, buf: &mut [u8]) -> Result<(), PeripheralError> {
        self.i2c
            .write_read(self.address, &[start], buf)
            .map_err(|_| PeripheralError::Bus)
    }
}

impl<I2C: I2c> RtcPeripheral for Rv8803<I2C> {
    /// Any successful register read counts as present, including a
    /// hundredths value of zero.
    fn begin(&mut self) -> bool {
        let mut buf = [0u8; 1];
        match self.read_block(reg::HUNDREDTHS, &mut buf) {
            Ok(()) => true,
            Err(e) => {
                warn!("RV-8803: begin failed: {}", e);
                false
            }
        }
    }

    fn epoch_time(&mut self) -> Result<u64, PeripheralError> {
        let mut raw = [0u8; 8];
        self.read_block(reg::HUNDREDTHS, &mut raw)?;

        let field = |register: u8, mask: u8| {
            bcd_to_dec(raw[usize::from(register - reg::HUNDREDTHS)] & mask)
                .ok_or(PeripheralError::InvalidData)
        };
        let seconds = field(reg::SECONDS, 0x7F)?;
        let minutes = field(reg::MINUTES, 0x7F)?;
        let hours = field(reg::HOURS, 0x3F)?;
        let date = field(reg::DATE, 0x3F)?;
        let month = field(reg::MONTH, 0x1F)?;
        let year = field(reg::YEAR, 0xFF)?;

        if seconds > 59 || minutes > 59 || hours > 23 {
            return Err(PeripheralError::InvalidData);
        }
        if !(1..=12).contains(&month) || !(1..=31).contains(&date) {
            return Err(PeripheralError::InvalidData);
        }

        let days = days_from_civil(2000 + i64::from(year), u32::from(month), u32::from(date));
        let secs = days * 86_400
            + i64::from(hours) * 3600
            + i64::from(minutes) * 60
            + i64::from(seconds);
        u64::try_from(secs).map_err(|_| PeripheralError::InvalidData)
    }
}
