//! I2C button peripheral with an on-board click queue.
//!
//! The peripheral debounces its own switch and records the value of its
//! free-running millisecond counter for every click in a FIFO.  The
//! host drains that FIFO at leisure, so presses that happen while the
//! host is busy (or before the network is up) are not lost.
//!
//! ## Register map
//!
//! | Reg  | Name               | Access | Contents                             |
//! |------|--------------------|--------|--------------------------------------|
//! | 0x00 | ID                 | R      | `0x5D`                               |
//! | 0x03 | BUTTON_STATUS      | R      | bit2 = currently pressed             |
//! | 0x10 | CLICK_QUEUE_STATUS | R/W    | bit0 pop (W), bit1 empty, bit2 full  |
//! | 0x11 | CLICK_QUEUE_FRONT  | R      | u32 LE, tick of oldest click         |
//! | 0x19 | LED_BRIGHTNESS     | R/W    | 0–255                                |
//! | 0x20 | TICKS              | R      | u32 LE, current counter value        |
//!
//! ## Transactional pop
//!
//! A pop is a read of `CLICK_QUEUE_FRONT` followed by a write of the pop
//! bit.  The entry is only consumed once its value is in host memory;
//! if the acknowledge write fails the entry stays queued and is read
//! again next cycle, so a bus error can neither lose nor duplicate it.

use embedded_hal::i2c::I2c;
use log::{debug, warn};

use crate::app::ports::{ButtonPeripheral, Tick};
use crate::error::PeripheralError;

/// Factory-default 7-bit address.
pub const DEFAULT_ADDRESS: u8 = 0x6F;

/// Value of the ID register.
pub const DEVICE_ID: u8 = 0x5D;

pub mod reg {
    pub const ID: u8 = 0x00;
    pub const BUTTON_STATUS: u8 = 0x03;
    pub const CLICK_QUEUE_STATUS: u8 = 0x10;
    pub const CLICK_QUEUE_FRONT: u8 = 0x11;
    pub const LED_BRIGHTNESS: u8 = 0x19;
    pub const TICKS: u8 = 0x20;
}

const QUEUE_POP: u8 = 1 << 0;
const QUEUE_EMPTY: u8 = 1 << 1;
const QUEUE_FULL: u8 = 1 << 2;
const STATUS_PRESSED: u8 = 1 << 2;

/// Brightness used when the indicator is "on".
const INDICATOR_BRIGHTNESS: u8 = 64;

pub struct QueuedButton<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> QueuedButton<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Whether the switch is held right now.
    pub fn is_pressed(&mut self) -> Result<bool, PeripheralError> {
        Ok(self.read_u8(reg::BUTTON_STATUS)? & STATUS_PRESSED != 0)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    // ── Register access ───────────────────────────────────────

    fn read_u8(&mut self, register: u8) -> Result<u8, PeripheralError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(|_| PeripheralError::Bus)?;
        Ok(buf[0])
    }

    fn read_u32(&mut self, register: u8) -> Result<u32, PeripheralError> {
        let mut buf = [0u8; 4];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(|_| PeripheralError::Bus)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn write_u8(&mut self, register: u8, value: u8) -> Result<(), PeripheralError> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|_| PeripheralError::Bus)
    }

    fn check_id(&mut self) -> Result<(), PeripheralError> {
        match self.read_u8(reg::ID)? {
            DEVICE_ID => Ok(()),
            id => Err(PeripheralError::WrongDevice { id }),
        }
    }
}

impl<I2C: I2c> ButtonPeripheral for QueuedButton<I2C> {
    fn begin(&mut self) -> bool {
        match self.check_id() {
            Ok(()) => {
                debug!("QueuedButton: found at 0x{:02X}", self.address);
                true
            }
            Err(e) => {
                warn!("QueuedButton: begin at 0x{:02X} failed: {}", self.address, e);
                false
            }
        }
    }

    fn queue_empty(&mut self) -> Result<bool, PeripheralError> {
        let status = self.read_u8(reg::CLICK_QUEUE_STATUS)?;
        if status & QUEUE_FULL != 0 {
            warn!("QueuedButton: click queue full, the device may be dropping clicks");
        }
        Ok(status & QUEUE_EMPTY != 0)
    }

    fn pop_queue(&mut self) -> Result<Tick, PeripheralError> {
        let tick = self.read_u32(reg::CLICK_QUEUE_FRONT)?;
        self.write_u8(reg::CLICK_QUEUE_STATUS, QUEUE_POP)?;
        Ok(tick)
    }

    fn ticks(&mut self) -> Result<Tick, PeripheralError> {
        self.read_u32(reg::TICKS)
    }

    fn set_indicator(&mut self, on: bool) -> Result<(), PeripheralError> {
        let brightness = if on { INDICATOR_BRIGHTNESS } else { 0 };
        self.write_u8(reg::LED_BRIGHTNESS, brightness)
    }
}
