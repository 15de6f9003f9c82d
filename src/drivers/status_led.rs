//! Single-colour status LED.
//!
//! Toggled on every recognised press so the user sees the device
//! registered it.  Purely informational; write failures are logged by
//! the caller and never affect capture.

use embedded_hal::digital::StatefulOutputPin;

use crate::error::PeripheralError;

pub struct StatusLed<L> {
    pin: L,
}

impl<L: StatefulOutputPin> StatusLed<L> {
    pub fn new(pin: L) -> Self {
        Self { pin }
    }

    /// Flip the LED; returns the new state (`true` = lit).
    pub fn toggle(&mut self) -> Result<bool, PeripheralError> {
        self.pin.toggle().map_err(|_| PeripheralError::Gpio)?;
        self.is_on()
    }

    pub fn set(&mut self, on: bool) -> Result<(), PeripheralError> {
        if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
        .map_err(|_| PeripheralError::Gpio)
    }

    pub fn is_on(&mut self) -> Result<bool, PeripheralError> {
        self.pin.is_set_high().map_err(|_| PeripheralError::Gpio)
    }
}
