//! Press detector: turns button inputs into raw press records.
//!
//! Two input modalities are polled each cycle:
//!
//! 1. the level-sensed GPIO button, debounced by edge memory in
//!    [`ButtonDriver`]; a press is [`RawPress::Immediate`] and gets the
//!    current wall time;
//! 2. the queued I2C button peripheral, drained entry by entry; each
//!    click is [`RawPress::Tick`] and is converted through the clock
//!    anchor.
//!
//! Every new press toggles the status LED and mirrors it on the
//! peripheral's indicator.  Indicator failures are cosmetic and only
//! logged.
//!
//! A bus error while draining aborts the poll with `Err`, but every click
//! already popped stays in the caller's buffer; the rest of the device
//! queue is drained on the next cycle.

use embedded_hal::digital::{InputPin, StatefulOutputPin};
use log::{debug, warn};

use crate::app::ports::{ButtonPeripheral, PollScope, PressSource, RawPress, RawPresses, Tick};
use crate::drivers::button::ButtonDriver;
use crate::drivers::status_led::StatusLed;
use crate::error::PeripheralError;

/// Stand-in for boards without a queued button peripheral.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPeripheral;

impl ButtonPeripheral for NoPeripheral {
    fn begin(&mut self) -> bool {
        true
    }

    fn queue_empty(&mut self) -> Result<bool, PeripheralError> {
        Ok(true)
    }

    fn pop_queue(&mut self) -> Result<Tick, PeripheralError> {
        Err(PeripheralError::InvalidData)
    }

    fn ticks(&mut self) -> Result<Tick, PeripheralError> {
        Ok(0)
    }

    fn set_indicator(&mut self, _on: bool) -> Result<(), PeripheralError> {
        Ok(())
    }
}

pub struct PressDetector<P, L, B> {
    button: ButtonDriver<P>,
    led: StatusLed<L>,
    peripheral: B,
}

impl<P, L, B> PressDetector<P, L, B>
where
    P: InputPin,
    L: StatefulOutputPin,
    B: ButtonPeripheral,
{
    pub fn new(button: ButtonDriver<P>, led: StatusLed<L>, peripheral: B) -> Self {
        Self {
            button,
            led,
            peripheral,
        }
    }

    pub fn peripheral_mut(&mut self) -> &mut B {
        &mut self.peripheral
    }

    fn indicate(&mut self) {
        match self.led.toggle() {
            Ok(on) => {
                if let Err(e) = self.peripheral.set_indicator(on) {
                    debug!("Indicator mirror failed: {}", e);
                }
            }
            Err(e) => debug!("Status LED toggle failed: {}", e),
        }
    }

    /// Pop clicks until the device queue is empty or `out` is full.
    fn drain_peripheral(&mut self, out: &mut RawPresses) -> Result<(), PeripheralError> {
        while !out.is_full() {
            if self.peripheral.queue_empty()? {
                return Ok(());
            }
            let tick = self.peripheral.pop_queue()?;
            // Cannot fail: capacity checked by the loop condition.
            let _ = out.push(RawPress::Tick(tick));
            self.indicate();
        }
        debug!("Poll buffer full, remaining clicks wait for the next cycle");
        Ok(())
    }
}

impl<P, L, B> PressSource for PressDetector<P, L, B>
where
    P: InputPin,
    L: StatefulOutputPin,
    B: ButtonPeripheral,
{
    fn begin_peripheral(&mut self) -> bool {
        self.peripheral.begin()
    }

    fn peripheral_ticks(&mut self) -> Result<Tick, PeripheralError> {
        self.peripheral.ticks()
    }

    fn poll(&mut self, scope: PollScope, out: &mut RawPresses) -> Result<(), PeripheralError> {
        match self.button.sample() {
            Ok(true) => {
                if out.push(RawPress::Immediate).is_ok() {
                    self.indicate();
                }
            }
            Ok(false) => {}
            Err(e) => warn!("GPIO button read failed: {}", e),
        }

        match scope {
            PollScope::All => self.drain_peripheral(out),
            PollScope::GpioOnly => Ok(()),
        }
    }
}
