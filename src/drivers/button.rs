//! Level-sensed GPIO button with edge-memory debounce.
//!
//! ## Hardware
//!
//! Active-low momentary switch with pull-up (the dev-board user button).
//! The pin is sampled once per control-loop iteration; there is no ISR.
//!
//! ## Debounce
//!
//! | State     | Pin active         | Pin idle      |
//! |-----------|--------------------|---------------|
//! | `Idle`    | → `Pressed`, press | stay          |
//! | `Pressed` | stay (no event)    | → `Idle`      |
//!
//! A press is reported only on the idle→active transition, so holding
//! the button across many polls yields exactly one press.  Sampling at
//! the loop interval (100 ms) is slower than contact bounce, which is
//! what makes a single-sample edge detector sufficient.

use embedded_hal::digital::InputPin;

use crate::error::PeripheralError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Idle,
    Pressed,
}

/// Which pin level means "pressed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveLevel {
    Low,
    High,
}

pub struct ButtonDriver<P> {
    pin: P,
    active: ActiveLevel,
    state: ButtonState,
}

impl<P: InputPin> ButtonDriver<P> {
    pub fn new(pin: P, active: ActiveLevel) -> Self {
        Self {
            pin,
            active,
            state: ButtonState::Idle,
        }
    }

    /// Active-low button with pull-up, the common wiring.
    pub fn active_low(pin: P) -> Self {
        Self::new(pin, ActiveLevel::Low)
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    /// Sample the pin once.  Returns `true` on a new press.
    pub fn sample(&mut self) -> Result<bool, PeripheralError> {
        let active = match self.active {
            ActiveLevel::Low => self.pin.is_low(),
            ActiveLevel::High => self.pin.is_high(),
        }
        .map_err(|_| PeripheralError::Gpio)?;

        let (next, pressed) = match (self.state, active) {
            (ButtonState::Idle, true) => (ButtonState::Pressed, true),
            (ButtonState::Pressed, false) => (ButtonState::Idle, false),
            (state, _) => (state, false),
        };
        self.state = next;
        Ok(pressed)
    }

    pub fn release(self) -> P {
        self.pin
    }
}
