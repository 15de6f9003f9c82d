//! Pin and bus drivers built on `embedded-hal` 1.0 traits.

pub mod button;
pub mod queued_button;
pub mod rtc;
pub mod status_led;
