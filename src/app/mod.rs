//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the control loop that ties the press detector,
//! clock reconciler, event queue and delivery engine together.  All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
