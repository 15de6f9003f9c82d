//! Outbound application events.
//!
//! The [`ControlLoop`](super::service::ControlLoop) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the
//! other side decide what to do with them: log to serial, count them,
//! record them in tests.

use crate::app::ports::Tick;
use crate::app::service::LoopState;
use crate::error::{ClockError, DeliveryError, PeripheralError};
use crate::queue::PressEvent;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The control loop moved between states.
    StateChanged { from: LoopState, to: LoopState },

    /// Peripheral ticks are now convertible to UTC.
    Anchored { wall_time: f64, tick: Tick },

    /// A re-anchor attempt failed; the previous anchor stays in use.
    AnchorFailed(ClockError),

    /// A press was recognised and queued.
    PressQueued { event: PressEvent, queued: usize },

    /// The queue was full; the oldest event was dropped.
    EventEvicted(PressEvent),

    /// An event reached the endpoint.
    EventSent { event: PressEvent, queued: usize },

    /// An event POST failed; it is back at the front of the queue.
    DeliveryFailed { error: DeliveryError, queued: usize },

    /// An event was rejected too often and was dropped.
    DeadLettered { event: PressEvent, error: DeliveryError },

    /// A liveness ping reached the endpoint.
    PingSent,

    /// A liveness ping failed.
    PingFailed(DeliveryError),

    /// Polling a button peripheral failed.
    PeripheralFault(PeripheralError),
}
