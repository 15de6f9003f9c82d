//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::Anchored { wall_time, tick } => {
                info!("CLOCK | anchored tick={} at {:.3}", tick, wall_time);
            }
            AppEvent::AnchorFailed(e) => {
                warn!("CLOCK | anchor failed: {}", e);
            }
            AppEvent::PressQueued { event, queued } => {
                info!(
                    "PRESS | at {:.3} | queued={}",
                    event.press_timestamp(),
                    queued
                );
            }
            AppEvent::EventEvicted(event) => {
                warn!("QUEUE | full, evicted press at {:.3}", event.press_timestamp());
            }
            AppEvent::EventSent { event, queued } => {
                info!(
                    "SEND  | ok at {:.3} | queued={}",
                    event.press_timestamp(),
                    queued
                );
            }
            AppEvent::DeliveryFailed { error, queued } => {
                warn!("SEND  | failed: {} | queued={}", error, queued);
            }
            AppEvent::DeadLettered { event, error } => {
                error!(
                    "SEND  | dead-letter at {:.3}: {}",
                    event.press_timestamp(),
                    error
                );
            }
            AppEvent::PingSent => {
                info!("PING  | ok");
            }
            AppEvent::PingFailed(e) => {
                warn!("PING  | failed: {}", e);
            }
            AppEvent::PeripheralFault(e) => {
                warn!("PERIPH| {}", e);
            }
        }
    }
}
