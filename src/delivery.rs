//! Delivery engine: moves queued presses to the relay endpoint.
//!
//! ## Per-iteration budget
//!
//! Each control-loop iteration attempts **at most one** event POST, so a
//! slow network never stalls button polling for more than one request
//! timeout.
//!
//! ## Failure handling
//!
//! | Result                         | Event                     | Counted |
//! |--------------------------------|---------------------------|---------|
//! | 200                            | dropped (delivered)       | –       |
//! | transport error, 5xx, 408, 429 | requeued at the front     | no      |
//! | other 4xx, encode failure      | requeued at the front     | yes     |
//! | `max_rejections` reached       | dropped, logged dead-letter | –     |
//!
//! Connectivity outages therefore never lose events; only an endpoint
//! that keeps refusing the same event (stale credential, unknown device)
//! eventually gives it up.
//!
//! ## Ping cadence
//!
//! `last_ping` is updated only on success, so a failed ping is retried
//! on the very next iteration rather than a full period later.

use log::{debug, error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, HttpClient};
use crate::config::{Credentials, DeviceConfig};
use crate::error::DeliveryError;
use crate::queue::{EventQueue, PressEvent};
use crate::wire::{self, Endpoints, HTTP_OK, JSON_HEADERS};

/// Result of one [`DeliveryEngine::try_deliver_one`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The front event was delivered and destroyed.
    Sent,
    /// The front event failed and is back at the front.
    Failed(DeliveryError),
    /// Nothing was queued.
    Empty,
    /// The front event hit the rejection cap and was dropped.
    DeadLettered,
}

/// Result of one [`DeliveryEngine::maybe_ping`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    Sent,
    Failed(DeliveryError),
    /// The period has not elapsed yet.
    Skipped,
}

/// Liveness ping bookkeeping, in monotonic milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingState {
    last_ping_ms: u64,
    period_ms: u64,
}

impl PingState {
    /// Start the cadence at `now_ms`; the first ping is due one period later.
    pub const fn new(now_ms: u64, period_ms: u64) -> Self {
        Self {
            last_ping_ms: now_ms,
            period_ms,
        }
    }

    pub const fn last_ping_ms(&self) -> u64 {
        self.last_ping_ms
    }

    pub const fn period_ms(&self) -> u64 {
        self.period_ms
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_ping_ms) >= self.period_ms
    }

    /// Record a successful liveness signal.
    pub fn record(&mut self, now_ms: u64) {
        self.last_ping_ms = now_ms;
    }
}

/// Consecutive rejections of the event currently at the queue front.
#[derive(Debug, Clone, Copy)]
struct RejectionCount {
    event: PressEvent,
    count: u32,
}

pub struct DeliveryEngine {
    endpoints: Endpoints,
    password: String,
    max_rejections: u32,
    rejections: Option<RejectionCount>,
}

impl DeliveryEngine {
    pub fn new(creds: &Credentials, config: &DeviceConfig) -> Self {
        Self {
            endpoints: Endpoints::new(creds),
            password: creds.password.clone(),
            max_rejections: config.max_rejections,
            rejections: None,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Attempt to deliver the front event.
    pub fn try_deliver_one<const N: usize>(
        &mut self,
        queue: &mut EventQueue<N>,
        http: &mut impl HttpClient,
        sink: &mut impl EventSink,
    ) -> DeliveryOutcome {
        let Some(event) = queue.pop_front() else {
            return DeliveryOutcome::Empty;
        };

        debug!(
            "Sending event at {:.3} ({} more queued)",
            event.press_timestamp(),
            queue.len()
        );
        let result = wire::data_body(&self.password, &event)
            .and_then(|body| self.post(http, self.endpoints.data_url(), &body));

        match result {
            Ok(()) => {
                self.rejections = None;
                info!("Sent event at {:.3}", event.press_timestamp());
                sink.emit(&AppEvent::EventSent {
                    event,
                    queued: queue.len(),
                });
                DeliveryOutcome::Sent
            }
            Err(e) if e.is_rejection() && self.reject(event) >= self.max_rejections => {
                self.rejections = None;
                error!(
                    "Dead-lettering event at {:.3} after {} rejections ({})",
                    event.press_timestamp(),
                    self.max_rejections,
                    e
                );
                sink.emit(&AppEvent::DeadLettered { event, error: e });
                DeliveryOutcome::DeadLettered
            }
            Err(e) => {
                if let Some(evicted) = queue.requeue_front(event) {
                    warn!("Queue full, evicted event at {:.3}", evicted.press_timestamp());
                    sink.emit(&AppEvent::EventEvicted(evicted));
                }
                sink.emit(&AppEvent::DeliveryFailed {
                    error: e,
                    queued: queue.len(),
                });
                DeliveryOutcome::Failed(e)
            }
        }
    }

    /// Send a liveness ping if one is due.
    pub fn maybe_ping(
        &mut self,
        ping: &mut PingState,
        now_ms: u64,
        http: &mut impl HttpClient,
        sink: &mut impl EventSink,
    ) -> PingOutcome {
        if !ping.is_due(now_ms) {
            return PingOutcome::Skipped;
        }

        let result = wire::ping_body(&self.password)
            .and_then(|body| self.post(http, self.endpoints.ping_url(), &body));

        match result {
            Ok(()) => {
                ping.record(now_ms);
                sink.emit(&AppEvent::PingSent);
                PingOutcome::Sent
            }
            Err(e) => {
                sink.emit(&AppEvent::PingFailed(e));
                PingOutcome::Failed(e)
            }
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn post(&self, http: &mut impl HttpClient, url: &str, body: &[u8]) -> Result<(), DeliveryError> {
        let response = http.post(url, JSON_HEADERS, body).map_err(|e| {
            warn!("POST {} failed: {}", url, e);
            e
        })?;

        if response.status == HTTP_OK {
            return Ok(());
        }
        warn!(
            "POST {} answered {} {}: {}",
            url, response.status, response.reason, response.body
        );
        Err(DeliveryError::Status(response.status))
    }

    /// Count a rejection of `event`; returns its running total.
    fn reject(&mut self, event: PressEvent) -> u32 {
        let count = match self.rejections {
            Some(r) if r.event == event => r.count + 1,
            _ => 1,
        };
        self.rejections = Some(RejectionCount { event, count });
        count
    }
}
