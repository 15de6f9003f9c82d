//! Application service: the control loop.
//!
//! [`ControlLoop`] owns the clock reconciler, the event queue, the
//! delivery engine and the ping state.  Hardware is injected at each
//! [`step`](ControlLoop::step) through port traits, so the whole loop
//! runs on the host against mock adapters.
//!
//! ```text
//!  PressSource ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                  │         ControlLoop           │
//!        Board ◀──▶│ Clock · Queue · Delivery · Ping│
//!                  └──────────────────────────────┘
//! ```
//!
//! ## States
//!
//! ```text
//!  WaitForConnectivity ─▶ WaitForClock ─▶ InitPeripheral ─▶ Running
//!                                               │            ▲  │
//!                                               ▼            │  ▼
//!                                              Degraded ─────┘ ◀┘
//! ```
//!
//! `Degraded` keeps capturing GPIO presses, delivering and pinging while
//! it retries the peripheral at `degraded_retry_ms`.  The loop never
//! exits.

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::clock::ClockReconciler;
use crate::config::{Credentials, DeviceConfig};
use crate::delivery::{DeliveryEngine, DeliveryOutcome, PingState};
use crate::error::{Error, PeripheralError};
use crate::queue::{EventQueue, PressEvent, DEFAULT_QUEUE_CAPACITY};

use super::events::AppEvent;
use super::ports::{Board, EventSink, PollScope, PressSource, RawPress, RawPresses};

/// Top-level loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Probing the network until it answers.
    WaitForConnectivity,
    /// Waiting for network time.
    WaitForClock,
    /// Bringing up the queued peripheral and anchoring its ticks.
    InitPeripheral,
    /// Normal operation.
    Running,
    /// Peripheral unusable; GPIO capture and delivery continue.
    Degraded,
}

// ───────────────────────────────────────────────────────────────
// ControlLoop
// ───────────────────────────────────────────────────────────────

pub struct ControlLoop<const N: usize = DEFAULT_QUEUE_CAPACITY> {
    config: DeviceConfig,
    state: LoopState,
    clock: ClockReconciler,
    queue: EventQueue<N>,
    delivery: DeliveryEngine,
    ping: PingState,
    /// `begin()` attempts made in `InitPeripheral`.
    init_attempts: u32,
    /// Consecutive failed peripheral polls in `Running`.
    peripheral_errors: u32,
    next_reanchor_ms: u64,
    next_peripheral_retry_ms: u64,
    iterations: u64,
}

impl<const N: usize> ControlLoop<N> {
    pub fn new(config: DeviceConfig, creds: &Credentials) -> Self {
        let delivery = DeliveryEngine::new(creds, &config);
        let ping = PingState::new(0, config.ping_period_ms());
        Self {
            config,
            state: LoopState::WaitForConnectivity,
            clock: ClockReconciler::new(),
            queue: EventQueue::new(),
            delivery,
            ping,
            init_attempts: 0,
            peripheral_errors: 0,
            next_reanchor_ms: 0,
            next_peripheral_retry_ms: 0,
            iterations: 0,
        }
    }

    // ── Driving ───────────────────────────────────────────────

    /// Perform one unit of work for the current state.
    ///
    /// Returns the number of milliseconds to wait before the next call.
    /// `board` carries every port except inputs, so one `&mut` covers
    /// network, time and HTTP without double borrows.
    pub fn step(
        &mut self,
        board: &mut impl Board,
        input: &mut impl PressSource,
        sink: &mut impl EventSink,
    ) -> u32 {
        match self.state {
            LoopState::WaitForConnectivity => {
                if board.is_connected() {
                    self.transition(LoopState::WaitForClock, sink);
                    0
                } else {
                    debug!("No connectivity, retrying in {}ms", self.config.connectivity_retry_ms);
                    self.config.connectivity_retry_ms
                }
            }
            LoopState::WaitForClock => match self.clock.calibrate(board) {
                Ok(_) => {
                    self.ping = PingState::new(board.now_ms(), self.config.ping_period_ms());
                    self.init_attempts = 0;
                    self.transition(LoopState::InitPeripheral, sink);
                    0
                }
                Err(e) => {
                    debug!("Clock not ready ({}), retrying in {}ms", e, self.config.clock_retry_ms);
                    self.config.clock_retry_ms
                }
            },
            LoopState::InitPeripheral => self.init_peripheral(board, input, sink),
            LoopState::Running => {
                self.maybe_reanchor(board, input, sink);
                self.iterate(board, input, sink, PollScope::All);
                self.config.loop_interval_ms
            }
            LoopState::Degraded => {
                self.maybe_recover(board, input, sink);
                let scope = match self.state {
                    LoopState::Running => PollScope::All,
                    _ => PollScope::GpioOnly,
                };
                self.iterate(board, input, sink, scope);
                self.config.loop_interval_ms
            }
        }
    }

    /// Run forever, sleeping between steps.
    pub fn run(
        &mut self,
        board: &mut impl Board,
        input: &mut impl PressSource,
        sink: &mut impl EventSink,
        delay: &mut impl DelayNs,
    ) -> ! {
        info!("ControlLoop starting in {:?}", self.state);
        loop {
            let wait_ms = self.step(board, input, sink);
            if wait_ms > 0 {
                delay.delay_ms(wait_ms);
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn queue(&self) -> &EventQueue<N> {
        &self.queue
    }

    pub fn clock(&self) -> &ClockReconciler {
        &self.clock
    }

    pub fn ping_state(&self) -> PingState {
        self.ping
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Capture/deliver iterations executed in `Running` or `Degraded`.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn peripheral_errors(&self) -> u32 {
        self.peripheral_errors
    }

    // ── Peripheral lifecycle ──────────────────────────────────

    fn init_peripheral(
        &mut self,
        board: &mut impl Board,
        input: &mut impl PressSource,
        sink: &mut impl EventSink,
    ) -> u32 {
        self.init_attempts += 1;
        match self.bring_up_peripheral(board, input, sink) {
            Ok(()) => {
                self.transition(LoopState::Running, sink);
                0
            }
            Err(e) if self.init_attempts < self.config.peripheral_init_attempts => {
                warn!(
                    "Peripheral init attempt {}/{} failed: {}",
                    self.init_attempts, self.config.peripheral_init_attempts, e
                );
                self.config.peripheral_init_retry_ms
            }
            Err(e) => {
                error!(
                    "Peripheral init gave up after {} attempts: {}",
                    self.init_attempts, e
                );
                self.enter_degraded(board.now_ms(), sink);
                0
            }
        }
    }

    /// `begin()` the peripheral and anchor its tick counter.
    fn bring_up_peripheral(
        &mut self,
        board: &mut impl Board,
        input: &mut impl PressSource,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        if !input.begin_peripheral() {
            return Err(PeripheralError::Bus.into());
        }
        self.reanchor(board, input, sink)?;
        self.peripheral_errors = 0;
        Ok(())
    }

    fn reanchor(
        &mut self,
        board: &mut impl Board,
        input: &mut impl PressSource,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        let skew = self.config.max_anchor_skew_ms;
        let now = board.now_ms();
        match self.clock.anchor(board, now, || input.peripheral_ticks(), skew) {
            Ok(anchor) => {
                self.next_reanchor_ms = now + self.config.reanchor_interval_ms();
                sink.emit(&AppEvent::Anchored {
                    wall_time: anchor.anchor_wall_time,
                    tick: anchor.anchor_tick_value,
                });
                Ok(())
            }
            Err(e) => {
                sink.emit(&AppEvent::AnchorFailed(e));
                Err(e.into())
            }
        }
    }

    fn maybe_reanchor(
        &mut self,
        board: &mut impl Board,
        input: &mut impl PressSource,
        sink: &mut impl EventSink,
    ) {
        let now = board.now_ms();
        if now < self.next_reanchor_ms {
            return;
        }
        if let Err(e) = self.reanchor(board, input, sink) {
            warn!("Re-anchor failed ({}), keeping previous anchor", e);
            self.next_reanchor_ms = now + u64::from(self.config.degraded_retry_ms);
        }
    }

    fn maybe_recover(
        &mut self,
        board: &mut impl Board,
        input: &mut impl PressSource,
        sink: &mut impl EventSink,
    ) {
        let now = board.now_ms();
        if now < self.next_peripheral_retry_ms {
            return;
        }
        match self.bring_up_peripheral(board, input, sink) {
            Ok(()) => {
                info!("Peripheral recovered");
                self.transition(LoopState::Running, sink);
            }
            Err(e) => {
                debug!("Peripheral still down: {}", e);
                self.next_peripheral_retry_ms = now + u64::from(self.config.degraded_retry_ms);
            }
        }
    }

    fn enter_degraded(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        self.next_peripheral_retry_ms = now_ms + u64::from(self.config.degraded_retry_ms);
        self.transition(LoopState::Degraded, sink);
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// Poll → enqueue → deliver one → maybe ping.
    fn iterate(
        &mut self,
        board: &mut impl Board,
        input: &mut impl PressSource,
        sink: &mut impl EventSink,
        scope: PollScope,
    ) {
        self.iterations += 1;

        // 1. Poll; presses read before a fault are still captured
        let mut presses = RawPresses::new();
        let polled = input.poll(scope, &mut presses);
        for press in presses {
            self.capture(press, board, sink);
        }

        match polled {
            Ok(()) if scope == PollScope::All => self.peripheral_errors = 0,
            Ok(()) => {}
            Err(e) => {
                warn!("Peripheral poll failed: {}", e);
                sink.emit(&AppEvent::PeripheralFault(e));
                if scope == PollScope::All {
                    self.peripheral_errors += 1;
                    if self.peripheral_errors >= self.config.max_consecutive_peripheral_errors {
                        error!(
                            "{} consecutive peripheral errors, degrading",
                            self.peripheral_errors
                        );
                        self.enter_degraded(board.now_ms(), sink);
                    }
                }
            }
        }

        // 2. At most one delivery
        let now = board.now_ms();
        let outcome = self.delivery.try_deliver_one(&mut self.queue, board, sink);
        if outcome == DeliveryOutcome::Sent && self.config.ping_suppressed_by_delivery {
            self.ping.record(now);
        }

        // 3. Liveness
        self.delivery.maybe_ping(&mut self.ping, now, board, sink);
    }

    /// Stamp a raw press with UTC and queue it.
    fn capture(&mut self, press: RawPress, board: &mut impl Board, sink: &mut impl EventSink) {
        let now_ms = board.now_ms();
        let stamped = match press {
            RawPress::Immediate => self.clock.now(board),
            RawPress::Tick(tick) => self.clock.tick_to_utc(tick, now_ms).or_else(|| {
                warn!("Click at tick {} before anchoring, using wall time", tick);
                self.clock.now(board)
            }),
        };
        let Some(timestamp) = stamped else {
            error!("Press dropped: wall clock not calibrated");
            return;
        };

        let event = PressEvent::new(timestamp);
        if let Some(evicted) = self.queue.enqueue(event) {
            warn!("Queue full, evicted event at {:.3}", evicted.press_timestamp());
            sink.emit(&AppEvent::EventEvicted(evicted));
        }
        sink.emit(&AppEvent::PressQueued {
            event,
            queued: self.queue.len(),
        });
    }

    fn transition(&mut self, to: LoopState, sink: &mut impl EventSink) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        info!("ControlLoop: {:?} → {:?}", from, to);
        sink.emit(&AppEvent::StateChanged { from, to });
    }
}
