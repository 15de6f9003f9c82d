//! Mock hardware for integration tests.
//!
//! Every port the control loop touches has a scripted stand-in here:
//! a simulated monotonic clock, a board that records every POST, mock
//! `embedded-hal` pins, a queued button peripheral (both at port level
//! and as a register-level I2C fake) and a sink that keeps every
//! emitted [`AppEvent`].

#![allow(dead_code)]

use core::convert::Infallible;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::digital::{self, InputPin, OutputPin, StatefulOutputPin};
use embedded_hal::i2c::{self, ErrorKind, I2c, Operation};

use whenpress::app::events::AppEvent;
use whenpress::app::ports::{
    ButtonPeripheral, ConnectivityProbe, EventSink, HttpClient, HttpResponse, MonotonicClock,
    Tick, TimeSource,
};
use whenpress::app::service::{ControlLoop, LoopState};
use whenpress::clock::DeviceEpoch;
use whenpress::config::{Credentials, DeviceConfig};
use whenpress::detector::PressDetector;
use whenpress::drivers::button::ButtonDriver;
use whenpress::drivers::queued_button::{reg, DEVICE_ID};
use whenpress::drivers::status_led::StatusLed;
use whenpress::error::{ClockError, DeliveryError, PeripheralError};
use whenpress::queue::DEFAULT_QUEUE_CAPACITY;

pub const DEVICE: &str = "sage";
pub const PASSWORD: &str = "hunter2";
pub const BASE_URL: &str = "https://relay.example.net";

/// Wall time at which [`Rig::bring_up`] anchors the peripheral.
pub const ANCHOR_WALL: f64 = 1_700_000_000.0;

pub fn credentials() -> Credentials {
    Credentials::new(DEVICE, PASSWORD, BASE_URL).unwrap()
}

pub fn data_url() -> String {
    format!("{}/{}/data", BASE_URL, DEVICE)
}

pub fn ping_url() -> String {
    format!("{}/{}/ping", BASE_URL, DEVICE)
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

// ── Simulated monotonic clock ─────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    pub fn now_ms(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

// ── MockBoard ─────────────────────────────────────────────────

/// One recorded POST.
#[derive(Debug, Clone)]
pub struct Post {
    pub at_ms: u64,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

pub struct MockBoard {
    pub connected: bool,
    pub utc_offset: Result<i32, ClockError>,
    pub epoch: DeviceEpoch,
    /// Device clock reading at simulated time zero.
    pub device_base_secs: f64,
    pub clock: SimClock,
    /// Scripted answers, consumed in order; 200 once exhausted.
    pub responses: VecDeque<Result<u16, DeliveryError>>,
    pub posts: Vec<Post>,
}

impl MockBoard {
    pub fn new(clock: SimClock) -> Self {
        Self {
            connected: false,
            utc_offset: Err(ClockError::NotSynced),
            epoch: DeviceEpoch::Unix1970,
            device_base_secs: 0.0,
            clock,
            responses: VecDeque::new(),
            posts: Vec::new(),
        }
    }

    pub fn script(&mut self, responses: impl IntoIterator<Item = Result<u16, DeliveryError>>) {
        self.responses.extend(responses);
    }

    pub fn data_posts(&self) -> Vec<&Post> {
        self.posts.iter().filter(|p| p.url == data_url()).collect()
    }

    pub fn ping_posts(&self) -> Vec<&Post> {
        self.posts.iter().filter(|p| p.url == ping_url()).collect()
    }
}

impl ConnectivityProbe for MockBoard {
    fn is_connected(&mut self) -> bool {
        self.connected
    }
}

impl TimeSource for MockBoard {
    fn epoch(&self) -> DeviceEpoch {
        self.epoch
    }

    fn utc_offset(&mut self) -> Result<i32, ClockError> {
        self.utc_offset
    }

    fn device_seconds(&mut self) -> f64 {
        self.device_base_secs + self.clock.now_ms() as f64 / 1000.0
    }
}

impl MonotonicClock for MockBoard {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

impl HttpClient for MockBoard {
    fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, DeliveryError> {
        self.posts.push(Post {
            at_ms: self.clock.now_ms(),
            url: url.to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            body: serde_json::from_slice(body).unwrap(),
        });
        let status = self.responses.pop_front().unwrap_or(Ok(200))?;
        let mut response = HttpResponse::new(status);
        if status != 200 {
            response.reason = "Scripted".to_string();
            response.body = "scripted failure".to_string();
        }
        Ok(response)
    }
}

// ── Mock pins ─────────────────────────────────────────────────

/// Input pin with a shared level; idle high (active-low button).
#[derive(Debug, Clone)]
pub struct MockPin(Rc<Cell<bool>>);

impl MockPin {
    pub fn new() -> Self {
        Self(Rc::new(Cell::new(true)))
    }

    pub fn press(&self) {
        self.0.set(false);
    }

    pub fn release(&self) {
        self.0.set(true);
    }
}

impl digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockLed(Rc<Cell<bool>>);

impl MockLed {
    pub fn is_lit(&self) -> bool {
        self.0.get()
    }
}

impl digital::ErrorType for MockLed {
    type Error = Infallible;
}

impl OutputPin for MockLed {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.set(true);
        Ok(())
    }
}

impl StatefulOutputPin for MockLed {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }
}

// ── Port-level queued button ──────────────────────────────────

#[derive(Debug)]
pub struct PeripheralState {
    pub present: bool,
    pub clicks: VecDeque<Tick>,
    pub ticks: Tick,
    pub fail_polls: bool,
    pub indicator: bool,
    pub begin_calls: u32,
}

impl Default for PeripheralState {
    fn default() -> Self {
        Self {
            present: true,
            clicks: VecDeque::new(),
            ticks: 0,
            fail_polls: false,
            indicator: false,
            begin_calls: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockPeripheral(pub Rc<RefCell<PeripheralState>>);

impl MockPeripheral {
    pub fn click(&self, tick: Tick) {
        self.0.borrow_mut().clicks.push_back(tick);
    }

    pub fn set_present(&self, present: bool) {
        self.0.borrow_mut().present = present;
    }

    pub fn set_ticks(&self, ticks: Tick) {
        self.0.borrow_mut().ticks = ticks;
    }

    pub fn set_fail_polls(&self, fail: bool) {
        self.0.borrow_mut().fail_polls = fail;
    }

    pub fn pending(&self) -> usize {
        self.0.borrow().clicks.len()
    }
}

impl ButtonPeripheral for MockPeripheral {
    fn begin(&mut self) -> bool {
        let mut s = self.0.borrow_mut();
        s.begin_calls += 1;
        s.present
    }

    fn queue_empty(&mut self) -> Result<bool, PeripheralError> {
        let s = self.0.borrow();
        if s.fail_polls {
            return Err(PeripheralError::Bus);
        }
        Ok(s.clicks.is_empty())
    }

    fn pop_queue(&mut self) -> Result<Tick, PeripheralError> {
        let mut s = self.0.borrow_mut();
        if s.fail_polls {
            return Err(PeripheralError::Bus);
        }
        s.clicks.pop_front().ok_or(PeripheralError::InvalidData)
    }

    fn ticks(&mut self) -> Result<Tick, PeripheralError> {
        let s = self.0.borrow();
        if s.present { Ok(s.ticks) } else { Err(PeripheralError::Bus) }
    }

    fn set_indicator(&mut self, on: bool) -> Result<(), PeripheralError> {
        self.0.borrow_mut().indicator = on;
        Ok(())
    }
}

// ── Register-level I2C button ─────────────────────────────────

#[derive(Debug, Default)]
pub struct I2cButtonState {
    pub clicks: VecDeque<u32>,
    pub ticks: u32,
    pub brightness: u8,
    pub nack: bool,
    /// Fail the next N pop acknowledges.
    pub fail_acks: u32,
    pointer: u8,
}

/// I2C bus with the queued button answering at its default address.
#[derive(Debug, Clone, Default)]
pub struct MockI2cButton(pub Rc<RefCell<I2cButtonState>>);

impl MockI2cButton {
    pub fn click(&self, tick: u32) {
        self.0.borrow_mut().clicks.push_back(tick);
    }
}

impl i2c::ErrorType for MockI2cButton {
    type Error = ErrorKind;
}

impl I2c for MockI2cButton {
    fn transaction(
        &mut self,
        _address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), ErrorKind> {
        let mut s = self.0.borrow_mut();
        if s.nack {
            return Err(ErrorKind::Other);
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    s.pointer = bytes[0];
                    if let Some(&value) = bytes.get(1) {
                        match s.pointer {
                            reg::CLICK_QUEUE_STATUS if value & 1 != 0 => {
                                if s.fail_acks > 0 {
                                    s.fail_acks -= 1;
                                    return Err(ErrorKind::Other);
                                }
                                s.clicks.pop_front();
                            }
                            reg::LED_BRIGHTNESS => s.brightness = value,
                            _ => {}
                        }
                    }
                }
                Operation::Read(buf) => {
                    let bytes: [u8; 4] = match s.pointer {
                        reg::ID => [DEVICE_ID, 0, 0, 0],
                        reg::CLICK_QUEUE_STATUS => {
                            [if s.clicks.is_empty() { 0b010 } else { 0 }, 0, 0, 0]
                        }
                        reg::CLICK_QUEUE_FRONT => {
                            s.clicks.front().copied().unwrap_or(0).to_le_bytes()
                        }
                        reg::TICKS => s.ticks.to_le_bytes(),
                        reg::LED_BRIGHTNESS => [s.brightness, 0, 0, 0],
                        _ => [0; 4],
                    };
                    let n = buf.len().min(4);
                    buf[..n].copy_from_slice(&bytes[..n]);
                }
            }
        }
        Ok(())
    }
}

// ── Recording sink ────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn states(&self) -> Vec<LoopState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::StateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig: a control loop wired to all of the above ─────────────

pub type MockDetector = PressDetector<MockPin, MockLed, MockPeripheral>;

pub struct Rig<const N: usize = DEFAULT_QUEUE_CAPACITY> {
    pub clock: SimClock,
    pub board: MockBoard,
    pub pin: MockPin,
    pub led: MockLed,
    pub peripheral: MockPeripheral,
    pub detector: MockDetector,
    pub sink: RecordingSink,
    pub control: ControlLoop<N>,
}

impl Rig {
    pub fn new(config: DeviceConfig) -> Self {
        Self::with_capacity(config)
    }
}

impl<const N: usize> Rig<N> {
    pub fn with_capacity(config: DeviceConfig) -> Self {
        let clock = SimClock::default();
        let pin = MockPin::new();
        let led = MockLed::default();
        let peripheral = MockPeripheral::default();
        let detector = PressDetector::new(
            ButtonDriver::active_low(pin.clone()),
            StatusLed::new(led.clone()),
            peripheral.clone(),
        );
        Self {
            board: MockBoard::new(clock.clone()),
            clock,
            pin,
            led,
            peripheral,
            detector,
            sink: RecordingSink::default(),
            control: ControlLoop::new(config, &credentials()),
        }
    }

    pub fn state(&self) -> LoopState {
        self.control.state()
    }

    /// One step without advancing time; returns the requested delay.
    pub fn step(&mut self) -> u32 {
        self.control
            .step(&mut self.board, &mut self.detector, &mut self.sink)
    }

    /// Step, then sleep for the requested delay (at least 1 ms).
    pub fn step_and_wait(&mut self) {
        let wait = self.step();
        self.clock.advance(u64::from(wait.max(1)));
    }

    /// Keep stepping until `ms` of simulated time have passed.
    pub fn run_for(&mut self, ms: u64) {
        let end = self.clock.now_ms() + ms;
        while self.clock.now_ms() < end {
            self.step_and_wait();
        }
    }

    /// Network up, clock synced so that the anchor lands on [`ANCHOR_WALL`],
    /// then step until the loop leaves `InitPeripheral`.
    pub fn bring_up(&mut self) {
        self.board.connected = true;
        self.board.utc_offset = Ok(0);
        self.board.device_base_secs = ANCHOR_WALL - self.clock.now_ms() as f64 / 1000.0;
        for _ in 0..3 {
            self.step();
        }
    }

    /// A GPIO press recognised on the next step, released afterwards.
    pub fn press_button(&mut self) {
        self.pin.press();
        self.step_and_wait();
        self.pin.release();
        self.step_and_wait();
    }
}
