//! WhenPress Firmware: Main Entry Point
//!
//! Bring-up only: build the adapters, load credentials, hand everything
//! to the control loop.  All behaviour lives in the library.  With the
//! `rtc` feature an RV-8803 on the Qwiic bus backs up SNTP as wall clock.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  TcpProbe        Esp32TimeAdapter   EspHttpClient              │
//! │  (Connectivity)  (Time+Monotonic)   (HttpClient)               │
//! │  NvsAdapter      LogEventSink       PressDetector              │
//! │  (Credentials)   (EventSink)        (GPIO + QueuedButton)      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              ControlLoop (pure logic)                  │    │
//! │  │  Clock · Queue · Delivery · Ping                       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

#[cfg(feature = "rtc")]
use core::cell::RefCell;

use anyhow::Result;
#[cfg(feature = "rtc")]
use embedded_hal_bus::i2c::RefCellDevice;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{PinDriver, Pull};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::prelude::*;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{error, info, warn};

use whenpress::adapters::board::BoardAdapter;
use whenpress::adapters::credentials::BuildTimeCredentials;
use whenpress::adapters::http::EspHttpClient;
use whenpress::adapters::log_sink::LogEventSink;
use whenpress::adapters::network::TcpProbe;
use whenpress::adapters::nvs::NvsAdapter;
use whenpress::adapters::time::Esp32TimeAdapter;
#[cfg(feature = "rtc")]
use whenpress::adapters::time::{FallbackTimeSource, RtcTimeSource};
use whenpress::app::ports::CredentialStore;
use whenpress::app::service::ControlLoop;
use whenpress::config::Credentials;
use whenpress::detector::PressDetector;
use whenpress::drivers::button::ButtonDriver;
use whenpress::drivers::queued_button::QueuedButton;
#[cfg(feature = "rtc")]
use whenpress::drivers::rtc::Rv8803;
use whenpress::drivers::status_led::StatusLed;

const WIFI_SSID: Option<&str> = option_env!("WHENPRESS_WIFI_SSID");
const WIFI_PASS: Option<&str> = option_env!("WHENPRESS_WIFI_PASS");

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  WhenPress v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Config + credentials ───────────────────────────────
    let nvs = NvsAdapter::new(nvs_partition.clone())?;
    let config = nvs.load_config();
    let creds = match load_credentials(&nvs) {
        Some(c) => c,
        None => {
            error!("No usable credentials, halting");
            loop {
                FreeRtos::delay_ms(60_000);
            }
        }
    };
    info!("Device '{}' → {}", creds.device_name, creds.base_url);

    // ── 3. Network uplink ─────────────────────────────────────
    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs_partition))?,
        sysloop,
    )?;
    if let (Some(ssid), Some(pass)) = (WIFI_SSID, WIFI_PASS) {
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| anyhow::anyhow!("SSID too long"))?,
            password: pass.try_into().map_err(|_| anyhow::anyhow!("WiFi password too long"))?,
            auth_method: if pass.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        }))?;
        wifi.start()?;
        // The control loop waits for connectivity; a failure here is not fatal.
        if let Err(e) = wifi.connect().and_then(|()| wifi.wait_netif_up()) {
            warn!("WiFi connect failed ({}), continuing", e);
        }
    } else {
        warn!("WHENPRESS_WIFI_SSID not set at build time; no uplink");
    }

    // ── 4. Inputs ─────────────────────────────────────────────
    let mut button_pin = PinDriver::input(peripherals.pins.gpio9)?;
    button_pin.set_pull(Pull::Up)?;
    let led_pin = PinDriver::output(peripherals.pins.gpio8)?;

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio6,
        peripherals.pins.gpio7,
        &I2cConfig::new().baudrate(100.kHz().into()),
    )?;

    // The RTC variant shares the Qwiic bus between button and clock.
    #[cfg(feature = "rtc")]
    let bus = RefCell::new(i2c);
    #[cfg(feature = "rtc")]
    let button_bus = RefCellDevice::new(&bus);
    #[cfg(not(feature = "rtc"))]
    let button_bus = i2c;

    let mut detector = PressDetector::new(
        ButtonDriver::active_low(button_pin),
        StatusLed::new(led_pin),
        QueuedButton::new(button_bus),
    );

    // ── 5. Board + loop ───────────────────────────────────────
    #[cfg(feature = "rtc")]
    let time = FallbackTimeSource::new(
        Esp32TimeAdapter::new()?,
        RtcTimeSource::new(Rv8803::new(RefCellDevice::new(&bus))),
    );
    #[cfg(not(feature = "rtc"))]
    let time = Esp32TimeAdapter::new()?;

    let mut board = BoardAdapter::new(TcpProbe::from_config(&config), time, EspHttpClient::new()?);
    let mut sink = LogEventSink::new();
    let mut control: ControlLoop = ControlLoop::new(config, &creds);

    info!("System ready. Entering control loop.");
    control.run(&mut board, &mut detector, &mut sink, &mut FreeRtos)
}

/// NVS first, then values baked in at build time.
fn load_credentials(nvs: &NvsAdapter) -> Option<Credentials> {
    match nvs.load() {
        Ok(c) => return Some(c),
        Err(e) => warn!("NVS credentials unavailable: {}", e),
    }
    match BuildTimeCredentials::new().load() {
        Ok(c) => Some(c),
        Err(e) => {
            error!("Build-time credentials unavailable: {}", e);
            None
        }
    }
}
