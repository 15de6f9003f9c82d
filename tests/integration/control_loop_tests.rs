//! Integration tests for the ControlLoop state machine.
//!
//! Drive the loop step by step against [`MockBoard`] and a
//! [`PressDetector`](whenpress::detector::PressDetector) built from mock
//! pins and a mock queued peripheral, with a simulated clock.

use crate::mock_hw::{assert_close, data_url, ping_url, Rig, ANCHOR_WALL};

use whenpress::app::events::AppEvent;
use whenpress::app::service::LoopState;
use whenpress::clock::{DeviceEpoch, Y2000_UNIX_OFFSET_SECS};
use whenpress::config::DeviceConfig;
use whenpress::error::{ClockError, DeliveryError};

fn default_rig() -> Rig {
    Rig::new(DeviceConfig::default())
}

// ── Start-up gating ───────────────────────────────────────────

#[test]
fn end_to_end_startup_press_and_ping() {
    let mut rig = default_rig();

    // No connectivity: blocked, probing every 5 s.
    assert_eq!(rig.step(), 5_000);
    assert_eq!(rig.state(), LoopState::WaitForConnectivity);
    rig.clock.advance(5_000);
    assert_eq!(rig.step(), 5_000);
    assert_eq!(rig.state(), LoopState::WaitForConnectivity);

    // Connectivity up, clock not yet available.
    rig.board.connected = true;
    rig.step();
    assert_eq!(rig.state(), LoopState::WaitForClock);
    assert_eq!(rig.step(), 5_000);
    assert_eq!(rig.state(), LoopState::WaitForClock);
    rig.clock.advance(5_000);

    // Clock arrives at offset 0; anchor lands on 1_700_000_000 / tick 0.
    rig.board.utc_offset = Ok(0);
    rig.board.device_base_secs = ANCHOR_WALL - rig.clock.now_ms() as f64 / 1000.0;
    rig.step();
    assert_eq!(rig.state(), LoopState::InitPeripheral);
    rig.step();
    assert_eq!(rig.state(), LoopState::Running);

    let anchor = rig.control.clock().current_anchor().unwrap();
    assert_close(anchor.anchor_wall_time, ANCHOR_WALL);
    assert_eq!(anchor.anchor_tick_value, 0);
    let started_ms = rig.clock.now_ms();

    // One GPIO press: queued, then posted with the current wall time.
    rig.pin.press();
    rig.step();
    rig.pin.release();
    assert_eq!(rig.board.posts.len(), 1);
    let post = &rig.board.posts[0];
    assert_eq!(post.url, data_url());
    assert_close(post.body["pressTimestamp"].as_f64().unwrap(), ANCHOR_WALL);
    assert_eq!(post.body["password"], "hunter2");
    assert!(rig.control.queue().is_empty());

    // 300 s later the ping goes out and resets the cadence.
    rig.clock.advance(300_000);
    rig.step();
    let pings = rig.board.ping_posts();
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].body, serde_json::json!({ "password": "hunter2" }));
    assert_eq!(rig.control.ping_state().last_ping_ms(), started_ms + 300_000);

    assert_eq!(
        rig.sink.states(),
        vec![
            LoopState::WaitForClock,
            LoopState::InitPeripheral,
            LoopState::Running
        ]
    );
}

#[test]
fn nothing_is_posted_before_running() {
    let mut rig = default_rig();
    rig.board.connected = true;
    rig.pin.press();
    for _ in 0..10 {
        rig.step_and_wait();
    }
    assert_eq!(rig.state(), LoopState::WaitForClock);
    assert!(rig.board.posts.is_empty());
    assert!(rig.control.queue().is_empty());
}

#[test]
fn transient_clock_errors_are_retried() {
    let mut rig = default_rig();
    rig.board.connected = true;
    rig.board.utc_offset = Err(ClockError::QueryFailed);
    rig.step();
    for _ in 0..3 {
        assert_eq!(rig.step(), 5_000);
    }
    rig.board.utc_offset = Ok(0);
    rig.step();
    assert_eq!(rig.state(), LoopState::InitPeripheral);
}

// ── Clock reconciliation ──────────────────────────────────────

#[test]
fn peripheral_click_converted_through_anchor() {
    let mut rig = default_rig();
    rig.bring_up();

    rig.peripheral.click(1_500);
    rig.step();

    let post = &rig.board.data_posts()[0];
    assert_close(
        post.body["pressTimestamp"].as_f64().unwrap(),
        ANCHOR_WALL + 1.5,
    );
}

#[test]
fn click_across_tick_wrap_converts_forward() {
    let mut rig = default_rig();
    rig.peripheral.set_ticks(u32::MAX - 499);
    rig.bring_up();
    assert_eq!(rig.state(), LoopState::Running);

    rig.peripheral.click(1_000);
    rig.step();

    let post = &rig.board.data_posts()[0];
    assert_close(
        post.body["pressTimestamp"].as_f64().unwrap(),
        ANCHOR_WALL + 1.5,
    );
}

#[test]
fn clicks_during_outage_keep_their_press_time() {
    let mut rig = default_rig();
    rig.bring_up();

    rig.board.script([Err(DeliveryError::Transport); 20]);
    rig.peripheral.click(2_000);
    rig.peripheral.click(4_000);
    rig.run_for(2_000);
    assert_eq!(rig.control.queue().len(), 2);

    rig.board.responses.clear();
    rig.run_for(500);

    let sent: Vec<f64> = rig
        .board
        .data_posts()
        .iter()
        .skip(20)
        .map(|p| p.body["pressTimestamp"].as_f64().unwrap())
        .collect();
    assert_eq!(sent.len(), 2);
    assert_close(sent[0], ANCHOR_WALL + 2.0);
    assert_close(sent[1], ANCHOR_WALL + 4.0);
}

#[test]
fn modem_clock_counting_from_2000_stamps_utc() {
    let mut rig = default_rig();
    // Local time one hour ahead of UTC, counted from 2000-01-01.
    rig.board.connected = true;
    rig.board.epoch = DeviceEpoch::Y2000;
    rig.board.utc_offset = Ok(-3_600);
    rig.board.device_base_secs = ANCHOR_WALL - Y2000_UNIX_OFFSET_SECS as f64 + 3_600.0;
    for _ in 0..3 {
        rig.step();
    }
    assert_eq!(rig.state(), LoopState::Running);
    assert_close(
        rig.control.clock().current_anchor().unwrap().anchor_wall_time,
        ANCHOR_WALL,
    );

    rig.press_button();
    rig.peripheral.click(2_000);
    rig.step();

    let sent: Vec<f64> = rig
        .board
        .data_posts()
        .iter()
        .map(|p| p.body["pressTimestamp"].as_f64().unwrap())
        .collect();
    assert_eq!(sent.len(), 2);
    assert_close(sent[0], ANCHOR_WALL);
    assert_close(sent[1], ANCHOR_WALL + 2.0);
}

#[test]
fn periodic_reanchor_emits_new_anchor() {
    let config = DeviceConfig {
        reanchor_interval_secs: 60,
        ..DeviceConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.bring_up();
    let anchored = |rig: &Rig| rig.sink.count(|e| matches!(e, AppEvent::Anchored { .. }));
    assert_eq!(anchored(&rig), 1);

    rig.peripheral.set_ticks(60_000);
    rig.run_for(60_001);
    assert_eq!(anchored(&rig), 2);
    let anchor = rig.control.clock().current_anchor().unwrap();
    assert_eq!(anchor.anchor_tick_value, 60_000);
}

#[test]
fn failed_reanchor_keeps_previous_anchor() {
    let config = DeviceConfig {
        reanchor_interval_secs: 60,
        ..DeviceConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.bring_up();
    let before = rig.control.clock().current_anchor().unwrap();

    rig.peripheral.set_present(false);
    rig.run_for(60_001);

    assert!(rig.sink.count(|e| matches!(e, AppEvent::AnchorFailed(_))) >= 1);
    assert_eq!(rig.control.clock().current_anchor(), Some(before));
}

#[test]
fn stale_anchor_converts_clicks_past_half_counter_range() {
    const THIRTY_DAYS_MS: u64 = 30 * 86_400_000;
    let mut rig = default_rig();
    rig.bring_up();

    // Tick reads fail from now on, so every re-anchor is rejected while
    // polling keeps working.
    rig.peripheral.set_present(false);
    rig.clock.advance(THIRTY_DAYS_MS);
    rig.peripheral.click(THIRTY_DAYS_MS as u32);
    rig.step();

    assert_eq!(rig.state(), LoopState::Running);
    assert!(rig.sink.count(|e| matches!(e, AppEvent::AnchorFailed(_))) >= 1);
    let post = &rig.board.data_posts()[0];
    assert_close(
        post.body["pressTimestamp"].as_f64().unwrap(),
        ANCHOR_WALL + (THIRTY_DAYS_MS / 1000) as f64,
    );
}

// ── Delivery ──────────────────────────────────────────────────

#[test]
fn failing_event_is_delivered_exactly_once_after_retries() {
    let mut rig = default_rig();
    rig.bring_up();
    rig.board.script([
        Err(DeliveryError::Transport),
        Ok(500),
        Ok(503),
        Ok(200),
    ]);

    rig.press_button();
    rig.run_for(1_000);

    let posts = rig.board.data_posts();
    assert_eq!(posts.len(), 4);
    assert!(posts.windows(2).all(|w| w[0].body == w[1].body));
    assert!(rig.control.queue().is_empty());
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::EventSent { .. })), 1);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::DeliveryFailed { .. })),
        3
    );
}

#[test]
fn at_most_one_post_per_iteration() {
    let mut rig = default_rig();
    rig.bring_up();
    for tick in [100, 200, 300] {
        rig.peripheral.click(tick);
    }
    rig.step();
    assert_eq!(rig.board.posts.len(), 1);
    assert_eq!(rig.control.queue().len(), 2);
    rig.step();
    rig.step();
    assert_eq!(rig.board.posts.len(), 3);
    assert!(rig.control.queue().is_empty());
}

#[test]
fn persistent_rejection_is_dead_lettered() {
    let config = DeviceConfig {
        max_rejections: 3,
        ..DeviceConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.bring_up();
    rig.board.script([Ok(401), Ok(401), Ok(401)]);

    rig.peripheral.click(100);
    rig.peripheral.click(200);
    rig.run_for(1_000);

    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::DeadLettered { .. })), 1);
    let sent: Vec<f64> = rig
        .board
        .data_posts()
        .iter()
        .map(|p| p.body["pressTimestamp"].as_f64().unwrap())
        .collect();
    assert_eq!(sent.len(), 4);
    assert_close(sent[3], ANCHOR_WALL + 0.2);
    assert!(rig.control.queue().is_empty());
}

#[test]
fn rate_limited_event_is_never_dropped() {
    let config = DeviceConfig {
        max_rejections: 1,
        ..DeviceConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.bring_up();
    rig.board.script([Ok(429), Ok(408), Ok(429)]);
    rig.peripheral.click(100);
    rig.run_for(1_000);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::DeadLettered { .. })), 0);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::EventSent { .. })), 1);
}

#[test]
fn full_queue_evicts_oldest() {
    let mut rig: Rig<2> = Rig::with_capacity(DeviceConfig::default());
    rig.bring_up();
    rig.board.script([Err(DeliveryError::Transport); 3]);

    rig.peripheral.click(100);
    rig.step();
    rig.peripheral.click(200);
    rig.step();
    rig.peripheral.click(300);
    rig.step();

    let evicted: Vec<f64> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::EventEvicted(ev) => Some(ev.press_timestamp()),
            _ => None,
        })
        .collect();
    assert_eq!(evicted.len(), 1);
    assert_close(evicted[0], ANCHOR_WALL + 0.1);
    assert_eq!(rig.control.queue().len(), 2);
}

// ── Ping cadence ──────────────────────────────────────────────

#[test]
fn ping_fires_once_per_period() {
    let mut rig = default_rig();
    rig.bring_up();
    let start = rig.clock.now_ms();

    rig.run_for(3 * 300_000 + 1);

    let at: Vec<u64> = rig.board.ping_posts().iter().map(|p| p.at_ms - start).collect();
    assert_eq!(at, vec![300_000, 600_000, 900_000]);
}

#[test]
fn failed_ping_retries_next_iteration() {
    let mut rig = default_rig();
    rig.bring_up();
    let start = rig.clock.now_ms();
    rig.board.script([Ok(502)]);

    rig.run_for(300_101);

    let at: Vec<u64> = rig.board.ping_posts().iter().map(|p| p.at_ms - start).collect();
    assert_eq!(at, vec![300_000, 300_100]);
    assert_eq!(rig.control.ping_state().last_ping_ms(), start + 300_100);
}

#[test]
fn delivery_suppresses_ping_when_enabled() {
    let config = DeviceConfig {
        ping_suppressed_by_delivery: true,
        ..DeviceConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.bring_up();
    let start = rig.clock.now_ms();

    rig.run_for(200_000);
    rig.press_button();
    rig.run_for(150_000);

    assert!(rig.board.ping_posts().is_empty());
    rig.run_for(200_000);
    let pings = rig.board.ping_posts();
    assert_eq!(pings.len(), 1);
    assert!(pings[0].at_ms - start >= 500_000);
}

// ── Peripheral lifecycle ──────────────────────────────────────

#[test]
fn absent_peripheral_degrades_but_gpio_still_delivers() {
    let config = DeviceConfig {
        peripheral_init_attempts: 3,
        ..DeviceConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.peripheral.set_present(false);
    rig.bring_up();
    assert_eq!(rig.state(), LoopState::InitPeripheral);

    rig.run_for(3_000);
    assert_eq!(rig.state(), LoopState::Degraded);
    assert_eq!(rig.peripheral.0.borrow().begin_calls, 3);

    rig.press_button();
    assert_eq!(rig.board.data_posts().len(), 1);

    // Ping cadence keeps running while degraded.
    rig.run_for(300_000);
    assert_eq!(rig.board.ping_posts().len(), 1);
}

#[test]
fn degraded_recovers_when_peripheral_returns() {
    let config = DeviceConfig {
        peripheral_init_attempts: 1,
        ..DeviceConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.peripheral.set_present(false);
    rig.bring_up();
    assert_eq!(rig.state(), LoopState::Degraded);

    rig.peripheral.set_present(true);
    rig.peripheral.click(5);
    rig.run_for(29_000);
    assert_eq!(rig.state(), LoopState::Degraded);
    assert_eq!(rig.peripheral.pending(), 1, "peripheral untouched while degraded");

    rig.run_for(2_000);
    assert_eq!(rig.state(), LoopState::Running);
    assert_eq!(rig.peripheral.pending(), 0);
    assert!(rig.control.clock().current_anchor().is_some());
}

#[test]
fn repeated_poll_faults_degrade() {
    let config = DeviceConfig {
        max_consecutive_peripheral_errors: 3,
        ..DeviceConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.bring_up();
    rig.peripheral.set_fail_polls(true);

    rig.step();
    rig.step();
    assert_eq!(rig.state(), LoopState::Running);
    assert_eq!(rig.control.peripheral_errors(), 2);
    rig.step();
    assert_eq!(rig.state(), LoopState::Degraded);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::PeripheralFault(_))), 3);

    // GPIO-only polling while degraded raises no further faults.
    rig.step();
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::PeripheralFault(_))), 3);
}

#[test]
fn intermittent_poll_fault_resets_count() {
    let config = DeviceConfig {
        max_consecutive_peripheral_errors: 2,
        ..DeviceConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.bring_up();
    for _ in 0..5 {
        rig.peripheral.set_fail_polls(true);
        rig.step();
        rig.peripheral.set_fail_polls(false);
        rig.step();
    }
    assert_eq!(rig.state(), LoopState::Running);
    assert_eq!(rig.control.peripheral_errors(), 0);
}

#[test]
fn status_led_toggles_per_press() {
    let mut rig = default_rig();
    rig.bring_up();
    assert!(!rig.led.is_lit());
    rig.press_button();
    assert!(rig.led.is_lit());
    assert!(rig.peripheral.0.borrow().indicator);
    rig.press_button();
    assert!(!rig.led.is_lit());
    assert_eq!(rig.board.posts.iter().filter(|p| p.url == ping_url()).count(), 0);
}
