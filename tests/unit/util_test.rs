//! Tests for clock and telemetry helpers

use happydomain_checks::util::{init_tracing, init_tracing_with, now_ms, Clock, ManualClock, SystemClock};
use std::time::Duration;

#[test]
fn test_manual_clock_moves_only_when_told() {
    let clock = ManualClock::new(1_000);
    assert_eq!(clock.now_ms(), 1_000);

    clock.advance(Duration::from_secs(2));
    assert_eq!(clock.now_ms(), 3_000);

    clock.set(10);
    assert_eq!(clock.now_ms(), 10);
}

#[test]
fn test_manual_clock_clones_share_time() {
    let clock = ManualClock::new(0);
    let shared = clock.clone();
    clock.advance(Duration::from_millis(5));
    assert_eq!(shared.now_ms(), 5);
}

#[test]
fn test_system_clock_tracks_wall_time() {
    let before = now_ms();
    let observed = SystemClock.now_ms();
    assert!(observed >= before);
    assert!(ManualClock::starting_now().now_ms() >= before);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    init_tracing_with("debug");
}
