//! Property-based tests for timestamp arithmetic.

use ptask_time::{Clock, ManualClock, Timestamp};
use quickcheck_macros::quickcheck;
use std::time::Duration;

#[quickcheck]
fn add_ms_matches_duration_add(start: u32, ms: u16) -> bool {
    let t = Timestamp::from_nanos(u64::from(start));
    t.add_ms(u64::from(ms)) == t + Duration::from_millis(u64::from(ms))
}

#[quickcheck]
fn duration_since_inverts_add(start: u32, step: u32) -> bool {
    let t = Timestamp::from_nanos(u64::from(start));
    let later = t + Duration::from_nanos(u64::from(step));
    later.checked_duration_since(t) == Some(Duration::from_nanos(u64::from(step)))
}

#[quickcheck]
fn ordering_agrees_with_nanos(a: u64, b: u64) -> bool {
    let (ta, tb) = (Timestamp::from_nanos(a), Timestamp::from_nanos(b));
    ta.cmp(&tb) == a.cmp(&b)
}

#[quickcheck]
fn repeated_add_ms_accumulates_exactly(steps: u8, period_ms: u8) -> bool {
    let period = u64::from(period_ms);
    let mut t = Timestamp::ZERO;
    for _ in 0..steps {
        t = t.add_ms(period);
    }
    t == Timestamp::from_millis(u64::from(steps) * period)
}

#[quickcheck]
fn manual_clock_is_monotonic(moves: Vec<u32>) -> bool {
    let clock = ManualClock::new();
    let mut last = clock.now();
    for m in moves {
        if m % 2 == 0 {
            clock.advance(Duration::from_nanos(u64::from(m)));
        } else {
            clock.sleep_until(Timestamp::from_nanos(u64::from(m)));
        }
        let now = clock.now();
        if now < last {
            return false;
        }
        last = now;
    }
    true
}

#[test]
fn timestamp_serializes_as_plain_nanoseconds() {
    let t = Timestamp::from_millis(110);
    let json = match serde_json::to_string(&t) {
        Ok(json) => json,
        Err(e) => panic!("serialize failed: {e}"),
    };
    assert_eq!(json, "110000000");
    let back: Timestamp = match serde_json::from_str(&json) {
        Ok(back) => back,
        Err(e) => panic!("deserialize failed: {e}"),
    };
    assert_eq!(back, t);
}
