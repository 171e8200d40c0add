//! Fallback clock for non-Linux systems, anchored on the first reading of
//! `std::time::Instant`.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

static ORIGIN: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds since the process-wide origin.
pub(crate) fn now_ns() -> u64 {
    let origin = ORIGIN.get_or_init(Instant::now);
    u64::try_from(origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// Sleep until `target_ns`, re-sleeping on early wake-ups.
pub(crate) fn sleep_until_ns(target_ns: u64) {
    loop {
        let now = now_ns();
        if now >= target_ns {
            return;
        }
        std::thread::sleep(Duration::from_nanos(target_ns - now));
    }
}
