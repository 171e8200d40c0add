//! Linux clock access through `CLOCK_MONOTONIC`.
#![expect(unsafe_code, reason = "clock_gettime and clock_nanosleep are libc calls")]

use crate::NANOS_PER_SEC;
use libc::{CLOCK_MONOTONIC, EINTR, TIMER_ABSTIME, clock_gettime, clock_nanosleep, timespec};

/// Read `CLOCK_MONOTONIC` in nanoseconds.
pub(crate) fn now_ns() -> u64 {
    let mut ts = timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec for the duration of the call.
    let rc = unsafe { clock_gettime(CLOCK_MONOTONIC, &mut ts) };
    debug_assert_eq!(rc, 0, "CLOCK_MONOTONIC is always available on Linux");
    timespec_to_ns(&ts)
}

/// Sleep until the absolute `CLOCK_MONOTONIC` instant `target_ns`.
///
/// An interrupted sleep is re-entered with the same absolute target, so the
/// call never returns early.
pub(crate) fn sleep_until_ns(target_ns: u64) {
    let ts = ns_to_timespec(target_ns);
    loop {
        // SAFETY: `ts` is a valid timespec and the remainder pointer may be
        // null for absolute sleeps.
        let rc = unsafe { clock_nanosleep(CLOCK_MONOTONIC, TIMER_ABSTIME, &ts, std::ptr::null_mut()) };
        match rc {
            0 => return,
            EINTR => continue,
            _ => break,
        }
    }

    // clock_nanosleep rejected the request (EINVAL on an out-of-range
    // target); fall back to relative sleeps.
    loop {
        let now = now_ns();
        if now >= target_ns {
            return;
        }
        std::thread::sleep(std::time::Duration::from_nanos(target_ns - now));
    }
}

fn timespec_to_ns(ts: &timespec) -> u64 {
    let secs = u64::try_from(ts.tv_sec).unwrap_or(0);
    let nanos = u64::try_from(ts.tv_nsec).unwrap_or(0);
    secs.saturating_mul(NANOS_PER_SEC).saturating_add(nanos)
}

fn ns_to_timespec(ns: u64) -> timespec {
    timespec {
        tv_sec: libc::time_t::try_from(ns / NANOS_PER_SEC).unwrap_or(libc::time_t::MAX),
        // Always below 10^9, fits in every c_long.
        tv_nsec: (ns % NANOS_PER_SEC) as libc::c_long,
    }
}
