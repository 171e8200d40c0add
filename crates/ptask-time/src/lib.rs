//! Monotonic timestamps and clocks for periodic tasks.
//!
//! Periodic tasks keep absolute activation times and deadlines, and CABs stamp
//! every published value. Both read time through the [`Clock`] trait:
//!
//! - [`MonotonicClock`]: the system monotonic clock; on Linux `sleep_until`
//!   is an absolute `clock_nanosleep` retried on interruption
//! - [`ManualClock`]: a clock driven by the caller, for deterministic tests
//!
//! # Example
//!
//! ```
//! use ptask_time::{Clock, ManualClock, Timestamp};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let deadline = clock.now().add_ms(10);
//! clock.sleep_until(deadline);
//! assert_eq!(clock.now(), Timestamp::from_millis(10));
//! assert_eq!(clock.now() - Timestamp::ZERO, Duration::from_millis(10));
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod clock;
pub mod timestamp;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(not(target_os = "linux"))]
mod fallback;

pub use clock::{Clock, ManualClock, MonotonicClock, SharedClock};
pub use timestamp::Timestamp;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Nanoseconds per millisecond.
pub const NANOS_PER_MILLI: u64 = 1_000_000;
