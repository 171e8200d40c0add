//! Absolute monotonic time points.

use core::fmt;
use core::ops::{Add, AddAssign, Sub};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{NANOS_PER_MILLI, NANOS_PER_SEC};

/// A point on a monotonic clock, in nanoseconds since the clock's origin.
///
/// Arithmetic saturates instead of wrapping: a timestamp is at most
/// `u64::MAX` nanoseconds (about 584 years) past the origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp {
    nanos: u64,
}

impl Timestamp {
    /// The clock origin.
    pub const ZERO: Timestamp = Timestamp { nanos: 0 };

    /// Create a timestamp from nanoseconds since the origin.
    #[inline]
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Create a timestamp from milliseconds since the origin.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            nanos: millis.saturating_mul(NANOS_PER_MILLI),
        }
    }

    /// Nanoseconds since the origin.
    #[inline]
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.nanos
    }

    /// Whole seconds and the sub-second nanosecond remainder.
    #[inline]
    #[must_use]
    pub const fn as_secs_nanos(self) -> (u64, u32) {
        // The remainder is below 10^9 and always fits in u32.
        (self.nanos / NANOS_PER_SEC, (self.nanos % NANOS_PER_SEC) as u32)
    }

    /// Return this timestamp advanced by `ms` milliseconds.
    #[inline]
    #[must_use]
    pub const fn add_ms(self, ms: u64) -> Self {
        Self {
            nanos: self.nanos.saturating_add(ms.saturating_mul(NANOS_PER_MILLI)),
        }
    }

    /// Return this timestamp advanced by `d`.
    #[inline]
    #[must_use]
    pub fn saturating_add(self, d: Duration) -> Self {
        let step = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        Self {
            nanos: self.nanos.saturating_add(step),
        }
    }

    /// Time elapsed from `earlier` to `self`, or `None` if `earlier` is later.
    #[inline]
    #[must_use]
    pub fn checked_duration_since(self, earlier: Timestamp) -> Option<Duration> {
        self.nanos.checked_sub(earlier.nanos).map(Duration::from_nanos)
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    #[inline]
    #[must_use]
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        self.checked_duration_since(earlier).unwrap_or(Duration::ZERO)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn add(self, rhs: Duration) -> Timestamp {
        self.saturating_add(rhs)
    }
}

impl AddAssign<Duration> for Timestamp {
    #[inline]
    fn add_assign(&mut self, rhs: Duration) {
        *self = self.saturating_add(rhs);
    }
}

/// Saturating difference: `later - earlier`, zero when negative.
impl Sub<Timestamp> for Timestamp {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Timestamp) -> Duration {
        self.saturating_duration_since(rhs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (secs, nanos) = self.as_secs_nanos();
        write!(f, "{secs}.{nanos:09}s")
    }
}
