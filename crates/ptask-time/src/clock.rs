//! Clock abstraction used by periodic tasks and CABs.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::timestamp::Timestamp;

#[cfg(target_os = "linux")]
use crate::linux as platform;

#[cfg(not(target_os = "linux"))]
use crate::fallback as platform;

/// Source of monotonic time that can also suspend the caller.
pub trait Clock: Send + Sync + Debug {
    /// Current time.
    fn now(&self) -> Timestamp;

    /// Suspend the calling thread until `deadline`.
    ///
    /// Must not return before `deadline` has been reached, even when the
    /// underlying sleep is interrupted.
    fn sleep_until(&self, deadline: Timestamp);
}

/// Clock handle shared between the runtime, tasks and CABs.
pub type SharedClock = Arc<dyn Clock>;

/// The system monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    /// Create the clock.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Create a shared handle to the clock.
    #[must_use]
    pub fn shared() -> SharedClock {
        Arc::new(Self)
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Timestamp {
        Timestamp::from_nanos(platform::now_ns())
    }

    fn sleep_until(&self, deadline: Timestamp) {
        platform::sleep_until_ns(deadline.as_nanos());
    }
}

/// A clock that only moves when told to.
///
/// `sleep_until` returns immediately after advancing the clock to the
/// deadline, so timing logic can be tested without real sleeps.
///
/// # Example
///
/// ```
/// use ptask_time::{Clock, ManualClock, Timestamp};
/// use std::time::Duration;
///
/// let clock = ManualClock::starting_at(Timestamp::from_millis(100));
/// clock.advance(Duration::from_millis(10));
/// assert_eq!(clock.now(), Timestamp::from_millis(110));
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    /// Create a clock at the origin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock at `start`.
    #[must_use]
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            nanos: AtomicU64::new(start.as_nanos()),
        }
    }

    /// Move the clock forward by `d`.
    pub fn advance(&self, d: Duration) {
        let step = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        let _previous = self
            .nanos
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_add(step))
            });
    }

    /// Set the clock to `t`. Moving backwards is ignored.
    pub fn set(&self, t: Timestamp) {
        self.nanos.fetch_max(t.as_nanos(), Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Timestamp {
        Timestamp::from_nanos(self.nanos.load(Ordering::Acquire))
    }

    fn sleep_until(&self, deadline: Timestamp) {
        self.set(deadline);
    }
}
