//! Scheduling policy applied to every periodic task.

use core::fmt;
use core::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use ptask_errors::{PtaskError, PtaskResult};
use serde::{Deserialize, Serialize};

/// Lowest priority accepted under a real-time policy.
pub const MIN_RT_PRIORITY: u8 = 1;

/// Highest priority accepted under a real-time policy.
pub const MAX_RT_PRIORITY: u8 = 99;

// Linux policy numbers from <sched.h>.
const SCHED_OTHER: i32 = 0;
const SCHED_FIFO: i32 = 1;
const SCHED_RR: i32 = 2;
const SCHED_DEADLINE: i32 = 6;

const DEADLINE_UNSUPPORTED: &str = "SCHED_DEADLINE is not supported";
const UNKNOWN_POLICY: &str = "unknown scheduling policy";

/// Thread scheduling policy for periodic tasks.
///
/// Only the fixed-priority real-time policies and the default time-shared
/// policy are supported. Reservation-based scheduling (`SCHED_DEADLINE`) is
/// rejected by every untyped entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SchedPolicy {
    /// `SCHED_OTHER`: the kernel's fair scheduler, priority must be zero.
    #[default]
    TimeShared = 0,
    /// `SCHED_RR`: fixed priority with time slicing among equals.
    RoundRobin = 1,
    /// `SCHED_FIFO`: fixed priority, run until blocked or preempted.
    Fifo = 2,
}

impl SchedPolicy {
    /// Check whether this is a real-time policy.
    #[must_use]
    pub const fn is_real_time(self) -> bool {
        !matches!(self, SchedPolicy::TimeShared)
    }

    /// Native Linux policy number.
    #[must_use]
    pub const fn native(self) -> i32 {
        match self {
            SchedPolicy::TimeShared => SCHED_OTHER,
            SchedPolicy::RoundRobin => SCHED_RR,
            SchedPolicy::Fifo => SCHED_FIFO,
        }
    }

    /// Configuration name of the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SchedPolicy::TimeShared => "time_shared",
            SchedPolicy::RoundRobin => "round_robin",
            SchedPolicy::Fifo => "fifo",
        }
    }

    /// Check that `priority` is usable under this policy.
    ///
    /// The time-shared policy only accepts zero; real-time policies accept
    /// `MIN_RT_PRIORITY..=MAX_RT_PRIORITY`.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidArgument`] when the priority does not fit.
    pub fn validate_priority(self, priority: u8) -> PtaskResult {
        match self {
            SchedPolicy::TimeShared if priority != 0 => Err(PtaskError::InvalidArgument(
                "time-shared tasks must have priority 0",
            )),
            SchedPolicy::RoundRobin | SchedPolicy::Fifo if priority < MIN_RT_PRIORITY => Err(
                PtaskError::InvalidArgument("real-time tasks need a non-zero priority"),
            ),
            SchedPolicy::RoundRobin | SchedPolicy::Fifo if priority > MAX_RT_PRIORITY => Err(
                PtaskError::InvalidArgument("real-time priority above 99"),
            ),
            _ => Ok(()),
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SchedPolicy::RoundRobin,
            2 => SchedPolicy::Fifo,
            _ => SchedPolicy::TimeShared,
        }
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i32> for SchedPolicy {
    type Error = PtaskError;

    fn try_from(native: i32) -> Result<Self, Self::Error> {
        match native {
            SCHED_OTHER => Ok(SchedPolicy::TimeShared),
            SCHED_RR => Ok(SchedPolicy::RoundRobin),
            SCHED_FIFO => Ok(SchedPolicy::Fifo),
            SCHED_DEADLINE => Err(PtaskError::InvalidArgument(DEADLINE_UNSUPPORTED)),
            _ => Err(PtaskError::InvalidArgument(UNKNOWN_POLICY)),
        }
    }
}

impl FromStr for SchedPolicy {
    type Err = PtaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "time_shared" | "timeshared" | "other" | "normal" => Ok(SchedPolicy::TimeShared),
            "round_robin" | "rr" => Ok(SchedPolicy::RoundRobin),
            "fifo" => Ok(SchedPolicy::Fifo),
            "deadline" => Err(PtaskError::InvalidArgument(DEADLINE_UNSUPPORTED)),
            _ => Err(PtaskError::InvalidArgument(UNKNOWN_POLICY)),
        }
    }
}

/// Atomically readable and writable [`SchedPolicy`].
#[derive(Debug, Default)]
pub struct PolicyCell(AtomicU8);

impl PolicyCell {
    /// Create a cell holding `policy`.
    #[must_use]
    pub const fn new(policy: SchedPolicy) -> Self {
        Self(AtomicU8::new(policy as u8))
    }

    /// Current policy.
    #[must_use]
    pub fn load(&self) -> SchedPolicy {
        SchedPolicy::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Replace the policy.
    pub fn store(&self, policy: SchedPolicy) {
        self.0.store(policy as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_numbers_round_trip() {
        for policy in [SchedPolicy::TimeShared, SchedPolicy::RoundRobin, SchedPolicy::Fifo] {
            assert_eq!(SchedPolicy::try_from(policy.native()), Ok(policy));
        }
    }

    #[test]
    fn test_deadline_rejected() {
        assert_eq!(
            SchedPolicy::try_from(SCHED_DEADLINE),
            Err(PtaskError::InvalidArgument(DEADLINE_UNSUPPORTED))
        );
        assert_eq!(
            "deadline".parse::<SchedPolicy>(),
            Err(PtaskError::InvalidArgument(DEADLINE_UNSUPPORTED))
        );
    }

    #[test]
    fn test_unknown_rejected() {
        assert!(SchedPolicy::try_from(3).is_err());
        assert!(SchedPolicy::try_from(-1).is_err());
        assert!("batch".parse::<SchedPolicy>().is_err());
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("RR".parse::<SchedPolicy>(), Ok(SchedPolicy::RoundRobin));
        assert_eq!(" fifo ".parse::<SchedPolicy>(), Ok(SchedPolicy::Fifo));
        assert_eq!("other".parse::<SchedPolicy>(), Ok(SchedPolicy::TimeShared));
    }

    #[test]
    fn test_priority_rules() {
        assert!(SchedPolicy::TimeShared.validate_priority(0).is_ok());
        assert!(SchedPolicy::TimeShared.validate_priority(1).is_err());
        assert!(SchedPolicy::Fifo.validate_priority(0).is_err());
        assert!(SchedPolicy::Fifo.validate_priority(1).is_ok());
        assert!(SchedPolicy::RoundRobin.validate_priority(99).is_ok());
        assert!(SchedPolicy::RoundRobin.validate_priority(100).is_err());
    }

    #[test]
    fn test_policy_cell() {
        let cell = PolicyCell::default();
        assert_eq!(cell.load(), SchedPolicy::TimeShared);
        cell.store(SchedPolicy::Fifo);
        assert_eq!(cell.load(), SchedPolicy::Fifo);
    }

    #[test]
    fn test_serde_names() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&SchedPolicy::RoundRobin)?;
        assert_eq!(json, "\"round_robin\"");
        let back: SchedPolicy = serde_json::from_str("\"fifo\"")?;
        assert_eq!(back, SchedPolicy::Fifo);
        Ok(())
    }
}
