//! Timing parameters of a periodic task.

use std::time::Duration;

use ptask_errors::{PtaskResult, ensure_arg};

use crate::policy::SchedPolicy;

/// Timing and priority parameters of a periodic task.
///
/// `deadline` is relative to each activation. `wcet` is a hint for
/// schedulability analysis and is not enforced; zero means unknown.
///
/// # Example
///
/// ```
/// use ptask_scheduler::TaskParams;
/// use std::time::Duration;
///
/// let params = TaskParams::from_millis(20).with_deadline(Duration::from_millis(15));
/// assert_eq!(params.period, Duration::from_millis(20));
/// assert_eq!(params.priority, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskParams {
    /// Worst-case execution time hint.
    pub wcet: Duration,
    /// Activation period.
    pub period: Duration,
    /// Relative deadline.
    pub deadline: Duration,
    /// Scheduling priority; must be zero under the time-shared policy.
    pub priority: u8,
}

impl TaskParams {
    /// Parameters with the given period, deadline equal to the period and
    /// priority zero.
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self {
            wcet: Duration::ZERO,
            period,
            deadline: period,
            priority: 0,
        }
    }

    /// Same as [`TaskParams::new`] with the period in milliseconds.
    #[must_use]
    pub const fn from_millis(period_ms: u64) -> Self {
        Self::new(Duration::from_millis(period_ms))
    }

    /// Set the relative deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Set the worst-case execution time hint.
    #[must_use]
    pub const fn with_wcet(mut self, wcet: Duration) -> Self {
        self.wcet = wcet;
        self
    }

    /// Validate against the policy tasks will be created with.
    ///
    /// # Errors
    ///
    /// Returns [`ptask_errors::PtaskError::InvalidArgument`] for a zero
    /// period or a priority the policy does not accept.
    pub fn validate(&self, policy: SchedPolicy) -> PtaskResult {
        ensure_arg!(!self.period.is_zero(), "period must be non-zero");
        policy.validate_priority(self.priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptask_errors::PtaskError;

    #[test]
    fn test_deadline_defaults_to_period() {
        let params = TaskParams::from_millis(10);
        assert_eq!(params.deadline, params.period);
        assert_eq!(params.wcet, Duration::ZERO);
    }

    #[test]
    fn test_zero_period_rejected() {
        let params = TaskParams::default();
        assert_eq!(
            params.validate(SchedPolicy::TimeShared),
            Err(PtaskError::InvalidArgument("period must be non-zero"))
        );
    }

    #[test]
    fn test_priority_checked_against_policy() {
        let params = TaskParams::from_millis(5).with_priority(20);
        assert!(params.validate(SchedPolicy::TimeShared).is_err());
        assert!(params.validate(SchedPolicy::Fifo).is_ok());
        assert!(TaskParams::from_millis(5).validate(SchedPolicy::RoundRobin).is_err());
    }
}
