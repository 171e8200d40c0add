//! The handle a periodic task body runs with.

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use ptask_time::{SharedClock, Timestamp};

use crate::params::TaskParams;
use crate::registry::TaskId;

/// Counters shared between a task thread and the registry.
///
/// Only the task thread writes `miss_count` and `activations`; anyone may
/// read them. `cancel` is written by the registry and polled by the task.
#[derive(Debug, Default)]
pub(crate) struct TaskShared {
    pub(crate) miss_count: AtomicU64,
    pub(crate) activations: AtomicU64,
    pub(crate) cancel: AtomicBool,
}

/// State owned by a running periodic task.
///
/// A `PeriodicTask` is handed to the body passed to
/// [`TaskRegistry::create`](crate::TaskRegistry::create) and lives on the
/// task's own thread. Activation and deadline times are absolute, so the
/// period does not drift however long each job takes.
///
/// # Example
///
/// ```
/// use ptask_scheduler::{SchedPolicy, TaskParams, TaskRegistry};
/// use ptask_time::MonotonicClock;
///
/// # fn main() -> ptask_errors::PtaskResult {
/// let registry = TaskRegistry::new(4, MonotonicClock::shared())?;
/// let id = registry.short_create(TaskParams::from_millis(1), |task| {
///     task.start_period();
///     for _ in 0..3 {
///         let _missed = task.deadline_miss();
///         task.wait_for_period();
///     }
/// })?;
/// registry.join(id)?;
/// # Ok(())
/// # }
/// ```
pub struct PeriodicTask {
    id: TaskId,
    params: TaskParams,
    next_activation: Timestamp,
    next_deadline: Timestamp,
    clock: SharedClock,
    shared: Arc<TaskShared>,
}

impl PeriodicTask {
    pub(crate) fn new(
        id: TaskId,
        params: TaskParams,
        clock: SharedClock,
        shared: Arc<TaskShared>,
    ) -> Self {
        let now = clock.now();
        Self {
            id,
            params,
            next_activation: now,
            next_deadline: now,
            clock,
            shared,
        }
    }

    /// Anchor the first activation and deadline to the current time.
    ///
    /// Call once, before the first [`PeriodicTask::wait_for_period`].
    pub fn start_period(&mut self) {
        let now = self.clock.now();
        self.next_activation = now + self.params.period;
        self.next_deadline = now + self.params.deadline;
        tracing::trace!(task = %self.id, at = %self.next_activation, "period started");
    }

    /// Sleep until the next activation, then advance activation and deadline
    /// by one period.
    ///
    /// The sleep is absolute: if the activation time has already passed the
    /// call returns immediately and the task catches up.
    pub fn wait_for_period(&mut self) {
        self.clock.sleep_until(self.next_activation);
        self.next_activation += self.params.period;
        self.next_deadline += self.params.period;
        self.shared.activations.fetch_add(1, Ordering::Relaxed);
    }

    /// Check whether the current deadline has passed.
    ///
    /// Returns `true` and increments the miss counter when now is strictly
    /// after the deadline.
    pub fn deadline_miss(&mut self) -> bool {
        let now = self.clock.now();
        if now > self.next_deadline {
            let misses = self.shared.miss_count.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(
                task = %self.id,
                late_by = ?(now - self.next_deadline),
                misses,
                "deadline miss"
            );
            true
        } else {
            false
        }
    }

    /// Check whether the task has been asked to stop.
    #[must_use]
    pub fn cancel_requested(&self) -> bool {
        self.shared.cancel.load(Ordering::Acquire)
    }

    /// Run `job` once per period until cancellation is requested.
    ///
    /// Each iteration runs the job, records a deadline miss if any, then
    /// waits for the next activation.
    pub fn run_until_cancelled<F>(&mut self, mut job: F)
    where
        F: FnMut(&mut PeriodicTask),
    {
        self.start_period();
        while !self.cancel_requested() {
            job(self);
            let _missed = self.deadline_miss();
            self.wait_for_period();
        }
    }

    /// Task identifier.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Parameters the task was created with.
    #[must_use]
    pub fn params(&self) -> &TaskParams {
        &self.params
    }

    /// Worst-case execution time hint.
    #[must_use]
    pub fn wcet(&self) -> Duration {
        self.params.wcet
    }

    /// Activation period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.params.period
    }

    /// Relative deadline.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.params.deadline
    }

    /// Scheduling priority.
    #[must_use]
    pub fn priority(&self) -> u8 {
        self.params.priority
    }

    /// Number of deadline misses recorded so far.
    #[must_use]
    pub fn miss_count(&self) -> u64 {
        self.shared.miss_count.load(Ordering::Relaxed)
    }

    /// Number of completed periods.
    #[must_use]
    pub fn activations(&self) -> u64 {
        self.shared.activations.load(Ordering::Relaxed)
    }

    /// Absolute time of the next activation.
    #[must_use]
    pub fn next_activation(&self) -> Timestamp {
        self.next_activation
    }

    /// Absolute deadline of the current job.
    #[must_use]
    pub fn next_deadline(&self) -> Timestamp {
        self.next_deadline
    }

    /// Clock the task is timed by.
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}

impl fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("id", &self.id)
            .field("params", &self.params)
            .field("next_activation", &self.next_activation)
            .field("next_deadline", &self.next_deadline)
            .field("miss_count", &self.miss_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptask_time::{Clock, ManualClock};

    fn task_at(start_ms: u64, params: TaskParams) -> (Arc<ManualClock>, PeriodicTask) {
        let clock = Arc::new(ManualClock::starting_at(Timestamp::from_millis(start_ms)));
        let shared_clock: SharedClock = clock.clone();
        let task = PeriodicTask::new(
            TaskId::new(0, 1),
            params,
            shared_clock,
            Arc::new(TaskShared::default()),
        );
        (clock, task)
    }

    #[test]
    fn test_start_period_anchors_to_now() {
        let params = TaskParams::from_millis(10).with_deadline(Duration::from_millis(8));
        let (_clock, mut task) = task_at(1_000, params);
        task.start_period();
        assert_eq!(task.next_activation(), Timestamp::from_millis(1_010));
        assert_eq!(task.next_deadline(), Timestamp::from_millis(1_008));
    }

    #[test]
    fn test_wait_for_period_is_drift_free() {
        let (clock, mut task) = task_at(0, TaskParams::from_millis(10));
        task.start_period();
        for k in 1..=5_u64 {
            clock.advance(Duration::from_millis(3));
            task.wait_for_period();
            assert_eq!(clock.now(), Timestamp::from_millis(10 * k));
            assert_eq!(task.next_activation(), Timestamp::from_millis(10 * (k + 1)));
        }
        assert_eq!(task.activations(), 5);
    }

    #[test]
    fn test_deadline_miss_is_strict() {
        let (clock, mut task) = task_at(0, TaskParams::from_millis(10));
        task.start_period();

        clock.set(Timestamp::from_millis(10));
        assert!(!task.deadline_miss());
        assert_eq!(task.miss_count(), 0);

        clock.advance(Duration::from_nanos(1));
        assert!(task.deadline_miss());
        assert!(task.deadline_miss());
        assert_eq!(task.miss_count(), 2);
    }

    #[test]
    fn test_run_until_cancelled_stops() {
        let (_clock, mut task) = task_at(0, TaskParams::from_millis(1));
        let shared = Arc::clone(&task.shared);
        let mut runs = 0_u32;
        task.run_until_cancelled(|_| {
            runs += 1;
            if runs == 4 {
                shared.cancel.store(true, Ordering::Release);
            }
        });
        assert_eq!(runs, 4);
        assert_eq!(task.miss_count(), 0);
    }
}
