//! The runtime object tying tasks, CABs and the clock together.

use std::time::{Duration, Instant};

use ptask_cab::CabPool;
use ptask_errors::{PtaskError, PtaskResult};
use ptask_scheduler::{PeriodicTask, SchedPolicy, TaskId, TaskParams, TaskRegistry, TaskState, TaskStats};
use ptask_time::{MonotonicClock, SharedClock};

use crate::config::RuntimeConfig;
use crate::error::ConfigResult;

/// Outcome of [`Runtime::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tasks that stopped and were joined, with their final counters.
    pub joined: Vec<TaskStats>,
    /// Tasks whose body panicked; their slots were freed.
    pub panicked: Vec<TaskId>,
    /// Tasks still running when the timeout elapsed.
    pub timed_out: Vec<TaskId>,
    /// Tasks whose creation had failed and were destroyed.
    pub destroyed: Vec<TaskId>,
}

impl ShutdownReport {
    /// Check whether every started task stopped in time.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.panicked.is_empty() && self.timed_out.is_empty()
    }

    /// Total deadline misses over the joined tasks.
    #[must_use]
    pub fn total_misses(&self) -> u64 {
        self.joined.iter().map(|s| s.miss_count).sum()
    }
}

/// Task registry, CAB pool and clock of one application.
///
/// There is no global state: build one runtime at startup and share it
/// through an `Arc` with whatever needs to create tasks or CABs.
///
/// # Example
///
/// ```
/// use ptask_runtime::{Runtime, RuntimeConfig};
/// use ptask_scheduler::TaskParams;
/// use std::time::Duration;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let runtime = Runtime::new(RuntimeConfig::default())?;
/// let counter = runtime.cabs().create("counter", vec![0_u64; 3])?;
///
/// let producer = std::sync::Arc::clone(&counter);
/// runtime.spawn_periodic(TaskParams::from_millis(1), move |_task| {
///     let _ = producer.write_with(|n| *n += 1);
/// })?;
///
/// std::thread::sleep(Duration::from_millis(10));
/// let report = runtime.shutdown();
/// assert!(report.is_clean());
/// assert_eq!(report.joined.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    clock: SharedClock,
    tasks: TaskRegistry,
    cabs: CabPool,
}

impl Runtime {
    /// Build a runtime on the system monotonic clock.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`](crate::ConfigError::Invalid) if the
    /// configuration does not validate.
    pub fn new(config: RuntimeConfig) -> ConfigResult<Self> {
        Self::with_clock(config, MonotonicClock::shared())
    }

    /// Build a runtime on `clock`.
    ///
    /// # Errors
    ///
    /// As [`Runtime::new`].
    pub fn with_clock(config: RuntimeConfig, clock: SharedClock) -> ConfigResult<Self> {
        config.validate()?;

        if config.lock_memory {
            match ptask_scheduler::lock_memory() {
                Ok(()) => tracing::info!("process memory locked"),
                Err(err) => tracing::warn!(error = %err, "could not lock process memory"),
            }
        }

        let tasks = TaskRegistry::new(config.max_tasks, clock.clone())?;
        tasks.set_scheduler(config.policy);
        let cabs = CabPool::new(config.max_cabs, config.max_cab_buffers, clock.clone())?;

        tracing::info!(
            policy = %config.policy,
            max_tasks = config.max_tasks,
            max_cabs = config.max_cabs,
            "runtime started"
        );
        Ok(Self {
            config,
            clock,
            tasks,
            cabs,
        })
    }

    /// Configuration the runtime was built with.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Clock shared by tasks and CABs.
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Task registry.
    #[must_use]
    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    /// CAB pool.
    #[must_use]
    pub fn cabs(&self) -> &CabPool {
        &self.cabs
    }

    /// Change the policy used for tasks created from now on.
    pub fn set_scheduler(&self, policy: SchedPolicy) {
        self.tasks.set_scheduler(policy);
    }

    /// Start a task that runs `job` once per period until cancelled.
    ///
    /// Each period the task checks its deadline after the job and then
    /// waits for the next activation.
    ///
    /// # Errors
    ///
    /// The errors of [`TaskRegistry::short_create`].
    pub fn spawn_periodic<F>(&self, params: TaskParams, job: F) -> PtaskResult<TaskId>
    where
        F: FnMut(&mut PeriodicTask) + Send + 'static,
    {
        self.tasks
            .short_create(params, move |task| task.run_until_cancelled(job))
    }

    /// Stop every task, allowing the configured join timeout in total.
    #[must_use = "the report lists tasks that did not stop"]
    pub fn shutdown(&self) -> ShutdownReport {
        self.shutdown_within(self.config.join_timeout())
    }

    /// Cancel every running task and join them, allowing `timeout` in total.
    ///
    /// Tasks whose creation failed are destroyed. Tasks still in `New`
    /// are left alone.
    #[must_use = "the report lists tasks that did not stop"]
    pub fn shutdown_within(&self, timeout: Duration) -> ShutdownReport {
        let deadline = Instant::now() + timeout;
        let mut report = ShutdownReport::default();
        let live = self.tasks.live_tasks();

        for &id in &live {
            if let Err(err) = self.tasks.cancel(id) {
                tracing::trace!(task = %id, error = %err, "not cancelled");
            }
        }

        for id in live {
            match self.tasks.state(id) {
                Ok(TaskState::Joinable) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match self.tasks.join_with_stats(id, remaining) {
                        Ok(stats) => report.joined.push(stats),
                        Err(PtaskError::TaskPanicked) => report.panicked.push(id),
                        Err(err) => {
                            tracing::warn!(task = %id, error = %err, "task did not stop");
                            report.timed_out.push(id);
                        }
                    }
                }
                Ok(TaskState::Error) => {
                    if self.tasks.destroy(id).is_ok() {
                        report.destroyed.push(id);
                    }
                }
                Ok(TaskState::New | TaskState::Free) | Err(_) => {}
            }
        }

        tracing::info!(
            joined = report.joined.len(),
            panicked = report.panicked.len(),
            timed_out = report.timed_out.len(),
            misses = report.total_misses(),
            "runtime shut down"
        );
        report
    }
}
