//! Periodic real-time tasks on top of POSIX threads.
//!
//! This crate manages a fixed set of periodic tasks, each running on its own
//! OS thread under an explicitly configured scheduling policy:
//!
//! - **SchedPolicy**: time-shared, round-robin or FIFO, with priority rules
//! - **TaskRegistry**: slot allocation, thread creation, cancellation and join
//! - **PeriodicTask**: absolute activation times and deadline-miss detection,
//!   used by the task body on its own thread
//!
//! # Example
//!
//! ```
//! use ptask_scheduler::{SchedPolicy, TaskParams, TaskRegistry};
//! use ptask_time::MonotonicClock;
//!
//! # fn main() -> ptask_errors::PtaskResult {
//! let registry = TaskRegistry::new(8, MonotonicClock::shared())?;
//! registry.set_scheduler(SchedPolicy::TimeShared);
//!
//! let id = registry.short_create(TaskParams::from_millis(2), |task| {
//!     task.run_until_cancelled(|_task| {
//!         // periodic job
//!     });
//! })?;
//!
//! registry.cancel(id)?;
//! registry.join(id)?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod params;
pub mod policy;
pub mod registry;
pub mod task;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(not(target_os = "linux"))]
mod fallback;

#[cfg(target_os = "linux")]
use linux as platform;

#[cfg(not(target_os = "linux"))]
use fallback as platform;

pub mod prelude;

pub use params::TaskParams;
pub use policy::{MAX_RT_PRIORITY, MIN_RT_PRIORITY, PolicyCell, SchedPolicy};
pub use registry::{DEFAULT_MAX_TASKS, TaskId, TaskRegistry, TaskState, TaskStats};
pub use task::PeriodicTask;

/// Lock the process's current and future memory pages into RAM.
///
/// Avoids page faults in task bodies. Usually needs `CAP_IPC_LOCK` or a
/// sufficient `RLIMIT_MEMLOCK`.
///
/// # Errors
///
/// Returns [`ptask_errors::PtaskError::Os`] when the kernel refuses, or on
/// platforms without `mlockall`.
pub fn lock_memory() -> ptask_errors::PtaskResult {
    platform::lock_memory()
}
