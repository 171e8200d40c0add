//! Prelude module for common scheduler types.
//!
//! This module provides a convenient way to import the most commonly used
//! types from the scheduler crate.

pub use crate::params::TaskParams;
pub use crate::policy::SchedPolicy;
pub use crate::registry::{TaskId, TaskRegistry, TaskState, TaskStats};
pub use crate::task::PeriodicTask;
pub use ptask_errors::{PtaskError, PtaskResult};
