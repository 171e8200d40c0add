//! Everything an application usually needs, in one import.

pub use crate::config::RuntimeConfig;
pub use crate::error::{ConfigError, ConfigResult};
pub use crate::runtime::{Runtime, ShutdownReport};
pub use ptask_cab::{Cab, CabId, CabPool, ReadGuard, WriteGuard};
pub use ptask_errors::{PtaskError, PtaskResult, Resource};
pub use ptask_scheduler::{PeriodicTask, SchedPolicy, TaskId, TaskParams, TaskRegistry, TaskState};
pub use ptask_time::{Clock, ManualClock, MonotonicClock, SharedClock, Timestamp};
