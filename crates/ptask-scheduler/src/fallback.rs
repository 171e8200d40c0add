//! Fallback for platforms without POSIX real-time scheduling.

use ptask_errors::errno::ENOSYS;
use ptask_errors::{PtaskError, PtaskResult};

use crate::policy::SchedPolicy;

/// Only the time-shared policy is available here.
pub(crate) fn apply_scheduling(policy: SchedPolicy, _priority: u8) -> PtaskResult {
    if policy.is_real_time() {
        return Err(PtaskError::InvalidArgument(
            "real-time policies are only supported on Linux",
        ));
    }
    Ok(())
}

/// Memory locking is not supported.
pub(crate) fn lock_memory() -> PtaskResult {
    Err(PtaskError::os("mlockall", ENOSYS))
}
