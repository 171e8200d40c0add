//! Linux thread scheduling and memory locking.

#![expect(
    unsafe_code,
    reason = "pthread_setschedparam and mlockall are only reachable through libc"
)]

use ptask_errors::{PtaskError, PtaskResult};

use crate::policy::SchedPolicy;

/// Set the calling thread's policy and priority.
///
/// Called by a new task thread before its body runs, so the attributes are
/// always explicit and never inherited from the creating thread.
pub(crate) fn apply_scheduling(policy: SchedPolicy, priority: u8) -> PtaskResult {
    let param = libc::sched_param {
        sched_priority: i32::from(priority),
    };
    // SAFETY: pthread_self has no preconditions.
    let thread = unsafe { libc::pthread_self() };
    // SAFETY: `thread` is the calling thread and `param` outlives the call.
    let rc = unsafe { libc::pthread_setschedparam(thread, policy.native(), &param) };
    if rc != 0 {
        return Err(PtaskError::os("pthread_setschedparam", rc));
    }
    Ok(())
}

/// Lock current and future pages of the process into RAM.
pub(crate) fn lock_memory() -> PtaskResult {
    // SAFETY: mlockall only changes paging behaviour of this process.
    let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
    if rc != 0 {
        let errno = std::io::Error::last_os_error()
            .raw_os_error()
            .unwrap_or(libc::EPERM);
        return Err(PtaskError::os("mlockall", errno));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_shared_needs_no_privilege() {
        assert_eq!(apply_scheduling(SchedPolicy::TimeShared, 0), Ok(()));
    }

    #[test]
    fn test_bad_priority_reported_as_os_error() {
        // SCHED_OTHER only accepts priority 0; the kernel answers EINVAL.
        let result = apply_scheduling(SchedPolicy::TimeShared, 5);
        assert_eq!(result, Err(PtaskError::os("pthread_setschedparam", libc::EINVAL)));
    }
}
