//! The [`PtaskError`] enum and its classification helpers.

use core::fmt;
use std::time::Duration;

use crate::errno::{EAGAIN, EINVAL, ESRCH, ETIMEDOUT};

/// Bounded resources whose exhaustion is reported as
/// [`PtaskError::ResourceExhausted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Every slot of the task registry is allocated.
    TaskSlots,
    /// The runtime-wide CAB limit has been reached.
    Cabs,
    /// No CAB buffer is free for the writer.
    CabBuffers,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::TaskSlots => write!(f, "task slots"),
            Resource::Cabs => write!(f, "cabs"),
            Resource::CabBuffers => write!(f, "cab buffers"),
        }
    }
}

/// Errors returned by periodic-task and CAB operations.
///
/// Variants carry only `'static` data so the type stays `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum PtaskError {
    /// A fixed-capacity table is full.
    #[error("resource exhausted: no free {0}")]
    ResourceExhausted(Resource),

    /// An argument was rejected (bad policy, bad priority, malformed token).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The operation is not permitted in the descriptor's current state.
    #[error("`{op}` not permitted in state {state}")]
    InvalidState {
        /// Operation that was attempted.
        op: &'static str,
        /// State the descriptor was found in.
        state: &'static str,
    },

    /// The CAB holds no published value.
    #[error("no value has been published")]
    Unavailable,

    /// A bounded wait elapsed before the awaited event.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The task body panicked; its slot has been released.
    #[error("task body panicked")]
    TaskPanicked,

    /// A native call failed.
    #[error("{op} failed (errno {errno})")]
    Os {
        /// Native call that failed.
        op: &'static str,
        /// Raw OS error number.
        errno: i32,
    },
}

/// Coarse classification of a [`PtaskError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    /// See [`PtaskError::ResourceExhausted`].
    ResourceExhausted = 1,
    /// See [`PtaskError::InvalidArgument`].
    InvalidArgument = 2,
    /// See [`PtaskError::InvalidState`].
    InvalidState = 3,
    /// See [`PtaskError::Unavailable`].
    Unavailable = 4,
    /// See [`PtaskError::TimedOut`].
    TimedOut = 5,
    /// See [`PtaskError::TaskPanicked`].
    TaskPanicked = 6,
    /// See [`PtaskError::Os`].
    Os = 7,
}


impl PtaskError {
    /// Get the error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            PtaskError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            PtaskError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            PtaskError::InvalidState { .. } => ErrorKind::InvalidState,
            PtaskError::Unavailable => ErrorKind::Unavailable,
            PtaskError::TimedOut(_) => ErrorKind::TimedOut,
            PtaskError::TaskPanicked => ErrorKind::TaskPanicked,
            PtaskError::Os { .. } => ErrorKind::Os,
        }
    }

    /// Get the numeric code of the error kind.
    #[must_use]
    pub fn code(&self) -> u8 {
        self.kind() as u8
    }

    /// POSIX error number equivalent, for callers bridging to C code.
    ///
    /// Exhaustion and "no value yet" map to `EAGAIN`, argument and state
    /// errors to `EINVAL`, native failures keep their own errno.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            PtaskError::ResourceExhausted(_) | PtaskError::Unavailable => EAGAIN,
            PtaskError::InvalidArgument(_) | PtaskError::InvalidState { .. } => EINVAL,
            PtaskError::TimedOut(_) => ETIMEDOUT,
            PtaskError::TaskPanicked => ESRCH,
            PtaskError::Os { errno, .. } => *errno,
        }
    }

    /// Check whether retrying the same call later can succeed.
    ///
    /// Exhaustion, an empty CAB and an elapsed timeout are transient; the
    /// other kinds need a different call sequence.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PtaskError::ResourceExhausted(_) | PtaskError::Unavailable | PtaskError::TimedOut(_)
        )
    }

    /// Shorthand for [`PtaskError::InvalidState`].
    #[must_use]
    pub const fn invalid_state(op: &'static str, state: &'static str) -> Self {
        PtaskError::InvalidState { op, state }
    }

    /// Shorthand for [`PtaskError::Os`].
    #[must_use]
    pub const fn os(op: &'static str, errno: i32) -> Self {
        PtaskError::Os { op, errno }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ResourceExhausted => "resource exhausted",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::TimedOut => "timed out",
            ErrorKind::TaskPanicked => "task panicked",
            ErrorKind::Os => "os error",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_mentions_context() {
        let err = PtaskError::invalid_state("set_params", "Joinable");
        let msg = err.to_string();
        assert!(msg.contains("set_params"));
        assert!(msg.contains("Joinable"));

        let err = PtaskError::ResourceExhausted(Resource::Cabs);
        assert_eq!(err.to_string(), "resource exhausted: no free cabs");
    }

    #[test]
    fn test_errno_mapping() {
        assert_eq!(PtaskError::Unavailable.errno(), EAGAIN);
        assert_eq!(PtaskError::InvalidArgument("priority").errno(), EINVAL);
        assert_eq!(PtaskError::os("pthread_setschedparam", 1).errno(), 1);
        assert_eq!(PtaskError::TimedOut(Duration::from_millis(5)).errno(), ETIMEDOUT);
    }

    #[test]
    fn test_retryable() {
        assert!(PtaskError::ResourceExhausted(Resource::TaskSlots).is_retryable());
        assert!(PtaskError::Unavailable.is_retryable());
        assert!(!PtaskError::InvalidArgument("token").is_retryable());
        assert!(!PtaskError::TaskPanicked.is_retryable());
    }

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            PtaskError::ResourceExhausted(Resource::CabBuffers),
            PtaskError::InvalidArgument("x"),
            PtaskError::invalid_state("join", "Free"),
            PtaskError::Unavailable,
            PtaskError::TimedOut(Duration::ZERO),
            PtaskError::TaskPanicked,
            PtaskError::os("spawn", 12),
        ];
        let mut codes: Vec<u8> = errors.iter().map(PtaskError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
