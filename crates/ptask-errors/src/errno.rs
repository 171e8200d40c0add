//! Linux errno values used by [`PtaskError::errno`](crate::PtaskError::errno).
//!
//! Kept here so the error crate stays free of libc; the platform modules of
//! the other crates use these instead of their own copies.

/// Resource temporarily unavailable.
pub const EAGAIN: i32 = 11;
/// Invalid argument.
pub const EINVAL: i32 = 22;
/// No such process.
pub const ESRCH: i32 = 3;
/// Function not implemented.
pub const ENOSYS: i32 = 38;
/// Connection timed out.
pub const ETIMEDOUT: i32 = 110;
