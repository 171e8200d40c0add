//! Synchronization wrappers for real-time threads.
//!
//! - [`PiMutex`]: a mutex using the priority-inheritance protocol, so a
//!   low-priority holder is boosted while a higher-priority thread waits
//! - [`PiCondvar`]: a condition variable that waits on a [`PiMutexGuard`]
//!
//! On Linux both wrap POSIX primitives (`PTHREAD_PRIO_INHERIT`, condition
//! variables timed on `CLOCK_MONOTONIC`). Other platforms get the same API
//! backed by `parking_lot`, without priority inheritance.
//!
//! Every lock in the ptask crates (task registry, each CAB) is a `PiMutex`.
//!
//! # Example
//!
//! ```
//! use ptask_sync::{PiCondvar, PiMutex};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let pair = Arc::new((PiMutex::new(false), PiCondvar::new()));
//! let remote = Arc::clone(&pair);
//! let handle = thread::spawn(move || {
//!     let (lock, cvar) = &*remote;
//!     *lock.lock() = true;
//!     cvar.notify_one();
//! });
//!
//! let (lock, cvar) = &*pair;
//! let mut ready = lock.lock();
//! cvar.wait_while(&mut ready, |ready| !*ready);
//! assert!(*ready);
//! drop(ready);
//! assert!(handle.join().is_ok());
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(target_os = "linux")]
mod linux;

#[cfg(not(target_os = "linux"))]
mod fallback;

#[cfg(target_os = "linux")]
pub use linux::{PiCondvar, PiMutex, PiMutexGuard};

#[cfg(not(target_os = "linux"))]
pub use fallback::{PiCondvar, PiMutex, PiMutexGuard};

impl<T: Default> Default for PiMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for PiMutex<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl Default for PiCondvar {
    fn default() -> Self {
        Self::new()
    }
}

impl PiCondvar {
    /// Block while `condition` holds, re-checking after every wake-up.
    pub fn wait_while<T, F>(&self, guard: &mut PiMutexGuard<'_, T>, mut condition: F)
    where
        T: ?Sized,
        F: FnMut(&mut T) -> bool,
    {
        while condition(&mut **guard) {
            self.wait(guard);
        }
    }

    /// Block while `condition` holds, for at most `timeout`.
    ///
    /// Returns `true` if the timeout elapsed with the condition still true.
    pub fn wait_timeout_while<T, F>(
        &self,
        guard: &mut PiMutexGuard<'_, T>,
        timeout: std::time::Duration,
        mut condition: F,
    ) -> bool
    where
        T: ?Sized,
        F: FnMut(&mut T) -> bool,
    {
        let deadline = std::time::Instant::now() + timeout;
        while condition(&mut **guard) {
            let now = std::time::Instant::now();
            if now >= deadline {
                return true;
            }
            let _timed_out = self.wait_timeout(guard, deadline - now);
        }
        false
    }
}
