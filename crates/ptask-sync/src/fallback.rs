//! Portable implementation on top of `parking_lot`.
//!
//! `parking_lot` has no priority-inheritance protocol, so
//! `has_priority_inheritance` always reports `false` here.

use core::fmt;
use core::ops::{Deref, DerefMut};
use std::time::Duration;

/// Mutex with the same API as the Linux priority-inheritance mutex.
pub struct PiMutex<T: ?Sized> {
    inner: parking_lot::Mutex<T>,
}

impl<T> PiMutex<T> {
    /// Create a new mutex holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: parking_lot::Mutex::new(value),
        }
    }

    /// Consume the mutex and return the protected value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: ?Sized> PiMutex<T> {
    /// Acquire the lock, blocking the current thread until it is available.
    pub fn lock(&self) -> PiMutexGuard<'_, T> {
        PiMutexGuard {
            inner: self.inner.lock(),
        }
    }

    /// Acquire the lock if it is free.
    pub fn try_lock(&self) -> Option<PiMutexGuard<'_, T>> {
        self.inner.try_lock().map(|inner| PiMutexGuard { inner })
    }

    /// Mutable access without locking.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    /// Always `false` on this platform.
    pub fn has_priority_inheritance(&self) -> bool {
        false
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for PiMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PiMutex")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

/// RAII guard for [`PiMutex`].
pub struct PiMutexGuard<'a, T: ?Sized> {
    inner: parking_lot::MutexGuard<'a, T>,
}

impl<T: ?Sized> Deref for PiMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: ?Sized> DerefMut for PiMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for PiMutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Condition variable for use with [`PiMutex`].
#[derive(Debug)]
pub struct PiCondvar {
    inner: parking_lot::Condvar,
}

impl PiCondvar {
    /// Create a condition variable.
    pub fn new() -> Self {
        Self {
            inner: parking_lot::Condvar::new(),
        }
    }

    /// Atomically release the guard's lock and block until notified.
    pub fn wait<T: ?Sized>(&self, guard: &mut PiMutexGuard<'_, T>) {
        self.inner.wait(&mut guard.inner);
    }

    /// Like [`PiCondvar::wait`] but gives up after `timeout`.
    ///
    /// Returns `true` if the wait timed out.
    pub fn wait_timeout<T: ?Sized>(&self, guard: &mut PiMutexGuard<'_, T>, timeout: Duration) -> bool {
        self.inner.wait_for(&mut guard.inner, timeout).timed_out()
    }

    /// Wake one waiting thread.
    pub fn notify_one(&self) {
        let _woken = self.inner.notify_one();
    }

    /// Wake all waiting threads.
    pub fn notify_all(&self) {
        let _woken = self.inner.notify_all();
    }
}
