//! POSIX implementation: `PTHREAD_PRIO_INHERIT` mutexes and monotonic
//! condition variables.
#![expect(unsafe_code, reason = "wraps pthread mutex and condition variable primitives")]

use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ops::{Deref, DerefMut};
use std::time::Duration;

use libc::{
    CLOCK_MONOTONIC, ETIMEDOUT, PTHREAD_COND_INITIALIZER, PTHREAD_MUTEX_INITIALIZER,
    PTHREAD_PRIO_INHERIT, clockid_t, pthread_cond_t, pthread_condattr_t, pthread_mutex_t,
    pthread_mutexattr_t, timespec,
};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Heap-pinned pthread mutex. The box keeps the address stable while the
/// owning `PiMutex` moves.
struct RawMutex {
    inner: Box<UnsafeCell<pthread_mutex_t>>,
    inherit: bool,
}

impl RawMutex {
    fn new() -> Self {
        let inner = Box::new(UnsafeCell::new(PTHREAD_MUTEX_INITIALIZER));
        let inherit = init_priority_inheritance(inner.get());
        Self { inner, inherit }
    }

    #[inline]
    fn get(&self) -> *mut pthread_mutex_t {
        self.inner.get()
    }

    #[inline]
    fn lock(&self) {
        // SAFETY: the mutex was initialized in `new` and lives as long as self.
        let rc = unsafe { libc::pthread_mutex_lock(self.get()) };
        // A guard must never exist without the lock held.
        if rc != 0 {
            std::process::abort();
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        // SAFETY: the mutex was initialized in `new` and lives as long as self.
        unsafe { libc::pthread_mutex_trylock(self.get()) == 0 }
    }

    #[inline]
    fn unlock(&self) {
        // SAFETY: only called by a guard, which holds the lock on this thread.
        let rc = unsafe { libc::pthread_mutex_unlock(self.get()) };
        debug_assert_eq!(rc, 0, "pthread_mutex_unlock failed");
    }
}

impl Drop for RawMutex {
    fn drop(&mut self) {
        // SAFETY: no guard can outlive the mutex, so it is unlocked here.
        unsafe { libc::pthread_mutex_destroy(self.get()) };
    }
}

/// Re-initialize `mutex` with the priority-inheritance protocol.
///
/// Returns `false` when the platform refuses the protocol; the mutex then
/// keeps its default attributes from `PTHREAD_MUTEX_INITIALIZER`.
fn init_priority_inheritance(mutex: *mut pthread_mutex_t) -> bool {
    let mut attr = MaybeUninit::<pthread_mutexattr_t>::uninit();
    // SAFETY: `attr` is valid storage for a mutex attribute object.
    if unsafe { libc::pthread_mutexattr_init(attr.as_mut_ptr()) } != 0 {
        return false;
    }
    // SAFETY: `attr` was initialized above.
    let protocol =
        unsafe { libc::pthread_mutexattr_setprotocol(attr.as_mut_ptr(), PTHREAD_PRIO_INHERIT) };
    let inherit = protocol == 0 && {
        // SAFETY: `mutex` points to unused, heap-pinned mutex storage and
        // `attr` is initialized.
        unsafe { libc::pthread_mutex_init(mutex, attr.as_ptr()) == 0 }
    };
    // SAFETY: `attr` was initialized above and is not used afterwards.
    unsafe { libc::pthread_mutexattr_destroy(attr.as_mut_ptr()) };
    inherit
}

/// A mutex using the priority-inheritance protocol.
///
/// Unlike `std::sync::Mutex` there is no poisoning: a panic while the lock
/// is held unlocks it during unwinding.
pub struct PiMutex<T: ?Sized> {
    raw: RawMutex,
    data: UnsafeCell<T>,
}

// SAFETY: the mutex hands out access to `data` to one thread at a time.
unsafe impl<T: ?Sized + Send> Send for PiMutex<T> {}
// SAFETY: the mutex hands out access to `data` to one thread at a time.
unsafe impl<T: ?Sized + Send> Sync for PiMutex<T> {}

impl<T> PiMutex<T> {
    /// Create a new mutex holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            raw: RawMutex::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Consume the mutex and return the protected value.
    pub fn into_inner(self) -> T {
        let PiMutex { raw, data } = self;
        drop(raw);
        data.into_inner()
    }
}

impl<T: ?Sized> PiMutex<T> {
    /// Acquire the lock, blocking the current thread until it is available.
    pub fn lock(&self) -> PiMutexGuard<'_, T> {
        self.raw.lock();
        PiMutexGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    /// Acquire the lock if it is free.
    pub fn try_lock(&self) -> Option<PiMutexGuard<'_, T>> {
        self.raw.try_lock().then(|| PiMutexGuard {
            mutex: self,
            _not_send: PhantomData,
        })
    }

    /// Mutable access without locking; the borrow checker proves exclusivity.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Whether the priority-inheritance protocol is active for this mutex.
    pub fn has_priority_inheritance(&self) -> bool {
        self.raw.inherit
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for PiMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("PiMutex");
        match self.try_lock() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &format_args!("<locked>")),
        };
        d.field("inherit", &self.raw.inherit);
        d.finish_non_exhaustive()
    }
}

/// RAII guard for [`PiMutex`]; the lock is released on drop.
///
/// Not `Send`: a pthread mutex must be unlocked by the thread that locked it.
pub struct PiMutexGuard<'a, T: ?Sized> {
    mutex: &'a PiMutex<T>,
    _not_send: PhantomData<*const ()>,
}

// SAFETY: sharing the guard only shares `&T`, which is fine when T: Sync.
unsafe impl<T: ?Sized + Sync> Sync for PiMutexGuard<'_, T> {}

impl<T: ?Sized> Deref for PiMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard holds the lock, so no other reference exists.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for PiMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard holds the lock, so no other reference exists.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for PiMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.raw.unlock();
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for PiMutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Condition variable for use with [`PiMutex`].
pub struct PiCondvar {
    inner: Box<UnsafeCell<pthread_cond_t>>,
    clock: clockid_t,
}

// SAFETY: pthread condition variables are designed for cross-thread use.
unsafe impl Send for PiCondvar {}
// SAFETY: pthread condition variables are designed for cross-thread use.
unsafe impl Sync for PiCondvar {}

impl PiCondvar {
    /// Create a condition variable whose timed waits use `CLOCK_MONOTONIC`.
    pub fn new() -> Self {
        let inner = Box::new(UnsafeCell::new(PTHREAD_COND_INITIALIZER));
        let clock = init_monotonic(inner.get());
        Self { inner, clock }
    }

    /// Atomically release the guard's lock and block until notified.
    ///
    /// Spurious wake-ups are possible; prefer [`PiCondvar::wait_while`].
    pub fn wait<T: ?Sized>(&self, guard: &mut PiMutexGuard<'_, T>) {
        // SAFETY: the guard proves the calling thread holds the mutex.
        let rc = unsafe { libc::pthread_cond_wait(self.inner.get(), guard.mutex.raw.get()) };
        debug_assert_eq!(rc, 0, "pthread_cond_wait failed");
    }

    /// Like [`PiCondvar::wait`] but gives up after `timeout`.
    ///
    /// Returns `true` if the wait timed out.
    pub fn wait_timeout<T: ?Sized>(&self, guard: &mut PiMutexGuard<'_, T>, timeout: Duration) -> bool {
        let deadline = deadline_after(self.clock, timeout);
        // SAFETY: the guard proves the calling thread holds the mutex and
        // `deadline` is a valid timespec.
        let rc = unsafe {
            libc::pthread_cond_timedwait(self.inner.get(), guard.mutex.raw.get(), &deadline)
        };
        rc == ETIMEDOUT
    }

    /// Wake one waiting thread.
    pub fn notify_one(&self) {
        // SAFETY: the condition variable was initialized in `new`.
        unsafe { libc::pthread_cond_signal(self.inner.get()) };
    }

    /// Wake all waiting threads.
    pub fn notify_all(&self) {
        // SAFETY: the condition variable was initialized in `new`.
        unsafe { libc::pthread_cond_broadcast(self.inner.get()) };
    }
}

impl Drop for PiCondvar {
    fn drop(&mut self) {
        // SAFETY: `&mut self` guarantees no thread is waiting.
        unsafe { libc::pthread_cond_destroy(self.inner.get()) };
    }
}

impl fmt::Debug for PiCondvar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PiCondvar").finish_non_exhaustive()
    }
}

/// Re-initialize `cond` to time out against `CLOCK_MONOTONIC`, returning the
/// clock its timed waits use.
fn init_monotonic(cond: *mut pthread_cond_t) -> clockid_t {
    let mut attr = MaybeUninit::<pthread_condattr_t>::uninit();
    // SAFETY: `attr` is valid storage for a condition attribute object.
    if unsafe { libc::pthread_condattr_init(attr.as_mut_ptr()) } != 0 {
        return libc::CLOCK_REALTIME;
    }
    // SAFETY: `attr` was initialized above.
    let set = unsafe { libc::pthread_condattr_setclock(attr.as_mut_ptr(), CLOCK_MONOTONIC) };
    let monotonic = set == 0 && {
        // SAFETY: `cond` points to unused, heap-pinned storage and `attr` is
        // initialized.
        unsafe { libc::pthread_cond_init(cond, attr.as_ptr()) == 0 }
    };
    let clock = if monotonic {
        CLOCK_MONOTONIC
    } else {
        libc::CLOCK_REALTIME
    };
    // SAFETY: `attr` was initialized above and is not used afterwards.
    unsafe { libc::pthread_condattr_destroy(attr.as_mut_ptr()) };
    clock
}

fn deadline_after(clock: clockid_t, timeout: Duration) -> timespec {
    let mut now = timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `now` is a valid, writable timespec.
    unsafe { libc::clock_gettime(clock, &mut now) };

    let add_secs = libc::time_t::try_from(timeout.as_secs()).unwrap_or(libc::time_t::MAX);
    let mut secs = now.tv_sec.saturating_add(add_secs);
    let mut nanos = i64::from(now.tv_nsec) + i64::from(timeout.subsec_nanos());
    if nanos >= NANOS_PER_SEC {
        nanos -= NANOS_PER_SEC;
        secs = secs.saturating_add(1);
    }
    timespec {
        tv_sec: secs,
        // Below 10^9 after normalization.
        tv_nsec: nanos as libc::c_long,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_normalizes_nanoseconds() {
        let ts = deadline_after(CLOCK_MONOTONIC, Duration::from_nanos(999_999_999));
        assert!(ts.tv_nsec < 1_000_000_000);
        assert!(ts.tv_nsec >= 0);
    }

    #[test]
    fn test_condvar_uses_monotonic_clock() {
        let cvar = PiCondvar::new();
        assert_eq!(cvar.clock, CLOCK_MONOTONIC);
    }

    #[test]
    fn test_mutex_works_with_or_without_protocol() {
        let m = PiMutex::new(0_u8);
        let _inherit = m.has_priority_inheritance();
        *m.lock() += 1;
        assert_eq!(*m.lock(), 1);
        assert_eq!(m.into_inner(), 1);
    }

    #[test]
    fn test_guard_means_lock_is_held() {
        let m = PiMutex::new(0_u32);
        let guard = m.lock();
        let contended = std::thread::scope(|s| s.spawn(|| m.try_lock().is_none()).join());
        assert!(matches!(contended, Ok(true)));
        drop(guard);

        let free = std::thread::scope(|s| s.spawn(|| m.try_lock().is_some()).join());
        assert!(matches!(free, Ok(true)));
    }
}
