//! The cyclic asynchronous buffer.
#![expect(
    unsafe_code,
    reason = "buffers are handed out through UnsafeCell under the SlotTable protocol"
)]

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};

use ptask_errors::PtaskResult;
use ptask_sync::PiMutex;
use ptask_time::{SharedClock, Timestamp};

use crate::pool::CabId;
use crate::slots::{SlotTable, Token};

struct CabState {
    table: SlotTable,
    last_timestamp: Option<Timestamp>,
}

/// Cyclic asynchronous buffer over N values of type `T`.
///
/// One writer at a time fills a free buffer and publishes it; readers get
/// the most recently published buffer. With R concurrent readers, N = R + 2
/// buffers guarantee the writer always finds one. The writer
/// never waits for readers: it always gets a buffer that is neither being
/// read nor the last published one.
///
/// Access goes through guards. A [`WriteGuard`] gives `&mut T` and must be
/// committed to publish; dropping it uncommitted gives the buffer back. A
/// [`ReadGuard`] gives `&T` and releases the buffer when dropped.
///
/// A reused write buffer still holds whatever was last written to it.
///
/// # Example
///
/// ```
/// use ptask_cab::CabPool;
/// use ptask_time::MonotonicClock;
///
/// # fn main() -> ptask_errors::PtaskResult {
/// let pool = CabPool::with_defaults(MonotonicClock::shared());
/// let cab = pool.create("level", vec![0.0_f32; 3])?;
///
/// let mut w = cab.reserve_write()?;
/// *w = 0.75;
/// w.commit()?;
///
/// let r = cab.reserve_read()?;
/// assert_eq!(*r, 0.75);
/// # Ok(())
/// # }
/// ```
pub struct Cab<T> {
    id: CabId,
    name: String,
    buffer_size: usize,
    buffers: Box<[UnsafeCell<T>]>,
    state: PiMutex<CabState>,
    clock: SharedClock,
}

// SAFETY: a buffer is only mutated through a WriteGuard, and the SlotTable
// never hands a buffer to the writer while it has readers or is the last
// published one, nor to readers while the writer holds it. `T: Send` lets a
// value written on one thread be read or dropped on another; `T: Sync` lets
// several readers share `&T`.
unsafe impl<T: Send> Send for Cab<T> {}
// SAFETY: see above.
unsafe impl<T: Send + Sync> Sync for Cab<T> {}

impl<T> Cab<T> {
    pub(crate) fn new(
        id: CabId,
        name: String,
        buffer_size: usize,
        buffers: Vec<T>,
        clock: SharedClock,
    ) -> PtaskResult<Self> {
        let table = SlotTable::new(buffers.len())?;
        let buffers = buffers.into_iter().map(UnsafeCell::new).collect();
        Ok(Self {
            id,
            name,
            buffer_size,
            buffers,
            state: PiMutex::new(CabState {
                table,
                last_timestamp: None,
            }),
            clock,
        })
    }

    /// Identifier assigned by the pool.
    #[must_use]
    pub fn id(&self) -> CabId {
        self.id
    }

    /// Name given at creation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of buffers N.
    #[must_use]
    pub fn num_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Size in bytes of one buffer.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Reserve a buffer to write the next value into.
    ///
    /// # Errors
    ///
    /// Returns
    /// [`PtaskError::ResourceExhausted`](ptask_errors::PtaskError::ResourceExhausted)
    /// when readers hold every buffer other than the last published one.
    pub fn reserve_write(&self) -> PtaskResult<WriteGuard<'_, T>> {
        let reserved = self.state.lock().table.reserve();
        match reserved {
            Ok(token) => {
                tracing::trace!(cab = %self.id, buffer = token.index(), "write reserved");
                Ok(WriteGuard {
                    cab: self,
                    token,
                    committed: false,
                })
            }
            Err(err) => {
                tracing::warn!(cab = %self.id, name = %self.name, "no free buffer for writer");
                Err(err)
            }
        }
    }

    /// Get the most recently published buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::Unavailable`](ptask_errors::PtaskError::Unavailable) if nothing has been published
    /// since creation or the last [`Cab::reset`].
    pub fn reserve_read(&self) -> PtaskResult<ReadGuard<'_, T>> {
        let (token, timestamp) = {
            let mut state = self.state.lock();
            let token = state.table.acquire_latest()?;
            (token, state.last_timestamp.unwrap_or(Timestamp::ZERO))
        };
        Ok(ReadGuard {
            cab: self,
            token,
            timestamp,
        })
    }

    /// Forget the published value. Guards already handed out stay valid.
    ///
    /// Busy counts and [`Cab::last_timestamp`] are left as they are.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.table.reset();
        tracing::debug!(cab = %self.id, "reset");
    }

    /// Reserve, fill with `fill` and publish in one call.
    ///
    /// # Errors
    ///
    /// The errors of [`Cab::reserve_write`] and [`WriteGuard::commit`].
    pub fn write_with<F>(&self, fill: F) -> PtaskResult<Timestamp>
    where
        F: FnOnce(&mut T),
    {
        let mut guard = self.reserve_write()?;
        fill(&mut *guard);
        guard.commit()
    }

    /// Run `read` on the latest value and its publication time.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::Unavailable`](ptask_errors::PtaskError::Unavailable) if nothing is published.
    pub fn read_with<R, F>(&self, read: F) -> PtaskResult<R>
    where
        F: FnOnce(&T, Timestamp) -> R,
    {
        let guard = self.reserve_read()?;
        Ok(read(&*guard, guard.timestamp()))
    }

    /// Check whether a value is published.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.state.lock().table.last().is_some()
    }

    /// Time of the most recent commit, or `None` if nothing was ever
    /// committed. A [`Cab::reset`] does not clear it.
    #[must_use]
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.state.lock().last_timestamp
    }

    /// Current number of users of each buffer.
    #[must_use]
    pub fn busy_counts(&self) -> Vec<u32> {
        self.state.lock().table.busy().to_vec()
    }

    fn commit_token(&self, token: Token) -> PtaskResult<Timestamp> {
        let mut state = self.state.lock();
        state.table.publish(token)?;
        let now = self.clock.now();
        state.last_timestamp = Some(now);
        Ok(now)
    }

    fn release_token(&self, token: Token) {
        if let Err(err) = self.state.lock().table.release(token) {
            tracing::error!(cab = %self.id, buffer = token.index(), error = %err, "release failed");
        }
    }

    fn buffer(&self, token: Token) -> *mut T {
        self.buffers[token.index()].get()
    }
}

impl<T> fmt::Debug for Cab<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Cab")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("num_buffers", &self.buffers.len())
            .field("buffer_size", &self.buffer_size)
            .field("busy", &state.table.busy())
            .field("last", &state.table.last())
            .finish_non_exhaustive()
    }
}

/// Exclusive access to a buffer reserved for writing.
///
/// Publish with [`WriteGuard::commit`]. Dropping the guard without
/// committing gives the buffer back and leaves the published value as it
/// was.
#[must_use = "dropping a WriteGuard without commit() discards the write"]
pub struct WriteGuard<'a, T> {
    cab: &'a Cab<T>,
    token: Token,
    committed: bool,
}

impl<T> WriteGuard<'_, T> {
    /// Publish the buffer as the latest value and return its timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidArgument`](ptask_errors::PtaskError::InvalidArgument) if the bookkeeping no longer
    /// matches the reservation; the buffer is then given back.
    pub fn commit(mut self) -> PtaskResult<Timestamp> {
        let stamped = self.cab.commit_token(self.token)?;
        self.committed = true;
        tracing::trace!(cab = %self.cab.id, buffer = self.token.index(), at = %stamped, "published");
        Ok(stamped)
    }

    /// Index of the reserved buffer.
    #[must_use]
    pub fn buffer_index(&self) -> usize {
        self.token.index()
    }
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the writer's buffer has no other user until it is
        // committed or released.
        unsafe { &*self.cab.buffer(self.token) }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as in `deref`; `&mut self` makes the borrow unique.
        unsafe { &mut *self.cab.buffer(self.token) }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        if !self.committed {
            tracing::trace!(cab = %self.cab.id, buffer = self.token.index(), "write abandoned");
            self.cab.release_token(self.token);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for WriteGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteGuard")
            .field("cab", &self.cab.id)
            .field("buffer", &self.token.index())
            .field("value", &**self)
            .finish()
    }
}

/// Shared access to the buffer that was latest when it was reserved.
pub struct ReadGuard<'a, T> {
    cab: &'a Cab<T>,
    token: Token,
    timestamp: Timestamp,
}

impl<T> ReadGuard<'_, T> {
    /// When the value was published.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Index of the buffer being read.
    #[must_use]
    pub fn buffer_index(&self) -> usize {
        self.token.index()
    }
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the writer never reserves a buffer that has readers.
        unsafe { &*self.cab.buffer(self.token) }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.cab.release_token(self.token);
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadGuard")
            .field("cab", &self.cab.id)
            .field("buffer", &self.token.index())
            .field("timestamp", &self.timestamp)
            .field("value", &**self)
            .finish()
    }
}
