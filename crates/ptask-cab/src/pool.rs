//! CAB creation and identifiers.

use core::fmt;
use std::sync::Arc;

use ptask_errors::{PtaskError, PtaskResult, Resource, ensure_arg};
use ptask_sync::PiMutex;
use ptask_time::SharedClock;

use crate::cab::Cab;

/// Default runtime-wide number of CABs.
pub const DEFAULT_MAX_CABS: usize = 50;

/// Default maximum number of buffers in one CAB.
pub const DEFAULT_MAX_CAB_BUFFERS: usize = 10;

/// Identifier of a CAB. Assigned from 1 upward and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CabId(u32);

impl CabId {
    /// Numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cab#{}", self.0)
    }
}

/// Description of a CAB created by a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CabInfo {
    /// Identifier.
    pub id: CabId,
    /// Name given at creation.
    pub name: String,
    /// Number of buffers.
    pub num_buffers: usize,
    /// Size in bytes of one buffer.
    pub buffer_size: usize,
}

#[derive(Debug)]
struct PoolState {
    next_id: u32,
    created: Vec<CabInfo>,
}

/// Creates CABs and enforces the runtime-wide limits.
///
/// CABs cannot be destroyed individually; each lives until its last `Arc`
/// is dropped, and its id is never handed out again.
#[derive(Debug)]
pub struct CabPool {
    state: PiMutex<PoolState>,
    max_cabs: usize,
    max_buffers: usize,
    clock: SharedClock,
}

impl CabPool {
    /// Pool allowing `max_cabs` CABs of at most `max_buffers` buffers each.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidArgument`] if either limit is zero.
    pub fn new(max_cabs: usize, max_buffers: usize, clock: SharedClock) -> PtaskResult<Self> {
        ensure_arg!(max_cabs > 0, "max_cabs must be non-zero");
        ensure_arg!(max_buffers > 0, "max_cab_buffers must be non-zero");
        Ok(Self {
            state: PiMutex::new(PoolState {
                next_id: 1,
                created: Vec::new(),
            }),
            max_cabs,
            max_buffers,
            clock,
        })
    }

    /// Pool with [`DEFAULT_MAX_CABS`] and [`DEFAULT_MAX_CAB_BUFFERS`].
    #[must_use]
    pub fn with_defaults(clock: SharedClock) -> Self {
        Self {
            state: PiMutex::new(PoolState {
                next_id: 1,
                created: Vec::new(),
            }),
            max_cabs: DEFAULT_MAX_CABS,
            max_buffers: DEFAULT_MAX_CAB_BUFFERS,
            clock,
        }
    }

    /// Create a CAB over the caller's `buffers`.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidArgument`] if `buffers` is empty or
    /// longer than the per-CAB limit, and [`PtaskError::ResourceExhausted`]
    /// once the pool's CAB limit has been reached.
    pub fn create<T>(&self, name: &str, buffers: Vec<T>) -> PtaskResult<Arc<Cab<T>>> {
        self.create_sized(name, size_of::<T>(), buffers)
    }

    /// Create a CAB of `n` buffers produced by `init`.
    ///
    /// # Errors
    ///
    /// As [`CabPool::create`].
    pub fn create_with<T, F>(&self, name: &str, n: usize, init: F) -> PtaskResult<Arc<Cab<T>>>
    where
        F: FnMut() -> T,
    {
        ensure_arg!(n <= self.max_buffers, "too many buffers for one CAB");
        self.create(name, std::iter::repeat_with(init).take(n).collect())
    }

    /// Create a CAB of `n` zeroed byte buffers of `buffer_size` bytes.
    ///
    /// # Errors
    ///
    /// As [`CabPool::create`].
    pub fn create_zeroed(
        &self,
        name: &str,
        n: usize,
        buffer_size: usize,
    ) -> PtaskResult<Arc<Cab<Box<[u8]>>>> {
        ensure_arg!(n <= self.max_buffers, "too many buffers for one CAB");
        let buffers = (0..n)
            .map(|_| vec![0_u8; buffer_size].into_boxed_slice())
            .collect();
        self.create_sized(name, buffer_size, buffers)
    }

    fn create_sized<T>(
        &self,
        name: &str,
        buffer_size: usize,
        buffers: Vec<T>,
    ) -> PtaskResult<Arc<Cab<T>>> {
        ensure_arg!(!buffers.is_empty(), "a CAB needs at least one buffer");
        ensure_arg!(buffers.len() <= self.max_buffers, "too many buffers for one CAB");

        let mut state = self.state.lock();
        if state.created.len() >= self.max_cabs {
            tracing::warn!(max_cabs = self.max_cabs, name, "CAB limit reached");
            return Err(PtaskError::ResourceExhausted(Resource::Cabs));
        }
        let id = CabId(state.next_id);
        let num_buffers = buffers.len();
        let cab = Cab::new(
            id,
            name.to_owned(),
            buffer_size,
            buffers,
            Arc::clone(&self.clock),
        )?;
        state.next_id = state.next_id.saturating_add(1);
        state.created.push(CabInfo {
            id,
            name: name.to_owned(),
            num_buffers,
            buffer_size,
        });
        drop(state);

        tracing::debug!(cab = %id, name, num_buffers, buffer_size, "CAB created");
        Ok(Arc::new(cab))
    }

    /// Number of CABs created so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.state.lock().created.len()
    }

    /// Descriptions of every CAB created so far, in creation order.
    #[must_use]
    pub fn infos(&self) -> Vec<CabInfo> {
        self.state.lock().created.clone()
    }

    /// Runtime-wide CAB limit.
    #[must_use]
    pub fn max_cabs(&self) -> usize {
        self.max_cabs
    }

    /// Per-CAB buffer limit.
    #[must_use]
    pub fn max_buffers(&self) -> usize {
        self.max_buffers
    }

    /// Clock used to stamp published values.
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptask_time::ManualClock;

    fn pool(max_cabs: usize) -> PtaskResult<CabPool> {
        CabPool::new(max_cabs, DEFAULT_MAX_CAB_BUFFERS, Arc::new(ManualClock::new()))
    }

    #[test]
    fn test_ids_start_at_one() -> PtaskResult {
        let pool = pool(4)?;
        let a = pool.create("a", vec![0_u8; 2])?;
        let b = pool.create("b", vec![0_u8; 2])?;
        assert_eq!(a.id().get(), 1);
        assert_eq!(b.id().get(), 2);
        assert_eq!(b.id().to_string(), "cab#2");
        Ok(())
    }

    #[test]
    fn test_buffer_count_limits() -> PtaskResult {
        let pool = pool(4)?;
        assert!(pool.create::<u32>("empty", Vec::new()).is_err());
        assert!(pool.create("big", vec![0_u32; DEFAULT_MAX_CAB_BUFFERS + 1]).is_err());
        assert!(pool.create("max", vec![0_u32; DEFAULT_MAX_CAB_BUFFERS]).is_ok());
        // Rejected CABs consume no id.
        assert_eq!(pool.count(), 1);
        Ok(())
    }

    #[test]
    fn test_cab_limit() -> PtaskResult {
        let pool = pool(2)?;
        let _a = pool.create("a", vec![0_u8; 2])?;
        let b = pool.create("b", vec![0_u8; 2])?;
        drop(b);
        // Dropping a CAB does not give its id back.
        assert_eq!(
            pool.create("c", vec![0_u8; 2]).map(|cab| cab.id()),
            Err(PtaskError::ResourceExhausted(Resource::Cabs))
        );
        Ok(())
    }

    #[test]
    fn test_create_zeroed_sizes() -> PtaskResult {
        let pool = pool(1)?;
        let cab = pool.create_zeroed("frames", 3, 256)?;
        assert_eq!(cab.num_buffers(), 3);
        assert_eq!(cab.buffer_size(), 256);
        let infos = pool.infos();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].name, "frames");
        assert_eq!(infos[0].buffer_size, 256);
        Ok(())
    }
}
