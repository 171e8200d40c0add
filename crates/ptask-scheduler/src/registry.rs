//! Fixed-capacity registry of periodic task slots.
//!
//! Every task lives in one slot of an arena sized at construction. A slot
//! moves through the states below; any other transition is rejected with
//! [`PtaskError::InvalidState`].
//!
//! ```text
//! Free --init--> New --create ok--> Joinable --join--> Free
//!                 |
//!                 +--create fails--> Error --destroy--> Free
//! ```
//!
//! Identifiers are handed out round-robin: the search for a free slot starts
//! after the most recently allocated index, so a freed index is reused as
//! late as possible.

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use ptask_errors::errno::EAGAIN;
use ptask_errors::{PtaskError, PtaskResult, Resource, ensure_arg};
use ptask_sync::PiMutex;
use ptask_time::SharedClock;

use crate::params::TaskParams;
use crate::platform;
use crate::policy::{PolicyCell, SchedPolicy};
use crate::task::{PeriodicTask, TaskShared};

/// Default number of task slots.
pub const DEFAULT_MAX_TASKS: usize = 50;

/// Handle to a registry slot.
///
/// The generation distinguishes successive occupants of the same index, so
/// a handle kept after its task was joined cannot address the next task
/// allocated in that slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    index: usize,
    generation: u64,
}

impl TaskId {
    pub(crate) const fn new(index: usize, generation: u64) -> Self {
        Self { index, generation }
    }

    /// Slot index in `[0, capacity)`.
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }

    /// Allocation generation of the slot.
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.generation
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.index)
    }
}

/// Lifecycle state of a task slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskState {
    /// Unallocated.
    #[default]
    Free,
    /// Allocated, parameters may be set, no thread yet.
    New,
    /// Thread started; must be joined.
    Joinable,
    /// Thread creation failed; must be destroyed.
    Error,
}

impl TaskState {
    /// State name used in error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskState::Free => "Free",
            TaskState::New => "New",
            TaskState::Joinable => "Joinable",
            TaskState::Error => "Error",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStats {
    /// Task identifier.
    pub id: TaskId,
    /// Slot state.
    pub state: TaskState,
    /// Parameters stored in the slot.
    pub params: TaskParams,
    /// Deadline misses recorded by the task.
    pub miss_count: u64,
    /// Completed periods.
    pub activations: u64,
    /// Whether cancellation has been requested.
    pub cancel_requested: bool,
}

#[derive(Default)]
struct Slot {
    state: TaskState,
    generation: u64,
    params: TaskParams,
    shared: Arc<TaskShared>,
    thread: Option<JoinHandle<()>>,
    done: Option<Receiver<()>>,
    /// Set while `create` spawns the thread with the lock released.
    creating: bool,
}

impl Slot {
    fn reset(&mut self) {
        self.state = TaskState::Free;
        self.params = TaskParams::default();
        self.thread = None;
        self.done = None;
        self.creating = false;
    }
}

struct Slots {
    slots: Box<[Slot]>,
    count: usize,
    last: Option<usize>,
}

impl Slots {
    fn get_mut(&mut self, id: TaskId, op: &'static str) -> PtaskResult<&mut Slot> {
        let slot = self
            .slots
            .get_mut(id.index)
            .ok_or(PtaskError::InvalidArgument("task id out of range"))?;
        if slot.generation != id.generation {
            return Err(PtaskError::invalid_state(op, "stale"));
        }
        Ok(slot)
    }

    fn get(&self, id: TaskId, op: &'static str) -> PtaskResult<&Slot> {
        let slot = self
            .slots
            .get(id.index)
            .ok_or(PtaskError::InvalidArgument("task id out of range"))?;
        if slot.generation != id.generation {
            return Err(PtaskError::invalid_state(op, "stale"));
        }
        Ok(slot)
    }

    fn expect_state(
        &mut self,
        id: TaskId,
        op: &'static str,
        expected: TaskState,
    ) -> PtaskResult<&mut Slot> {
        let slot = self.get_mut(id, op)?;
        if slot.creating {
            return Err(PtaskError::invalid_state(op, "Creating"));
        }
        if slot.state != expected {
            return Err(PtaskError::invalid_state(op, slot.state.as_str()));
        }
        Ok(slot)
    }

    fn free(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.state != TaskState::Free {
                slot.reset();
                self.count = self.count.saturating_sub(1);
            }
        }
    }
}

/// Registry of periodic tasks with a fixed number of slots.
///
/// All bookkeeping sits behind one priority-inheritance mutex. The lock is
/// never held while blocking on a task thread.
pub struct TaskRegistry {
    inner: PiMutex<Slots>,
    policy: PolicyCell,
    clock: SharedClock,
}

impl TaskRegistry {
    /// Create a registry with `capacity` slots, timing tasks by `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidArgument`] if `capacity` is zero.
    pub fn new(capacity: usize, clock: SharedClock) -> PtaskResult<Self> {
        ensure_arg!(capacity > 0, "registry capacity must be non-zero");
        let slots: Box<[Slot]> = (0..capacity).map(|_| Slot::default()).collect();
        Ok(Self {
            inner: PiMutex::new(Slots {
                slots,
                count: 0,
                last: None,
            }),
            policy: PolicyCell::default(),
            clock,
        })
    }

    /// Set the policy used for tasks created from now on.
    ///
    /// Set it before creating tasks; tasks already running keep theirs.
    pub fn set_scheduler(&self, policy: SchedPolicy) {
        self.policy.store(policy);
        tracing::debug!(%policy, "scheduling policy set");
    }

    /// Set the policy from a native Linux policy number.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidArgument`] for anything other than
    /// `SCHED_OTHER`, `SCHED_RR` and `SCHED_FIFO`.
    pub fn set_scheduler_native(&self, native: i32) -> PtaskResult {
        let policy = SchedPolicy::try_from(native)?;
        self.set_scheduler(policy);
        Ok(())
    }

    /// Current policy.
    #[must_use]
    pub fn policy(&self) -> SchedPolicy {
        self.policy.load()
    }

    /// Clock tasks are timed by.
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Allocate a slot. The new task is in [`TaskState::New`] with default
    /// parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::ResourceExhausted`] when every slot is in use.
    pub fn init(&self) -> PtaskResult<TaskId> {
        let mut inner = self.inner.lock();
        let capacity = inner.slots.len();
        if inner.count >= capacity {
            tracing::warn!(capacity, "no free task slot");
            return Err(PtaskError::ResourceExhausted(Resource::TaskSlots));
        }

        let mut index = inner.last.map_or(0, |last| (last + 1) % capacity);
        while inner.slots.get(index).is_some_and(|s| s.state != TaskState::Free) {
            index = (index + 1) % capacity;
        }

        let slot = inner
            .slots
            .get_mut(index)
            .ok_or(PtaskError::InvalidArgument("task id out of range"))?;
        slot.reset();
        slot.generation = slot.generation.wrapping_add(1);
        slot.shared = Arc::new(TaskShared::default());
        slot.state = TaskState::New;
        let id = TaskId::new(index, slot.generation);

        inner.last = Some(index);
        inner.count += 1;
        tracing::trace!(task = %id, "slot allocated");
        Ok(id)
    }

    /// Store the parameters of a task in [`TaskState::New`].
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidState`] outside `New`, and
    /// [`PtaskError::InvalidArgument`] for a zero period or a priority the
    /// current policy rejects.
    pub fn set_params(&self, id: TaskId, params: TaskParams) -> PtaskResult {
        let policy = self.policy();
        let mut inner = self.inner.lock();
        let slot = inner.expect_state(id, "set_params", TaskState::New)?;
        params.validate(policy)?;
        slot.params = params;
        Ok(())
    }

    /// Start the thread of a task in [`TaskState::New`].
    ///
    /// The thread first sets its own policy and priority, then acknowledges;
    /// `body` only runs after a successful acknowledgement. On success the
    /// task is `Joinable`. On failure it moves to `Error` and must be
    /// destroyed.
    ///
    /// The registry lock is not held while the thread is spawned and
    /// acknowledged. Meanwhile the slot still reads as `New`, and any other
    /// operation on it fails with `InvalidState`.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidState`] outside `New`,
    /// [`PtaskError::InvalidArgument`] if the parameters do not fit the
    /// current policy, and [`PtaskError::Os`] when the thread cannot be
    /// spawned or its scheduling attributes cannot be applied.
    pub fn create<F>(&self, id: TaskId, body: F) -> PtaskResult
    where
        F: FnOnce(&mut PeriodicTask) + Send + 'static,
    {
        let policy = self.policy();
        let (params, shared) = {
            let mut inner = self.inner.lock();
            let slot = inner.expect_state(id, "create", TaskState::New)?;
            slot.creating = true;
            (slot.params, Arc::clone(&slot.shared))
        };

        let outcome = self.spawn(id, params, shared, policy, body);

        let mut inner = self.inner.lock();
        let slot = inner.get_mut(id, "create")?;
        slot.creating = false;
        match outcome {
            Ok((thread, done)) => {
                slot.thread = Some(thread);
                slot.done = Some(done);
                slot.state = TaskState::Joinable;
                tracing::debug!(task = %id, %policy, priority = params.priority, "task created");
                Ok(())
            }
            Err(err) => {
                slot.state = TaskState::Error;
                tracing::warn!(task = %id, error = %err, "task creation failed");
                Err(err)
            }
        }
    }

    fn spawn<F>(
        &self,
        id: TaskId,
        params: TaskParams,
        shared: Arc<TaskShared>,
        policy: SchedPolicy,
        body: F,
    ) -> PtaskResult<(JoinHandle<()>, Receiver<()>)>
    where
        F: FnOnce(&mut PeriodicTask) + Send + 'static,
    {
        params.validate(policy)?;

        let mut task = PeriodicTask::new(id, params, Arc::clone(&self.clock), shared);
        let (ack_tx, ack_rx) = channel::bounded::<PtaskResult>(1);
        // Dropped when the thread finishes, panicking or not.
        let (done_tx, done_rx) = channel::bounded::<()>(0);

        let thread = thread::Builder::new()
            .name(format!("ptask-{}", id.index))
            .spawn(move || {
                let _done = done_tx;
                let setup = platform::apply_scheduling(policy, params.priority);
                let ready = setup.is_ok();
                if ack_tx.send(setup).is_err() || !ready {
                    return;
                }
                body(&mut task);
            })
            .map_err(|e| PtaskError::os("pthread_create", e.raw_os_error().unwrap_or(EAGAIN)))?;

        match ack_rx.recv() {
            Ok(Ok(())) => Ok((thread, done_rx)),
            Ok(Err(err)) => {
                let _exited = thread.join();
                Err(err)
            }
            Err(_) => {
                let _exited = thread.join();
                Err(PtaskError::TaskPanicked)
            }
        }
    }

    /// Release a task whose creation failed.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidState`] unless the task is in
    /// [`TaskState::Error`].
    pub fn destroy(&self, id: TaskId) -> PtaskResult {
        let mut inner = self.inner.lock();
        inner.expect_state(id, "destroy", TaskState::Error)?;
        inner.free(id.index);
        tracing::trace!(task = %id, "slot destroyed");
        Ok(())
    }

    /// Allocate, configure and start a task in one call.
    ///
    /// No slot is left allocated when any step fails.
    ///
    /// # Errors
    ///
    /// Any error of [`TaskRegistry::init`], [`TaskRegistry::set_params`] or
    /// [`TaskRegistry::create`].
    pub fn short_create<F>(&self, params: TaskParams, body: F) -> PtaskResult<TaskId>
    where
        F: FnOnce(&mut PeriodicTask) + Send + 'static,
    {
        let id = self.init()?;
        if let Err(err) = self.set_params(id, params) {
            self.inner.lock().free(id.index);
            return Err(err);
        }
        if let Err(err) = self.create(id, body) {
            self.destroy(id)?;
            return Err(err);
        }
        Ok(id)
    }

    /// Ask a running task to stop.
    ///
    /// Sets the flag observed by [`PeriodicTask::cancel_requested`] and
    /// returns immediately. The task stays `Joinable` and still has to be
    /// joined.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidState`] unless the task is `Joinable`.
    pub fn cancel(&self, id: TaskId) -> PtaskResult {
        let mut inner = self.inner.lock();
        let slot = inner.expect_state(id, "cancel", TaskState::Joinable)?;
        slot.shared.cancel.store(true, Ordering::Release);
        tracing::debug!(task = %id, "cancellation requested");
        Ok(())
    }

    /// Wait for a task's thread to finish and free its slot.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidState`] unless the task is `Joinable`
    /// and not already being joined, and [`PtaskError::TaskPanicked`] if the
    /// body panicked. The slot is freed in both the success and panic cases.
    pub fn join(&self, id: TaskId) -> PtaskResult {
        self.reap(id).map(drop)
    }

    /// Like [`TaskRegistry::join`], giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::TimedOut`] if the thread is still running after
    /// `timeout`; the task is then left `Joinable`. Otherwise the errors of
    /// [`TaskRegistry::join`].
    pub fn join_timeout(&self, id: TaskId, timeout: Duration) -> PtaskResult {
        self.join_with_stats(id, timeout).map(drop)
    }

    /// Like [`TaskRegistry::join_timeout`], returning the task's final
    /// counters taken just before its slot is freed.
    ///
    /// # Errors
    ///
    /// As [`TaskRegistry::join_timeout`].
    pub fn join_with_stats(&self, id: TaskId, timeout: Duration) -> PtaskResult<TaskStats> {
        let done = {
            let mut inner = self.inner.lock();
            let slot = inner.expect_state(id, "join", TaskState::Joinable)?;
            slot.done
                .clone()
                .ok_or(PtaskError::invalid_state("join", "Joining"))?
        };

        match done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => Err(PtaskError::TimedOut(timeout)),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => self.reap(id),
        }
    }

    fn reap(&self, id: TaskId) -> PtaskResult<TaskStats> {
        let thread = {
            let mut inner = self.inner.lock();
            let slot = inner.expect_state(id, "join", TaskState::Joinable)?;
            slot.thread
                .take()
                .ok_or(PtaskError::invalid_state("join", "Joining"))?
        };

        let outcome = thread.join();
        let stats = {
            let mut inner = self.inner.lock();
            let stats = Self::snapshot(id, inner.get(id, "join")?);
            inner.free(id.index);
            stats
        };

        match outcome {
            Ok(()) => {
                tracing::debug!(task = %id, activations = stats.activations, "task joined");
                Ok(stats)
            }
            Err(_) => {
                tracing::warn!(task = %id, "task body panicked");
                Err(PtaskError::TaskPanicked)
            }
        }
    }

    /// Current state of a task.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidState`] for a stale handle.
    pub fn state(&self, id: TaskId) -> PtaskResult<TaskState> {
        Ok(self.inner.lock().get(id, "state")?.state)
    }

    /// Parameters stored for a task.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidState`] for a stale handle.
    pub fn params(&self, id: TaskId) -> PtaskResult<TaskParams> {
        Ok(self.inner.lock().get(id, "params")?.params)
    }

    /// Deadline misses recorded by a task so far.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidState`] for a stale handle.
    pub fn miss_count(&self, id: TaskId) -> PtaskResult<u64> {
        let inner = self.inner.lock();
        let slot = inner.get(id, "miss_count")?;
        Ok(slot.shared.miss_count.load(Ordering::Relaxed))
    }

    /// Snapshot of a task's state and counters.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidState`] for a stale handle.
    pub fn stats(&self, id: TaskId) -> PtaskResult<TaskStats> {
        let inner = self.inner.lock();
        let slot = inner.get(id, "stats")?;
        Ok(Self::snapshot(id, slot))
    }

    fn snapshot(id: TaskId, slot: &Slot) -> TaskStats {
        TaskStats {
            id,
            state: slot.state,
            params: slot.params,
            miss_count: slot.shared.miss_count.load(Ordering::Relaxed),
            activations: slot.shared.activations.load(Ordering::Relaxed),
            cancel_requested: slot.shared.cancel.load(Ordering::Acquire),
        }
    }

    /// Identifiers of every allocated slot, in index order.
    #[must_use]
    pub fn live_tasks(&self) -> Vec<TaskId> {
        let inner = self.inner.lock();
        inner
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state != TaskState::Free)
            .map(|(index, slot)| TaskId::new(index, slot.generation))
            .collect()
    }

    /// Number of allocated slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().count
    }

    /// Check whether no slot is allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().slots.len()
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TaskRegistry")
            .field("policy", &self.policy())
            .field("len", &inner.count)
            .field("capacity", &inner.slots.len())
            .finish_non_exhaustive()
    }
}
