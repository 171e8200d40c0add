//! Cyclic asynchronous buffers (CABs).
//!
//! A CAB passes the latest value of a periodic producer to any number of
//! consumers running at different rates. The producer never blocks on a slow
//! consumer and consumers never see a half-written value:
//!
//! - [`CabPool`] creates CABs and enforces the runtime-wide limits
//! - [`Cab`] holds N buffers; [`Cab::reserve_write`] and
//!   [`Cab::reserve_read`] hand them out as guards
//! - [`SlotTable`] is the buffer bookkeeping behind each CAB's lock
//!
//! # Example
//!
//! ```
//! use ptask_cab::CabPool;
//! use ptask_time::MonotonicClock;
//!
//! # fn main() -> ptask_errors::PtaskResult {
//! let pool = CabPool::with_defaults(MonotonicClock::shared());
//! let frames = pool.create_zeroed("frames", 3, 4)?;
//!
//! frames.write_with(|buf| buf.copy_from_slice(&[1, 2, 3, 4]))?;
//! let sum: u32 = frames.read_with(|buf, _at| buf.iter().map(|b| u32::from(*b)).sum())?;
//! assert_eq!(sum, 10);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cab;
pub mod pool;
pub mod slots;

pub use cab::{Cab, ReadGuard, WriteGuard};
pub use pool::{CabId, CabInfo, CabPool, DEFAULT_MAX_CAB_BUFFERS, DEFAULT_MAX_CABS};
pub use slots::{SlotTable, Token};
