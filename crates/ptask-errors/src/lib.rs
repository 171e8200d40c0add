//! Error taxonomy for the ptask crates.
//!
//! Every fallible operation of the periodic-task manager and of the cyclic
//! asynchronous buffers returns a [`PtaskResult`]. The error type is `Copy`
//! and never allocates, so it can be produced and matched inside a task body
//! running under a real-time policy.
//!
//! # Example
//!
//! ```
//! use ptask_errors::{ErrorKind, PtaskError, Resource};
//!
//! let err = PtaskError::ResourceExhausted(Resource::TaskSlots);
//! assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
//! assert_eq!(err.errno(), 11); // EAGAIN
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod errno;
pub mod error;
pub mod prelude;

pub use error::{ErrorKind, PtaskError, Resource};

/// A specialized `Result` type for ptask operations.
pub type PtaskResult<T = ()> = std::result::Result<T, PtaskError>;
