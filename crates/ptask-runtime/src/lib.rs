//! Runtime object for periodic tasks and CABs.
//!
//! [`Runtime`] owns the task registry, the CAB pool and the clock they share,
//! built from a [`RuntimeConfig`] that can be loaded from JSON or YAML.
//! Shutdown cancels every task cooperatively and joins it within a bounded
//! time.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod prelude;
pub mod runtime;

pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use error::{ConfigError, ConfigResult};
pub use runtime::{Runtime, ShutdownReport};
