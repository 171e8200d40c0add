//! Error types for cabdemo

use ptask_errors::PtaskError;
use ptask_runtime::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] PtaskError),

    #[error("{0} task(s) did not stop cleanly")]
    UncleanShutdown(usize),
}

impl DemoError {
    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            DemoError::Config(_) => 2,
            DemoError::Runtime(_) => 3,
            DemoError::UncleanShutdown(_) => 4,
        }
    }
}
