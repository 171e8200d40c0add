//! Runtime configuration.

use std::path::Path;
use std::time::Duration;

use ptask_cab::{DEFAULT_MAX_CAB_BUFFERS, DEFAULT_MAX_CABS};
use ptask_scheduler::{DEFAULT_MAX_TASKS, SchedPolicy};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Limits and policy of a [`Runtime`](crate::Runtime).
///
/// Every field has a default, so a configuration file only needs the keys
/// it changes.
///
/// # Example
///
/// ```
/// use ptask_runtime::RuntimeConfig;
/// use ptask_scheduler::SchedPolicy;
///
/// let config = RuntimeConfig::from_yaml_str("policy: fifo\nmax_tasks: 8\n")?;
/// assert_eq!(config.policy, SchedPolicy::Fifo);
/// assert_eq!(config.max_tasks, 8);
/// assert_eq!(config.max_cabs, 50);
/// # Ok::<(), ptask_runtime::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Scheduling policy for every task.
    pub policy: SchedPolicy,

    /// Number of task slots.
    ///
    /// Default: 50.
    pub max_tasks: usize,

    /// Number of CABs that may ever be created.
    ///
    /// Default: 50.
    pub max_cabs: usize,

    /// Maximum number of buffers in one CAB.
    ///
    /// Default: 10.
    pub max_cab_buffers: usize,

    /// Lock process memory at startup. A failure is logged, not fatal.
    pub lock_memory: bool,

    /// Time allowed for all tasks to stop during shutdown, in milliseconds.
    ///
    /// Default: 1000.
    pub join_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            policy: SchedPolicy::TimeShared,
            max_tasks: DEFAULT_MAX_TASKS,
            max_cabs: DEFAULT_MAX_CABS,
            max_cab_buffers: DEFAULT_MAX_CAB_BUFFERS,
            lock_memory: false,
            join_timeout_ms: 1000,
        }
    }
}

impl RuntimeConfig {
    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a limit or the join timeout is
    /// zero.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_tasks == 0 {
            return Err(ConfigError::Invalid("max_tasks must be non-zero"));
        }
        if self.max_cabs == 0 {
            return Err(ConfigError::Invalid("max_cabs must be non-zero"));
        }
        if self.max_cab_buffers == 0 {
            return Err(ConfigError::Invalid("max_cab_buffers must be non-zero"));
        }
        if self.join_timeout_ms == 0 {
            return Err(ConfigError::Invalid("join_timeout_ms must be non-zero"));
        }
        Ok(())
    }

    /// Shutdown join timeout.
    #[must_use]
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] on malformed input and
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] on malformed input and
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a `.json`, `.yaml` or `.yml` file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::UnsupportedFormat`] for any other extension, and the
    /// parse and validation errors of the matching `from_*_str`.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let read = || {
            std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        };

        let config = match extension.as_str() {
            "json" => Self::from_json_str(&read()?)?,
            "yaml" | "yml" => Self::from_yaml_str(&read()?)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        tracing::debug!(path = %path.display(), policy = %config.policy, "configuration loaded");
        Ok(config)
    }
}

/// Builder for [`RuntimeConfig`].
#[derive(Debug, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    /// Set the scheduling policy.
    #[must_use]
    pub fn policy(mut self, policy: SchedPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Set the number of task slots.
    #[must_use]
    pub fn max_tasks(mut self, n: usize) -> Self {
        self.config.max_tasks = n;
        self
    }

    /// Set the runtime-wide CAB limit.
    #[must_use]
    pub fn max_cabs(mut self, n: usize) -> Self {
        self.config.max_cabs = n;
        self
    }

    /// Set the per-CAB buffer limit.
    #[must_use]
    pub fn max_cab_buffers(mut self, n: usize) -> Self {
        self.config.max_cab_buffers = n;
        self
    }

    /// Enable or disable memory locking.
    #[must_use]
    pub fn lock_memory(mut self, enabled: bool) -> Self {
        self.config.lock_memory = enabled;
        self
    }

    /// Set the shutdown join timeout in milliseconds.
    #[must_use]
    pub fn join_timeout_ms(mut self, ms: u64) -> Self {
        self.config.join_timeout_ms = ms;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> ConfigResult<RuntimeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
