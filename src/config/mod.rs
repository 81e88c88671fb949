//! Configuration module for KernelFlow-RS
//!
//! Runtime tuning for maps and the demo binary, stored as JSON:
//! - Default link capacity and kernel thread naming
//! - Throughput sampling interval
//! - Demo graph settings (see [`settings`])
//!
//! The binary reads the file named by the `KERNELFLOW_CONFIG` environment
//! variable and falls back to defaults when it is unset or unreadable.
//!
//! # Example
//!
//! ```ignore
//! use kernelflow_rs::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::load_or_default("kernelflow.json");
//! config.validate()?;
//! let mut map = Map::with_config(&config);
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{KernelFlowError, Result, ResultExt};
use crate::pipeline::MAX_LINK_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "KERNELFLOW_CONFIG";

/// Default in-flight buffers per link
pub const DEFAULT_CAPACITY: usize = 64;

/// Default prefix for kernel thread names
pub const DEFAULT_THREAD_PREFIX: &str = "kernel";

/// Default items between throughput samples
pub const DEFAULT_STATS_INTERVAL: u64 = 200;

/// Config path from the environment, if set
pub fn config_path_from_env() -> Option<PathBuf> {
    std::env::var_os(CONFIG_ENV_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Capacity of links created without an explicit one
    #[serde(default = "default_capacity")]
    pub default_capacity: usize,

    /// Kernel threads are named `{prefix}-{id}-{kernel name}`
    #[serde(default = "default_thread_prefix")]
    pub thread_name_prefix: String,

    /// Items between throughput samples in metered sinks; 0 disables them
    #[serde(default = "default_stats_interval")]
    pub stats_interval: u64,

    /// Demo graph settings
    #[serde(default)]
    pub demo: DemoConfig,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_thread_prefix() -> String {
    DEFAULT_THREAD_PREFIX.to_string()
}

fn default_stats_interval() -> u64 {
    DEFAULT_STATS_INTERVAL
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_capacity: DEFAULT_CAPACITY,
            thread_name_prefix: DEFAULT_THREAD_PREFIX.to_string(),
            stats_interval: DEFAULT_STATS_INTERVAL,
            demo: DemoConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load config from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(KernelFlowError::from)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(KernelFlowError::from)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save config as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)
            .map_err(KernelFlowError::from)
            .with_context(|| format!("Failed to write {}", path.as_ref().display()))
    }

    /// Reject values the runtime cannot use
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_LINK_CAPACITY).contains(&self.default_capacity) {
            return Err(KernelFlowError::Config(format!(
                "default_capacity must be between 1 and {}, got {}",
                MAX_LINK_CAPACITY, self.default_capacity
            )));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(KernelFlowError::Config(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        self.demo.validate()
    }
}

// ==================== Tests ====================
