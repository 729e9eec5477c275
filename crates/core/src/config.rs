use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Runtime configuration, typically parsed from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of worker threads. 0 = available parallelism.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Plugin libraries to load at startup.
    #[serde(default)]
    pub plugin_paths: Vec<PathBuf>,
}

fn default_worker_threads() -> usize {
    0
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            plugin_paths: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, CoreError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }
}
