//! Cache configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default ceiling for cached remote audio (100 MB).
pub const DEFAULT_MAX_CACHE_BYTES: u64 = 100 * 1024 * 1024;

/// Configuration for the shared remote-audio disk cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding cached files (default: `<temp>/media`)
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Maximum total size in bytes before LRU eviction (default: 100MB)
    #[serde(default = "default_max_bytes")]
    pub max_size_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            max_size_bytes: default_max_bytes(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache directory.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Set maximum cache size.
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size_bytes = bytes;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_size_bytes == 0 {
            return Err("max_size_bytes must be greater than 0".to_string());
        }

        if self.directory.as_os_str().is_empty() {
            return Err("directory cannot be empty".to_string());
        }

        Ok(())
    }
}

fn default_directory() -> PathBuf {
    std::env::temp_dir().join("media")
}

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_CACHE_BYTES
}
