//! Cache statistics and monitoring

use serde::{Deserialize, Serialize};

/// Snapshot of the disk cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cached files
    pub entries: usize,

    /// Total bytes used by cached files
    pub total_bytes: u64,

    /// Configured ceiling
    pub max_bytes: u64,

    /// Entries evicted since the cache was created
    pub evictions: u64,

    /// Lookups served from disk
    pub hits: u64,

    /// Lookups that required a download
    pub misses: u64,
}

impl CacheStats {
    /// Calculate cache usage as a percentage of the ceiling.
    pub fn usage_percentage(&self) -> f64 {
        if self.max_bytes == 0 {
            return 0.0;
        }

        (self.total_bytes as f64 / self.max_bytes as f64) * 100.0
    }

    /// Returns true if the cache is near capacity (>90%).
    pub fn is_near_capacity(&self) -> bool {
        self.usage_percentage() > 90.0
    }

    /// Returns true if the cache is full (>=100%).
    pub fn is_full(&self) -> bool {
        self.total_bytes >= self.max_bytes
    }

    /// Bytes above the ceiling. Only the most recent entry can exceed it.
    pub fn space_needed(&self) -> u64 {
        self.total_bytes.saturating_sub(self.max_bytes)
    }

    /// Returns average bytes per entry.
    pub fn average_entry_size(&self) -> u64 {
        if self.entries == 0 {
            0
        } else {
            self.total_bytes / self.entries as u64
        }
    }

    /// Percentage of lookups served from disk.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }

        (self.hits as f64 / lookups as f64) * 100.0
    }
}
