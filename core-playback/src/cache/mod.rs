//! # Remote Audio Cache
//!
//! Shared on-disk cache for remote (progressive download) assets.
//!
//! ## Overview
//!
//! Every remote asset materializes its file through one process-wide
//! [`DiskCache`] before its channels are opened:
//! - Files keyed by the SHA-256 of their URL
//! - LRU eviction by total bytes against a fixed ceiling (default 100 MB)
//! - Streaming downloads through the host [`HttpClient`](bridge_traits::HttpClient)
//!   into a temporary file, atomically renamed into place
//! - Safe concurrent fetches from any number of assets
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     DiskCache (shared)                 │
//! │  - fetch()                             │
//! │  - lookup()                            │
//! │  - clear()                             │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> LruCache index (parking_lot::Mutex)
//!          ├──> tokio::fs (Storage)
//!          ├──> HttpClient (Downloads)
//!          └──> EventBus (Evicted / Cleared)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheConfig, DiskCache};
//!
//! # async fn example(http: &dyn bridge_traits::HttpClient) -> core_playback::Result<()> {
//! let cache = DiskCache::acquire(CacheConfig::default(), None)?;
//! let path = cache
//!     .fetch(http, "https://cdn.example.com/song.mp3", &Default::default())
//!     .await?;
//!
//! let stats = cache.stats();
//! println!("Cache size: {} MB", stats.total_bytes / 1_000_000);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use config::{CacheConfig, DEFAULT_MAX_CACHE_BYTES};
pub use stats::CacheStats;
pub use store::{cache_key, DiskCache};
