//! LRU disk cache for remote audio files.

use super::config::CacheConfig;
use super::stats::CacheStats;
use crate::error::{PlaybackError, Result};
use crate::source::url_path;
use bridge_traits::http::{DynAsyncRead, HttpClient, HttpRequest, RetryPolicy};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_url;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

const PARTIAL_SUFFIX: &str = "part";
const FALLBACK_EXTENSION: &str = "audio";

static SHARED: Mutex<Option<Arc<DiskCache>>> = parking_lot::const_mutex(None);

#[derive(Debug, Clone)]
struct CacheEntry {
    path: PathBuf,
    size: u64,
}

struct CacheIndex {
    entries: LruCache<String, CacheEntry>,
    total_bytes: u64,
    evictions: u64,
    hits: u64,
    misses: u64,
}

impl CacheIndex {
    fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            total_bytes: 0,
            evictions: 0,
            hits: 0,
            misses: 0,
        }
    }

    fn insert(&mut self, key: String, entry: CacheEntry) {
        self.total_bytes += entry.size;
        if let Some(previous) = self.entries.put(key, entry) {
            self.total_bytes = self.total_bytes.saturating_sub(previous.size);
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.pop(key)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.size);
        Some(entry)
    }

    /// Pop least-recently-used entries until under `max_bytes`, always
    /// keeping the most recent one.
    fn evict_to(&mut self, max_bytes: u64) -> Vec<(String, CacheEntry)> {
        let mut evicted = Vec::new();
        while self.total_bytes > max_bytes && self.entries.len() > 1 {
            let Some((key, entry)) = self.entries.pop_lru() else {
                break;
            };
            self.total_bytes = self.total_bytes.saturating_sub(entry.size);
            self.evictions += 1;
            evicted.push((key, entry));
        }
        evicted
    }
}

/// Process-wide cache of downloaded remote audio, bounded by total bytes.
///
/// Files are keyed by the SHA-256 of their URL. Downloads stream into a unique
/// `.part` file that is renamed into place, so concurrent fetches of the same
/// URL never observe a half-written file.
pub struct DiskCache {
    config: CacheConfig,
    index: Mutex<CacheIndex>,
    initialized: OnceCell<()>,
    events: Option<EventBus>,
    retry: RetryPolicy,
}

impl DiskCache {
    /// Create a standalone cache. Most callers want [`DiskCache::acquire`].
    pub fn new(config: CacheConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| PlaybackError::Cache(format!("Invalid cache configuration: {e}")))?;

        Ok(Self {
            config,
            index: Mutex::new(CacheIndex::new()),
            initialized: OnceCell::new(),
            events: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Publish eviction and clear notifications on `events`.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Retry policy for transient download failures.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the shared cache, creating it with `config` on first use.
    ///
    /// Later calls return the existing instance; their config is ignored.
    pub fn acquire(config: CacheConfig, events: Option<EventBus>) -> Result<Arc<DiskCache>> {
        let mut shared = SHARED.lock();
        if let Some(cache) = shared.as_ref() {
            if cache.config != config {
                debug!(
                    directory = ?cache.config.directory,
                    "Shared cache already initialized; ignoring new configuration"
                );
            }
            return Ok(Arc::clone(cache));
        }

        let mut cache = DiskCache::new(config)?;
        cache.events = events;
        let cache = Arc::new(cache);
        *shared = Some(Arc::clone(&cache));
        Ok(cache)
    }

    /// Drop the shared instance. Holders keep their handle; the next
    /// [`DiskCache::acquire`] starts fresh.
    pub fn release_shared() {
        if SHARED.lock().take().is_some() {
            debug!("Released shared disk cache");
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    /// Create the directory and index existing files, oldest first, evicting
    /// down to the ceiling. Runs once; later calls are no-ops.
    pub async fn initialize(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| self.scan_directory())
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(directory = ?self.config.directory))]
    async fn scan_directory(&self) -> Result<()> {
        let directory = &self.config.directory;
        tokio::fs::create_dir_all(directory).await.map_err(|e| {
            PlaybackError::Cache(format!("Failed to create cache directory: {e}"))
        })?;

        let mut found: Vec<(String, CacheEntry, SystemTime)> = Vec::new();
        let mut dir = tokio::fs::read_dir(directory).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let metadata = match item.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };

            if path.extension().is_some_and(|ext| ext == PARTIAL_SUFFIX) {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(error = %e, "Failed to remove stale partial download");
                }
                continue;
            }

            let Some(key) = key_from_path(&path) else {
                continue;
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((
                key,
                CacheEntry {
                    path,
                    size: metadata.len(),
                },
                modified,
            ));
        }

        found.sort_by_key(|(_, _, modified)| *modified);

        let evicted = {
            let mut index = self.index.lock();
            for (key, entry, _) in found {
                index.insert(key, entry);
            }
            index.evict_to(self.config.max_size_bytes)
        };
        self.discard(evicted).await;

        let stats = self.stats();
        info!(
            entries = stats.entries,
            total_bytes = stats.total_bytes,
            "Disk cache initialized"
        );
        Ok(())
    }

    /// Path of the cached copy of `url`, touching it in the LRU order.
    pub fn lookup(&self, url: &str) -> Option<PathBuf> {
        let key = cache_key(url);
        let mut index = self.index.lock();
        index.entries.get(&key).map(|entry| entry.path.clone())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.lock().entries.contains(&cache_key(url))
    }

    /// Return the local path for `url`, downloading it on a miss.
    #[instrument(skip(self, http, headers), fields(url = %redact_url(url)))]
    pub async fn fetch(
        &self,
        http: &dyn HttpClient,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<PathBuf> {
        self.initialize().await?;

        let key = cache_key(url);
        if let Some(path) = self.hit(&key).await {
            debug!("Cache hit");
            return Ok(path);
        }

        let directory = &self.config.directory;
        let final_path = directory.join(format!("{key}.{}", extension_for(url)));
        let temp_path = directory.join(format!(
            "{key}.{}.{PARTIAL_SUFFIX}",
            uuid::Uuid::new_v4().simple()
        ));

        let request = HttpRequest::get(url).headers(headers.clone());
        let mut body = self.open_download(http, request).await?;

        let size = match write_body(&mut body, &temp_path).await {
            Ok(size) => size,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                    debug!(error = %cleanup, "No partial download to clean up");
                }
                return Err(e);
            }
        };

        tokio::fs::rename(&temp_path, &final_path).await?;

        let evicted = {
            let mut index = self.index.lock();
            index.misses += 1;
            index.insert(
                key,
                CacheEntry {
                    path: final_path.clone(),
                    size,
                },
            );
            index.evict_to(self.config.max_size_bytes)
        };
        self.discard(evicted).await;

        info!(bytes = size, "Cached remote audio");
        Ok(final_path)
    }

    /// Start the download, retrying transient failures per the retry policy.
    async fn open_download(
        &self,
        http: &dyn HttpClient,
        request: HttpRequest,
    ) -> Result<Box<DynAsyncRead>> {
        let mut attempt = 1;
        loop {
            match http.download_stream(request.clone()).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && self.retry.allows_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Download failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(PlaybackError::Cache(format!("Download failed: {e}"))),
            }
        }
    }

    async fn hit(&self, key: &str) -> Option<PathBuf> {
        let path = {
            let mut index = self.index.lock();
            let path = index.entries.get(key).map(|entry| entry.path.clone())?;
            index.hits += 1;
            path
        };

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Some(path);
        }

        warn!("Cached file disappeared; downloading again");
        let mut index = self.index.lock();
        index.hits = index.hits.saturating_sub(1);
        index.remove(key);
        None
    }

    /// Delete every cached file. Returns `(entries, bytes)` removed.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(usize, u64)> {
        let drained: Vec<(String, CacheEntry)> = {
            let mut index = self.index.lock();
            index.total_bytes = 0;
            let mut drained = Vec::with_capacity(index.entries.len());
            while let Some(item) = index.entries.pop_lru() {
                drained.push(item);
            }
            drained
        };

        let entries = drained.len();
        let mut bytes = 0;
        for (_, entry) in drained {
            bytes += entry.size;
            if let Err(e) = tokio::fs::remove_file(&entry.path).await {
                warn!(error = %e, "Failed to delete cached file");
            }
        }

        info!(entries, bytes, "Cleared disk cache");
        self.emit(CacheEvent::Cleared { entries, bytes });
        Ok((entries, bytes))
    }

    pub fn stats(&self) -> CacheStats {
        let index = self.index.lock();
        CacheStats {
            entries: index.entries.len(),
            total_bytes: index.total_bytes,
            max_bytes: self.config.max_size_bytes,
            evictions: index.evictions,
            hits: index.hits,
            misses: index.misses,
        }
    }

    async fn discard(&self, evicted: Vec<(String, CacheEntry)>) {
        for (key, entry) in evicted {
            if let Err(e) = tokio::fs::remove_file(&entry.path).await {
                warn!(error = %e, key = %key, "Failed to delete evicted file");
            }
            debug!(key = %key, bytes = entry.size, "Evicted cache entry");
            self.emit(CacheEvent::Evicted {
                key,
                bytes: entry.size,
            });
        }
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(events) = &self.events {
            events.emit(CoreEvent::Cache(event)).ok();
        }
    }
}

impl std::fmt::Debug for DiskCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCache")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .field("stats", &self.stats())
            .finish()
    }
}

async fn write_body(body: &mut DynAsyncRead, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let size = tokio::io::copy(body, &mut file).await?;
    file.flush().await?;
    Ok(size)
}

/// Hex SHA-256 of the URL.
pub fn cache_key(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

fn key_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let key = name.split('.').next()?;
    (key.len() == 64 && key.bytes().all(|b| b.is_ascii_hexdigit())).then(|| key.to_string())
}

/// File extension for a cached URL, `audio` when the URL has none.
fn extension_for(url: &str) -> String {
    let path = url_path(url);
    let last = path.rsplit('/').next().unwrap_or_default();
    match last.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => FALLBACK_EXTENSION.to_string(),
    }
}
