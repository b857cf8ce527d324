//! Core service façade and bootstrap helpers.
//!
//! [`AudioService`] wires the host bridges from a [`CoreConfig`] into one
//! playback context, keeps the registry of named assets and owns the shared
//! disk cache for the lifetime of the service. Desktop hosts typically enable
//! the `desktop-shims` feature, which supplies a reqwest-backed HTTP client
//! for remote assets.

pub mod error;

pub use error::{Result, ServiceError};

use core_playback::cache::{CacheConfig, CacheStats, DiskCache};
use core_playback::{
    AssetId, AssetOptions, AssetSource, PlayOptions, PlaybackAsset, PlaybackConfig,
    PlaybackContext,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::ReqwestHttpClient;

/// Primary façade exposed to host applications.
///
/// Must be created inside a tokio runtime.
pub struct AudioService {
    context: PlaybackContext,
    registry: RwLock<HashMap<AssetId, PlaybackAsset>>,
    cache: Arc<DiskCache>,
    events: EventBus,
}

impl AudioService {
    /// Create the service, acquiring the process-wide disk cache.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Runtime`] if `config` is invalid
    /// - [`ServiceError::InitializationFailed`] if the cache or playback
    ///   context cannot be set up
    pub fn new(config: CoreConfig, playback: PlaybackConfig) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_buffer_size);
        let cache_config = CacheConfig::new()
            .with_directory(config.cache_dir.clone())
            .with_max_size(config.cache_size_bytes());
        let cache = DiskCache::acquire(cache_config, Some(events.clone()))
            .map_err(|e| ServiceError::InitializationFailed(e.to_string()))?;

        let mut builder = PlaybackContext::builder(Arc::clone(&config.player_factory))
            .config(playback)
            .event_bus(events.clone())
            .cache(Arc::clone(&cache));
        match &config.http_client {
            Some(http) => builder = builder.http_client(Arc::clone(http)),
            None => warn!("No HTTP client configured; remote assets will fail to preload"),
        }
        let context = builder
            .build()
            .map_err(|e| ServiceError::InitializationFailed(e.to_string()))?;

        info!(
            cache_dir = ?cache.directory(),
            cache_size_mb = config.cache_size_mb,
            "Audio service started"
        );

        Ok(Self {
            context,
            registry: RwLock::new(HashMap::new()),
            cache,
            events,
        })
    }

    pub fn playback_config(&self) -> &PlaybackConfig {
        self.context.config()
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Preload `source` and register it under `id`.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::DuplicateAsset`] if `id` is already registered
    /// - [`ServiceError::Playback`] if the asset fails to preload
    #[instrument(skip(self, source, options), fields(backend = %source.kind()))]
    pub async fn create(
        &self,
        id: &str,
        source: AssetSource,
        options: AssetOptions,
    ) -> Result<PlaybackAsset> {
        if self.contains(id) {
            return Err(ServiceError::DuplicateAsset(id.to_string()));
        }

        let asset = self.context.preload(id, source, options).await?;

        let registered = match self.registry.write().entry(id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(asset.clone());
                true
            }
        };
        if !registered {
            // Lost a race with a concurrent create of the same id
            asset.unload().await?;
            return Err(ServiceError::DuplicateAsset(id.to_string()));
        }
        Ok(asset)
    }

    pub fn lookup(&self, id: &str) -> Option<PlaybackAsset> {
        self.registry.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.registry.read().contains_key(id)
    }

    pub fn asset_ids(&self) -> Vec<AssetId> {
        self.registry.read().keys().cloned().collect()
    }

    /// Unregister and unload `id`. Returns whether it was registered.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let removed = self.registry.write().remove(id);
        match removed {
            Some(asset) => {
                asset.unload().await?;
                debug!("Asset removed");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Play `source` once under a generated id. The asset unloads itself on
    /// completion and is never registered.
    #[instrument(skip(self, source, options, play), fields(backend = %source.kind()))]
    pub async fn play_once(
        &self,
        source: AssetSource,
        options: AssetOptions,
        play: PlayOptions,
    ) -> Result<PlaybackAsset> {
        let id = format!("once-{}", uuid::Uuid::new_v4());
        Ok(self.context.play_once(&id, source, options, play).await?)
    }

    // ========================================================================
    // Cache & events
    // ========================================================================

    /// Delete every cached remote file. Returns `(entries, bytes)` removed.
    pub async fn clear_cache(&self) -> Result<(usize, u64)> {
        Ok(self.cache.clear().await?)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Stream of every playback and cache event.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Unload every asset, stop the playback context and release the shared
    /// cache. Returns the number of assets that were still loaded.
    #[instrument(skip(self))]
    pub async fn shutdown(self) -> Result<usize> {
        let assets: Vec<PlaybackAsset> = self.registry.write().drain().map(|(_, a)| a).collect();
        for asset in &assets {
            if let Err(e) = asset.unload().await {
                warn!(asset_id = %asset.id(), error = %e, "Failed to unload asset during shutdown");
            }
        }

        let remaining = self.context.shutdown().await?;
        DiskCache::release_shared();

        let released = assets.len() + remaining;
        info!(released, "Audio service shut down");
        Ok(released)
    }
}

impl std::fmt::Debug for AudioService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioService")
            .field("assets", &self.registry.read().len())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
