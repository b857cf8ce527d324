//! # Core Configuration Module
//!
//! Builder-based configuration for the audio core.
//!
//! ## Overview
//!
//! [`CoreConfig`] holds the host bridges and process-wide settings the
//! service needs before any asset can be created. The builder validates
//! everything up front and fails with actionable messages when a capability
//! is missing.
//!
//! ## Required Dependencies
//!
//! - `PlayerFactory` - Builds the underlying player for every channel
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - Remote asset downloads (desktop default: reqwest). Without
//!   one, remote assets fail to preload.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .player_factory(Arc::new(MyPlayerFactory))
//!     .cache_dir("/path/to/cache")
//!     .cache_size_mb(200)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{HttpClient, PlayerFactory};
use std::path::PathBuf;
use std::sync::Arc;

/// Default remote cache ceiling.
pub const DEFAULT_CACHE_SIZE_MB: u64 = 100;

/// Largest accepted cache ceiling (100 GB).
pub const MAX_CACHE_SIZE_MB: u64 = 100_000;

/// Directory name used under the system temp dir when no cache dir is given.
pub const DEFAULT_CACHE_DIR_NAME: &str = "media";

/// Core configuration for the audio core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory holding cached remote audio
    pub cache_dir: PathBuf,

    /// Ceiling for the remote audio cache in megabytes
    pub cache_size_mb: u64,

    /// Capacity of the event bus per subscriber
    pub event_buffer_size: usize,

    /// HTTP client for remote assets (optional with desktop default)
    pub http_client: Option<Arc<dyn HttpClient>>,

    /// Host player factory (required)
    pub player_factory: Arc<dyn PlayerFactory>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("cache_dir", &self.cache_dir)
            .field("cache_size_mb", &self.cache_size_mb)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("has_http_client", &self.http_client.is_some())
            .finish_non_exhaustive()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Cache ceiling in bytes.
    pub fn cache_size_bytes(&self) -> u64 {
        self.cache_size_mb * 1024 * 1024
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - Cache directory is not empty
    /// - Cache size is reasonable (> 0 and <= 100GB)
    /// - Event buffer can hold at least one event
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.cache_size_mb == 0 {
            return Err(Error::Config(
                "Cache size must be greater than 0 MB".to_string(),
            ));
        }

        if self.cache_size_mb > MAX_CACHE_SIZE_MB {
            return Err(Error::Config(format!(
                "Cache size exceeds maximum of 100GB ({} MB)",
                MAX_CACHE_SIZE_MB
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn player_factory_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "PlayerFactory".to_string(),
        message: "A PlayerFactory implementation is required to open audio channels. \
                 iOS: wrap AVAudioPlayer/AVPlayer. Android: wrap ExoPlayer. \
                 Desktop: inject the host's audio sink."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Option<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    match ReqwestHttpClient::new() {
        Ok(client) => {
            let client: Arc<dyn HttpClient> = Arc::new(client);
            Some(client)
        }
        Err(err) => {
            tracing::warn!(error = %err, "Default HTTP client unavailable; remote assets disabled");
            None
        }
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Option<Arc<dyn HttpClient>> {
    None
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_CACHE_DIR_NAME)
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    cache_dir: Option<PathBuf>,
    cache_size_mb: Option<u64>,
    event_buffer_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    player_factory: Option<Arc<dyn PlayerFactory>>,
}

impl CoreConfigBuilder {
    /// Sets the directory for cached remote audio.
    ///
    /// Defaults to `<temp>/media`.
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Sets the remote cache ceiling in megabytes (default: 100 MB).
    pub fn cache_size_mb(mut self, size_mb: u64) -> Self {
        self.cache_size_mb = Some(size_mb);
        self
    }

    /// Sets the per-subscriber event buffer.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the HTTP client used for remote assets.
    ///
    /// With the `desktop-shims` feature a reqwest client is used when none is
    /// provided.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the host player factory (required).
    pub fn player_factory(mut self, factory: Arc<dyn PlayerFactory>) -> Self {
        self.player_factory = Some(factory);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no `PlayerFactory` was provided
    /// - [`Error::Config`] when a setting is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let player_factory = self
            .player_factory
            .ok_or_else(player_factory_missing_error)?;

        let http_client = match self.http_client {
            Some(client) => Some(client),
            None => provide_default_http_client(),
        };

        let config = CoreConfig {
            cache_dir: self.cache_dir.unwrap_or_else(default_cache_dir),
            cache_size_mb: self.cache_size_mb.unwrap_or(DEFAULT_CACHE_SIZE_MB),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            http_client,
            player_factory,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{DynAsyncRead, HttpRequest};
    use bridge_traits::{BridgeError, ChannelDriver, DriverEventSink, MediaSource};

    struct NullFactory;

    impl PlayerFactory for NullFactory {
        fn open(
            &self,
            _source: &MediaSource,
            _events: DriverEventSink,
        ) -> BridgeResult<Box<dyn ChannelDriver>> {
            Err(BridgeError::NotAvailable("no players in tests".to_string()))
        }
    }

    struct NullHttp;

    #[async_trait]
    impl HttpClient for NullHttp {
        async fn download_stream(&self, _request: HttpRequest) -> BridgeResult<Box<DynAsyncRead>> {
            Err(BridgeError::NotAvailable("offline".to_string()))
        }
    }

    #[test]
    fn test_missing_player_factory() {
        let err = CoreConfig::builder().build().unwrap_err();
        match err {
            Error::CapabilityMissing { capability, .. } => {
                assert_eq!(capability, "PlayerFactory")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = CoreConfig::builder()
            .player_factory(Arc::new(NullFactory))
            .http_client(Arc::new(NullHttp))
            .build()
            .unwrap();

        assert_eq!(config.cache_size_mb, DEFAULT_CACHE_SIZE_MB);
        assert_eq!(config.cache_size_bytes(), 100 * 1024 * 1024);
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert!(config.cache_dir.ends_with(DEFAULT_CACHE_DIR_NAME));
        assert!(config.http_client.is_some());
    }

    #[test]
    fn test_custom_values() {
        let config = CoreConfig::builder()
            .player_factory(Arc::new(NullFactory))
            .cache_dir("/tmp/audio-cache")
            .cache_size_mb(512)
            .event_buffer_size(16)
            .build()
            .unwrap();

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/audio-cache"));
        assert_eq!(config.cache_size_mb, 512);
        assert_eq!(config.event_buffer_size, 16);
    }

    #[test]
    fn test_rejects_zero_cache() {
        let result = CoreConfig::builder()
            .player_factory(Arc::new(NullFactory))
            .cache_size_mb(0)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_oversized_cache() {
        let result = CoreConfig::builder()
            .player_factory(Arc::new(NullFactory))
            .cache_size_mb(MAX_CACHE_SIZE_MB + 1)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_empty_cache_dir() {
        let result = CoreConfig::builder()
            .player_factory(Arc::new(NullFactory))
            .cache_dir("")
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_event_buffer() {
        let result = CoreConfig::builder()
            .player_factory(Arc::new(NullFactory))
            .event_buffer_size(0)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_default_http_client() {
        let config = CoreConfig::builder()
            .player_factory(Arc::new(NullFactory))
            .build()
            .unwrap();
        assert!(config.http_client.is_some());
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_no_default_http_client_without_shims() {
        let config = CoreConfig::builder()
            .player_factory(Arc::new(NullFactory))
            .build()
            .unwrap();
        assert!(config.http_client.is_none());
    }
}
