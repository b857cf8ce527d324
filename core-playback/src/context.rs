//! # Playback Context
//!
//! The single owner of every channel and all asset state.
//!
//! ## Overview
//!
//! A [`PlaybackContext`] runs one tokio task (the actor) that owns a [`Stage`]:
//! the map of asset states plus the shared environment (event bus, player
//! factory, configuration). Everything that touches a channel runs as a job on
//! that task:
//!
//! ```text
//!  PlaybackAsset ──call──┐
//!  fade timer ───post────┤
//!  position ticker ─post─┼──> mpsc (unbounded) ──> actor: job(&mut Stage)
//!  driver event sink ────┤
//!  delayed start ────────┘
//! ```
//!
//! Public handles send a boxed closure and await the reply on a `oneshot`.
//! Timers and driver sinks only hold a [`WeakContext`]; they stop on their own
//! once the context is gone. Ticks and driver reports carry a generation or
//! incarnation stamp so the actor can drop anything that arrives after the
//! task or driver it came from was replaced.

use crate::asset::{PlayOptions, PlaybackAsset};
use crate::backend::{CachedRemotePlayer, LiveStreamPlayer, LocalChannelPlayer, PlayerBackend};
use crate::cache::DiskCache;
use crate::config::{AssetOptions, PlaybackConfig};
use crate::error::{PlaybackError, Result};
use crate::source::{AssetId, AssetSource};
use crate::state::{AssetState, StartPlan};
use bridge_traits::{DriverEvent, DriverEventSink, HttpClient, PlayerFactory};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

pub(crate) type Job = Box<dyn FnOnce(&mut Stage) + Send>;

/// Strong sender into the actor.
#[derive(Clone)]
pub(crate) struct ContextHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl ContextHandle {
    pub(crate) fn post(&self, job: Job) -> Result<()> {
        self.tx.send(job).map_err(|_| PlaybackError::ContextClosed)
    }

    /// Run `f` on the actor and wait for its result.
    pub(crate) async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Stage) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        self.post(Box::new(move |stage| {
            let _ = reply.send(f(stage));
        }))?;
        response.await.map_err(|_| PlaybackError::ContextClosed)
    }

    pub(crate) fn downgrade(&self) -> WeakContext {
        WeakContext {
            tx: self.tx.downgrade(),
        }
    }
}

/// Sender that does not keep the actor alive.
#[derive(Clone)]
pub(crate) struct WeakContext {
    tx: mpsc::WeakUnboundedSender<Job>,
}

impl WeakContext {
    /// Returns `false` once the context is gone.
    pub(crate) fn post(&self, job: Job) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        }
    }
}

/// Shared, read-mostly environment handed to every asset operation.
pub(crate) struct Env {
    pub(crate) events: EventBus,
    pub(crate) config: PlaybackConfig,
    pub(crate) factory: Arc<dyn PlayerFactory>,
    pub(crate) mailbox: WeakContext,
}

impl Env {
    pub(crate) fn emit(&self, event: PlaybackEvent) {
        // No subscribers is not an error for the engine
        self.events.emit(CoreEvent::Playback(event)).ok();
    }

    /// Sink for one channel; reports are stamped so the actor can ignore
    /// drivers that were released since.
    pub(crate) fn driver_sink(&self, asset_id: &str, index: usize, incarnation: u64) -> DriverEventSink {
        let mailbox = self.mailbox.clone();
        let asset_id = asset_id.to_string();
        DriverEventSink::new(move |event: DriverEvent| {
            let id = asset_id.clone();
            mailbox.post(Box::new(move |stage| {
                stage.on_driver_event(&id, index, incarnation, event)
            }));
        })
    }
}

/// How an installed asset gets its channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Opening {
    /// Before `install` returns.
    Now,
    /// In a follow-up job, so the caller is not held up by host player
    /// construction.
    Deferred,
    /// Once a background download is attached.
    AfterDownload,
}

/// Remote fetch started after an asset is installed.
struct Download {
    cache: Arc<DiskCache>,
    http: Arc<dyn HttpClient>,
    url: String,
    headers: HashMap<String, String>,
}

/// State owned by the actor.
pub(crate) struct Stage {
    assets: HashMap<AssetId, AssetState>,
    env: Env,
    closing: bool,
}

impl Stage {
    fn new(env: Env) -> Self {
        Self {
            assets: HashMap::new(),
            env,
            closing: false,
        }
    }

    /// Run an operation on one asset, then apply any teardown it requested.
    pub(crate) fn with_asset<F, R>(&mut self, id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut AssetState, &Env) -> Result<R>,
    {
        let result = {
            let Stage { assets, env, .. } = self;
            let asset = assets
                .get_mut(id)
                .ok_or_else(|| PlaybackError::NoUnderlyingPlayer(id.to_string()))?;
            f(asset, env)
        };
        self.settle(id);
        result
    }

    fn settle(&mut self, id: &str) {
        let requested = self
            .assets
            .get(id)
            .is_some_and(AssetState::teardown_requested);
        if requested {
            debug!(asset_id = %id, "Auto-cleanup after completion");
            self.teardown(id);
        }
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.assets.contains_key(id)
    }

    pub(crate) fn asset_ids(&self) -> Vec<AssetId> {
        self.assets.keys().cloned().collect()
    }

    /// Register a new asset and start preparing it.
    pub(crate) fn install(&mut self, mut state: AssetState, opening: Opening) -> Result<()> {
        let id = state.id().to_string();
        if self.assets.contains_key(&id) {
            return Err(PlaybackError::AssetAlreadyLoaded(id));
        }
        state.begin_preparation();
        self.assets.insert(id.clone(), state);

        match opening {
            Opening::Now => {
                let opened = self.with_asset(&id, |asset, env| asset.open_channels(env));
                if let Err(e) = opened {
                    self.teardown(&id);
                    return Err(PlaybackError::preparation(id, e));
                }
            }
            Opening::Deferred => {
                let posted = self
                    .env
                    .mailbox
                    .post(Box::new(move |stage| stage.construct(&id)));
                if !posted {
                    return Err(PlaybackError::ContextClosed);
                }
            }
            Opening::AfterDownload => {}
        }
        Ok(())
    }

    fn construct(&mut self, id: &str) {
        let result = self.with_asset(id, |asset, env| {
            if let Err(e) = asset.open_channels(env) {
                asset.fail_preparation(env, e.to_string());
            }
            Ok(())
        });
        if result.is_err() {
            debug!(asset_id = %id, "Asset unloaded before its channels were built");
        }
    }

    pub(crate) fn on_download(&mut self, id: &str, url: &str, result: Result<PathBuf>) {
        let delivered = self.with_asset(id, |asset, env| {
            asset.on_download(env, url, result);
            Ok(())
        });
        if delivered.is_err() {
            debug!(asset_id = %id, "Asset unloaded before its download finished");
        }
    }

    /// Release an asset. Returns `false` if it was not loaded.
    pub(crate) fn teardown(&mut self, id: &str) -> bool {
        match self.assets.remove(id) {
            Some(mut asset) => {
                asset.release();
                info!(asset_id = %id, "Asset unloaded");
                true
            }
            None => false,
        }
    }

    pub(crate) fn on_fade_tick(&mut self, id: &str, generation: u64) {
        self.with_asset(id, |asset, env| {
            asset.on_fade_tick(env, generation);
            Ok(())
        })
        .ok();
    }

    pub(crate) fn on_position_tick(&mut self, id: &str, generation: u64) {
        self.with_asset(id, |asset, env| {
            asset.on_position_tick(env, generation);
            Ok(())
        })
        .ok();
    }

    pub(crate) fn on_driver_event(
        &mut self,
        id: &str,
        index: usize,
        incarnation: u64,
        event: DriverEvent,
    ) {
        self.with_asset(id, |asset, env| {
            asset.on_driver_event(env, index, incarnation, event);
            Ok(())
        })
        .ok();
    }

    pub(crate) fn on_delayed_start(&mut self, id: &str, cycle: u64, plan: StartPlan) {
        self.with_asset(id, |asset, env| {
            asset.on_delayed_start(env, cycle, plan);
            Ok(())
        })
        .ok();
    }

    fn shutdown(&mut self) -> usize {
        let ids = self.asset_ids();
        for id in &ids {
            self.teardown(id);
        }
        self.closing = true;
        ids.len()
    }
}

async fn run_actor(mut rx: mpsc::UnboundedReceiver<Job>, mut stage: Stage) {
    debug!("Playback context started");
    while let Some(job) = rx.recv().await {
        job(&mut stage);
        if stage.closing {
            break;
        }
    }
    // Handles may outlive the loop; release whatever is left
    stage.shutdown();
    debug!("Playback context stopped");
}

/// Owner of all playback assets.
///
/// Must be built inside a tokio runtime.
pub struct PlaybackContext {
    handle: ContextHandle,
    config: PlaybackConfig,
    events: EventBus,
    cache: Option<Arc<DiskCache>>,
    http: Option<Arc<dyn HttpClient>>,
    task: JoinHandle<()>,
}

impl PlaybackContext {
    pub fn builder(factory: Arc<dyn PlayerFactory>) -> PlaybackContextBuilder {
        PlaybackContextBuilder::new(factory)
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn cache(&self) -> Option<&Arc<DiskCache>> {
        self.cache.as_ref()
    }

    /// Load an asset and register it under `id`.
    ///
    /// Local files are checked and opened before this returns. Remote files
    /// are downloaded into the cache in the background and live-stream
    /// channels are built in a follow-up job; either way the asset is
    /// returned while still preparing, and operations issued meanwhile are
    /// queued until the backend reports ready. A failed download fails the
    /// queued requests and is published as an `Error` event.
    #[instrument(skip(self, source, options), fields(backend = %source.kind()))]
    pub async fn preload(
        &self,
        id: &str,
        source: AssetSource,
        options: AssetOptions,
    ) -> Result<PlaybackAsset> {
        self.load(id.to_string(), source, options, false).await
    }

    /// Load an asset that unloads itself after its first completion.
    #[instrument(skip(self, source, options), fields(backend = %source.kind()))]
    pub async fn preload_once(
        &self,
        id: &str,
        source: AssetSource,
        options: AssetOptions,
    ) -> Result<PlaybackAsset> {
        self.load(id.to_string(), source, options, true).await
    }

    async fn load(
        &self,
        id: AssetId,
        source: AssetSource,
        options: AssetOptions,
        auto_cleanup: bool,
    ) -> Result<PlaybackAsset> {
        if self.contains(&id).await? {
            return Err(PlaybackError::AssetAlreadyLoaded(id));
        }

        let options = options.normalized();
        let kind = source.kind();
        let mut download = None;
        let (backend, opening): (Box<dyn PlayerBackend>, Opening) = match source {
            AssetSource::Local { path } => {
                let delete = auto_cleanup && options.delete_after_play;
                let local = LocalChannelPlayer::prepare(&id, &path, delete).await?;
                (Box::new(local), Opening::Now)
            }
            AssetSource::Remote { url } => {
                let cache = self.cache.clone().ok_or_else(|| {
                    PlaybackError::preparation(&id, "no disk cache configured for remote assets")
                })?;
                let http = self.http.clone().ok_or_else(|| {
                    PlaybackError::preparation(&id, "no HTTP client configured for remote assets")
                })?;
                download = Some(Download {
                    cache,
                    http,
                    url: url.clone(),
                    headers: options.headers.clone(),
                });
                (Box::new(CachedRemotePlayer::new(url)), Opening::AfterDownload)
            }
            AssetSource::Stream { url } => (
                Box::new(LiveStreamPlayer::new(url, options.headers.clone())),
                Opening::Deferred,
            ),
        };

        let state = AssetState::new(id.clone(), backend, options, auto_cleanup);
        self.handle
            .call(move |stage| stage.install(state, opening))
            .await??;
        if let Some(download) = download {
            self.spawn_download(id.clone(), download);
        }

        info!(asset_id = %id, backend = %kind, "Asset preloaded");
        Ok(PlaybackAsset::new(
            id,
            kind,
            self.handle.clone(),
            self.config.teardown_timeout,
        ))
    }

    fn spawn_download(&self, id: AssetId, download: Download) {
        let mailbox = self.handle.downgrade();
        tokio::spawn(async move {
            let Download {
                cache,
                http,
                url,
                headers,
            } = download;
            debug!(asset_id = %id, "Fetching remote source");
            let result = cache.fetch(http.as_ref(), &url, &headers).await;
            let posted = mailbox.post(Box::new(move |stage| stage.on_download(&id, &url, result)));
            if !posted {
                debug!("Playback context closed before a download finished");
            }
        });
    }

    /// Preload `source` as an auto-cleanup asset and start it.
    pub async fn play_once(
        &self,
        id: &str,
        source: AssetSource,
        options: AssetOptions,
        play: PlayOptions,
    ) -> Result<PlaybackAsset> {
        let asset = self.preload_once(id, source, options).await?;
        if let Err(e) = asset.play_with(play).await {
            if let Err(unload) = asset.unload().await {
                warn!(asset_id = %asset.id(), error = %unload, "Failed to unload play-once asset");
            }
            return Err(e);
        }
        Ok(asset)
    }

    pub async fn contains(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.handle.call(move |stage| stage.contains(&id)).await
    }

    pub async fn asset_ids(&self) -> Result<Vec<AssetId>> {
        self.handle.call(|stage| stage.asset_ids()).await
    }

    /// Unload every asset and stop the actor. Handles fail with
    /// `ContextClosed` afterwards.
    #[instrument(skip(self))]
    pub async fn shutdown(self) -> Result<usize> {
        let released = self.handle.call(|stage| stage.shutdown()).await?;
        drop(self.handle);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Playback context task ended abnormally");
        }
        info!(released, "Playback context shut down");
        Ok(released)
    }
}

impl fmt::Debug for PlaybackContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackContext")
            .field("config", &self.config)
            .field("has_cache", &self.cache.is_some())
            .field("has_http_client", &self.http.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`PlaybackContext`].
pub struct PlaybackContextBuilder {
    factory: Arc<dyn PlayerFactory>,
    config: PlaybackConfig,
    events: Option<EventBus>,
    cache: Option<Arc<DiskCache>>,
    http: Option<Arc<dyn HttpClient>>,
}

impl PlaybackContextBuilder {
    fn new(factory: Arc<dyn PlayerFactory>) -> Self {
        Self {
            factory,
            config: PlaybackConfig::default(),
            events: None,
            cache: None,
            http: None,
        }
    }

    pub fn config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish events on an existing bus (default: a new bus).
    pub fn event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Disk cache used by remote assets.
    pub fn cache(mut self, cache: Arc<DiskCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// HTTP client used by remote assets.
    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Validate the configuration and spawn the actor.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::Internal`] when the configuration is invalid or no
    ///   tokio runtime is running
    pub fn build(self) -> Result<PlaybackContext> {
        self.config
            .validate()
            .map_err(|e| PlaybackError::Internal(format!("Invalid playback configuration: {e}")))?;

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            PlaybackError::Internal("PlaybackContext must be built inside a tokio runtime".into())
        })?;

        let events = self.events.unwrap_or_default();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ContextHandle { tx };

        let env = Env {
            events: events.clone(),
            config: self.config.clone(),
            factory: self.factory,
            mailbox: handle.downgrade(),
        };
        let task = runtime.spawn(run_actor(rx, Stage::new(env)));

        Ok(PlaybackContext {
            handle,
            config: self.config,
            events,
            cache: self.cache,
            http: self.http,
            task,
        })
    }
}
