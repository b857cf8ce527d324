//! Public asset handle.
//!
//! A [`PlaybackAsset`] is a cheap, cloneable handle. Every call is forwarded
//! to the owning [`PlaybackContext`](crate::context::PlaybackContext), which
//! holds the channels and runs the operation against them.
//!
//! # Example
//!
//! ```ignore
//! let beep = context
//!     .preload("beep", AssetSource::local("/sounds/beep.wav"), AssetOptions::default().with_channels(3))
//!     .await?;
//!
//! // Overlapping triggers rotate through the three channels
//! beep.play().await?;
//! beep.play().await?;
//!
//! beep.set_volume_with_fade(0.2, Duration::from_millis(500)).await?;
//! beep.unload().await?;
//! ```

use crate::context::{ContextHandle, Job};
use crate::error::{PlaybackError, Result};
use crate::source::{AssetId, BackendKind};
use crate::state::DurationRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Asset lifecycle as seen from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Created but not yet registered with the context.
    Idle,
    /// Backend is still building its channels; operations are queued.
    Preparing,
    Ready,
    Playing,
    Paused,
    Stopped,
    Released,
    /// Preparation failed; operations that need channels fail.
    Failed,
}

impl Lifecycle {
    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Playing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Lifecycle::Released | Lifecycle::Failed)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Idle => "idle",
            Lifecycle::Preparing => "preparing",
            Lifecycle::Ready => "ready",
            Lifecycle::Playing => "playing",
            Lifecycle::Paused => "paused",
            Lifecycle::Stopped => "stopped",
            Lifecycle::Released => "released",
            Lifecycle::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Options for a single `play`/`loop` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayOptions {
    /// Start offset in seconds; zero or absent plays from the start (or the
    /// live edge for streams).
    pub time: Option<f64>,
    /// Volume applied to the claimed channel.
    pub volume: Option<f32>,
    /// Wait before starting. Cancelled by any later play, pause or stop.
    pub delay: Option<Duration>,
    /// Ramp from silence to the target volume.
    pub fade_in: Option<Duration>,
}

impl PlayOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, seconds: f64) -> Self {
        self.time = Some(seconds);
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_fade_in(mut self, duration: Duration) -> Self {
        self.fade_in = Some(duration);
        self
    }

    /// Requested start offset; invalid values mean "from the start".
    pub(crate) fn start_offset(&self) -> Option<Duration> {
        self.time
            .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
    }
}

/// Handle to one loaded asset.
#[derive(Clone)]
pub struct PlaybackAsset {
    id: AssetId,
    kind: BackendKind,
    context: ContextHandle,
    teardown_timeout: Duration,
}

impl PlaybackAsset {
    pub(crate) fn new(
        id: AssetId,
        kind: BackendKind,
        context: ContextHandle,
        teardown_timeout: Duration,
    ) -> Self {
        Self {
            id,
            kind,
            context,
            teardown_timeout,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Run `f` against this asset's state on the context.
    async fn run<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut crate::state::AssetState, &crate::context::Env) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let id = self.id.clone();
        self.context
            .call(move |stage| stage.with_asset(&id, f))
            .await?
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Play the next channel from the start at its current volume.
    pub async fn play(&self) -> Result<()> {
        self.play_with(PlayOptions::default()).await
    }

    /// Play the next channel.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::NoUnderlyingPlayer`] if the asset has no channels
    /// - [`PlaybackError::ChannelUnavailable`] if the claimed channel is gone
    /// - [`PlaybackError::PreparationFailed`] if the backend failed to prepare
    #[instrument(skip(self), fields(asset_id = %self.id))]
    pub async fn play_with(&self, options: PlayOptions) -> Result<()> {
        self.run(move |asset, env| asset.play(env, options, false))
            .await
    }

    /// Like [`play`](Self::play), repeating the claimed channel forever.
    pub async fn loop_play(&self) -> Result<()> {
        self.loop_with(PlayOptions::default()).await
    }

    #[instrument(skip(self), fields(asset_id = %self.id))]
    pub async fn loop_with(&self, options: PlayOptions) -> Result<()> {
        self.run(move |asset, env| asset.play(env, options, true))
            .await
    }

    /// Pause every playing channel. Returns whether anything was playing.
    pub async fn pause(&self) -> Result<bool> {
        self.run(|asset, _| Ok(asset.pause())).await
    }

    /// Fade the active channel to silence, then pause.
    pub async fn pause_with_fade(&self, duration: Duration) -> Result<bool> {
        self.run(move |asset, env| Ok(asset.pause_with_fade(env, duration)))
            .await
    }

    pub async fn resume(&self) -> Result<()> {
        self.run(|asset, env| asset.resume(env)).await
    }

    /// Stop every channel and make the asset replayable. Dispatches
    /// completion for the running cycle.
    pub async fn stop(&self) -> Result<()> {
        self.run(|asset, env| {
            asset.stop(env);
            Ok(())
        })
        .await
    }

    // ========================================================================
    // Volume and rate
    // ========================================================================

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.set_volume_with_fade(volume, Duration::ZERO).await
    }

    /// Ramp to `volume` over `duration` when a single channel is playing;
    /// otherwise apply it to every channel at once.
    pub async fn set_volume_with_fade(&self, volume: f32, duration: Duration) -> Result<()> {
        self.run(move |asset, env| asset.set_volume(env, volume, duration))
            .await
    }

    /// Volume of a single-channel asset; `0.0` for pools.
    pub async fn volume(&self) -> Result<f32> {
        self.run(|asset, _| Ok(asset.volume())).await
    }

    pub async fn set_rate(&self, rate: f32) -> Result<()> {
        self.run(move |asset, _| asset.set_rate(rate)).await
    }

    // ========================================================================
    // Timeline
    // ========================================================================

    /// Duration in seconds. Waits for the backend when it is still
    /// preparing. `0.0` for pools and live streams.
    pub async fn duration(&self) -> Result<f64> {
        match self.run(|asset, _| asset.duration()).await? {
            DurationRequest::Ready(seconds) => Ok(seconds),
            DurationRequest::Queued(waiter) => waiter
                .await
                .map_err(|_| PlaybackError::NoUnderlyingPlayer(self.id.clone()))?,
        }
    }

    pub async fn current_position(&self) -> Result<f64> {
        self.run(|asset, _| Ok(asset.current_position())).await
    }

    /// Seek a single-channel asset. Targets past the end clamp to the
    /// duration.
    pub async fn set_current_position(&self, seconds: f64) -> Result<()> {
        self.run(move |asset, _| asset.set_current_position(seconds))
            .await
    }

    pub async fn is_playing(&self) -> Result<bool> {
        self.run(|asset, _| Ok(asset.is_playing())).await
    }

    pub async fn state(&self) -> Result<Lifecycle> {
        self.run(|asset, _| Ok(asset.lifecycle())).await
    }

    pub async fn channel_count(&self) -> Result<usize> {
        self.run(|asset, _| Ok(asset.channel_count())).await
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Release every channel and stop all timers. Idempotent.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::TeardownTimeout`] if the context did not answer in
    ///   time
    #[instrument(skip(self), fields(asset_id = %self.id))]
    pub async fn unload(&self) -> Result<()> {
        let id = self.id.clone();
        let call = self.context.call(move |stage| stage.teardown(&id));

        match tokio::time::timeout(self.teardown_timeout, call).await {
            Ok(Ok(released)) => {
                if !released {
                    debug!("Asset already unloaded");
                }
                Ok(())
            }
            // Context gone means everything was released with it
            Ok(Err(PlaybackError::ContextClosed)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(self.timeout_error()),
        }
    }

    /// Blocking [`unload`](Self::unload) for callers outside any async
    /// context.
    ///
    /// Must not be called from a thread driving a current-thread runtime;
    /// the wait would always time out.
    pub fn unload_blocking(&self) -> Result<()> {
        let (reply, response) = std_mpsc::sync_channel(1);
        let id = self.id.clone();
        let job: Job = Box::new(move |stage| {
            let _ = reply.send(stage.teardown(&id));
        });
        if self.context.post(job).is_err() {
            return Ok(());
        }

        match response.recv_timeout(self.teardown_timeout) {
            Ok(_) => Ok(()),
            Err(std_mpsc::RecvTimeoutError::Disconnected) => Ok(()),
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                warn!(asset_id = %self.id, "Blocking unload timed out");
                Err(self.timeout_error())
            }
        }
    }

    fn timeout_error(&self) -> PlaybackError {
        PlaybackError::TeardownTimeout {
            asset_id: self.id.clone(),
            waited_ms: self.teardown_timeout.as_millis() as u64,
        }
    }
}

impl fmt::Debug for PlaybackAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackAsset")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_offset_ignores_invalid_times() {
        assert_eq!(PlayOptions::new().start_offset(), None);
        assert_eq!(PlayOptions::new().at(0.0).start_offset(), None);
        assert_eq!(PlayOptions::new().at(-2.0).start_offset(), None);
        assert_eq!(PlayOptions::new().at(f64::NAN).start_offset(), None);
        assert_eq!(
            PlayOptions::new().at(1.5).start_offset(),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn lifecycle_display_and_flags() {
        assert_eq!(Lifecycle::Preparing.to_string(), "preparing");
        assert!(Lifecycle::Playing.is_active());
        assert!(Lifecycle::Failed.is_terminal());
        assert!(!Lifecycle::Stopped.is_terminal());
    }
}
