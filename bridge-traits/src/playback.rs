//! Playback bridge traits and supporting types.
//!
//! The core never decodes audio. Each channel of an asset is backed by one
//! host player instance (AVAudioPlayer, ExoPlayer, a desktop sink) exposed
//! through [`ChannelDriver`]. Drivers are created by the host's
//! [`PlayerFactory`] and are only ever touched from the core's owning
//! playback context, so their methods are synchronous.

use crate::error::Result;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Media a host player should open for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// A file on local storage. Remote assets are materialized into the disk
    /// cache first and opened through this variant as well.
    File { path: PathBuf },
    /// A live HLS playlist resolved and buffered by the host player.
    LiveStream {
        url: String,
        headers: HashMap<String, String>,
    },
}

impl MediaSource {
    /// Returns `true` for sources with no fixed timeline.
    pub fn is_live(&self) -> bool {
        matches!(self, MediaSource::LiveStream { .. })
    }
}

/// Asynchronous notifications a driver reports after construction.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// The player finished preparing and can start immediately.
    Ready { duration: Option<Duration> },
    /// The player learned (or revised) the media duration.
    DurationChanged { duration: Duration },
    /// Playback failed; the player must be released.
    Error { message: String },
}

/// Callback handed to a driver at construction.
///
/// The sink may be invoked from any host thread; the core re-marshals every
/// report onto its playback context.
#[derive(Clone)]
pub struct DriverEventSink(Arc<dyn Fn(DriverEvent) + Send + Sync>);

impl DriverEventSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(DriverEvent) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Report an event to the core.
    pub fn emit(&self, event: DriverEvent) {
        (self.0)(event)
    }

    /// Sink that discards every event.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }
}

impl fmt::Debug for DriverEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverEventSink").finish_non_exhaustive()
    }
}

/// One concrete underlying player instance.
///
/// Contract expected by the core:
/// - `is_ready` stays `false` while the player is preparing or buffering.
/// - `play` on a player that reached its end restarts from the beginning.
/// - `stop` halts playback and rewinds to zero.
/// - `release` frees platform resources; no other method is called afterwards.
pub trait ChannelDriver: Send {
    fn is_ready(&self) -> bool;

    fn is_playing(&self) -> bool;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn seek(&mut self, position: Duration) -> Result<()>;

    fn position(&self) -> Duration;

    /// `None` until known, and always `None` for live streams.
    fn duration(&self) -> Option<Duration>;

    fn volume(&self) -> f32;

    fn set_volume(&mut self, volume: f32) -> Result<()>;

    fn set_rate(&mut self, rate: f32) -> Result<()>;

    /// Repeat forever when `true`.
    fn set_looping(&mut self, looping: bool) -> Result<()>;

    /// Current live edge for live streams.
    fn live_edge(&self) -> Option<Duration> {
        None
    }

    fn release(&mut self);
}

/// Host factory creating drivers for a media source.
pub trait PlayerFactory: Send + Sync {
    /// Build a player for `source`.
    ///
    /// Local file players are expected to be ready on return; players that
    /// prepare asynchronously report [`DriverEvent::Ready`] through `events`.
    fn open(&self, source: &MediaSource, events: DriverEventSink)
        -> Result<Box<dyn ChannelDriver>>;
}
