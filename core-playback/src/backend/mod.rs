//! Backend variants behind a playback asset.
//!
//! The asset engine in [`crate::state`] is backend-agnostic; each backend
//! only answers the questions where local files, cached remote files and
//! live streams differ.

mod local;
mod remote;
mod stream;

pub use local::LocalChannelPlayer;
pub use remote::CachedRemotePlayer;
pub use stream::LiveStreamPlayer;

use crate::source::BackendKind;
use bridge_traits::MediaSource;
use std::path::PathBuf;
use std::time::Duration;

/// How an asset is made replayable after `stop()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopPolicy {
    /// Channels were rewound by the stop itself.
    Rewind,
    /// Release and reopen the media source.
    Rebuild,
}

/// Reaction to a driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorPolicy {
    Fatal,
    /// Release and recreate the channels; `attempt` counts consecutive
    /// recoveries.
    Recreate { attempt: u64 },
}

pub(crate) trait PlayerBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Source every channel of the asset opens; `None` while it is still
    /// being fetched.
    fn media_source(&self) -> Option<MediaSource>;

    /// Hand over the finished download of `url`. Returns `false` if this
    /// backend did not ask for it.
    fn attach_download(&mut self, _url: &str, _path: PathBuf) -> bool {
        false
    }

    fn stop_policy(&self) -> StopPolicy {
        StopPolicy::Rewind
    }

    fn error_policy(&mut self) -> ErrorPolicy {
        ErrorPolicy::Fatal
    }

    /// Called whenever every channel reports ready.
    fn on_ready(&mut self) {}

    /// Whether the media has a fixed timeline and duration.
    fn has_timeline(&self) -> bool {
        true
    }

    /// Whether duration reports are published as `DurationAvailable`.
    fn announces_duration(&self) -> bool {
        false
    }

    /// Where a play or resume should seek to, if anywhere.
    fn start_position(
        &self,
        requested: Option<Duration>,
        _live_edge: Option<Duration>,
        _live_offset: Duration,
    ) -> Option<Duration> {
        requested.filter(|position| !position.is_zero())
    }

    /// Remove the source once a play-once asset is done with it.
    fn discard_source(&self) {}
}
