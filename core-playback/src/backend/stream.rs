use super::{ErrorPolicy, PlayerBackend, StopPolicy};
use crate::source::BackendKind;
use bridge_traits::MediaSource;
use std::collections::HashMap;
use std::time::Duration;

/// Live HLS stream. Has no timeline; stop and errors rebuild the source.
#[derive(Debug, Clone)]
pub struct LiveStreamPlayer {
    url: String,
    headers: HashMap<String, String>,
    recoveries: u64,
}

impl LiveStreamPlayer {
    pub(crate) fn new(url: String, headers: HashMap<String, String>) -> Self {
        Self {
            url,
            headers,
            recoveries: 0,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl PlayerBackend for LiveStreamPlayer {
    fn kind(&self) -> BackendKind {
        BackendKind::Stream
    }

    fn media_source(&self) -> Option<MediaSource> {
        Some(MediaSource::LiveStream {
            url: self.url.clone(),
            headers: self.headers.clone(),
        })
    }

    fn stop_policy(&self) -> StopPolicy {
        StopPolicy::Rebuild
    }

    // Unbounded; the counter only feeds logs and resets once ready.
    fn error_policy(&mut self) -> ErrorPolicy {
        self.recoveries += 1;
        ErrorPolicy::Recreate {
            attempt: self.recoveries,
        }
    }

    fn on_ready(&mut self) {
        self.recoveries = 0;
    }

    fn has_timeline(&self) -> bool {
        false
    }

    fn start_position(
        &self,
        requested: Option<Duration>,
        live_edge: Option<Duration>,
        live_offset: Duration,
    ) -> Option<Duration> {
        match requested.filter(|position| !position.is_zero()) {
            Some(position) => Some(position),
            None => live_edge.map(|edge| edge.saturating_sub(live_offset)),
        }
    }
}
