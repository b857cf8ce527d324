use super::PlayerBackend;
use crate::source::BackendKind;
use bridge_traits::MediaSource;
use std::path::{Path, PathBuf};

/// Remote file materialized through the shared
/// [`DiskCache`](crate::cache::DiskCache) and played from disk.
///
/// The download runs in the background after preload returns; channels open
/// once the cached copy is attached. Duration is reported late by the host
/// player and announced through `DurationAvailable`.
#[derive(Debug, Clone)]
pub struct CachedRemotePlayer {
    url: String,
    cached_path: Option<PathBuf>,
}

impl CachedRemotePlayer {
    pub(crate) fn new(url: String) -> Self {
        Self {
            url,
            cached_path: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Local copy, once the download has finished.
    pub fn cached_path(&self) -> Option<&Path> {
        self.cached_path.as_deref()
    }
}

impl PlayerBackend for CachedRemotePlayer {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn media_source(&self) -> Option<MediaSource> {
        self.cached_path
            .clone()
            .map(|path| MediaSource::File { path })
    }

    fn attach_download(&mut self, url: &str, path: PathBuf) -> bool {
        if url != self.url || self.cached_path.is_some() {
            return false;
        }
        self.cached_path = Some(path);
        true
    }

    fn announces_duration(&self) -> bool {
        true
    }
}
