use super::PlayerBackend;
use crate::error::{PlaybackError, Result};
use crate::source::BackendKind;
use bridge_traits::MediaSource;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Bundled or user file opened eagerly on every channel.
#[derive(Debug, Clone)]
pub struct LocalChannelPlayer {
    path: PathBuf,
    delete_after_play: bool,
}

impl LocalChannelPlayer {
    pub(crate) fn new(path: PathBuf, delete_after_play: bool) -> Self {
        Self {
            path,
            delete_after_play,
        }
    }

    /// Check that `path` names a readable file.
    pub(crate) async fn prepare(
        asset_id: &str,
        path: &Path,
        delete_after_play: bool,
    ) -> Result<Self> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => {
                Ok(Self::new(path.to_path_buf(), delete_after_play))
            }
            Ok(_) => Err(PlaybackError::preparation(asset_id, "source is not a file")),
            Err(e) => Err(PlaybackError::preparation(
                asset_id,
                format!("source file unavailable: {e}"),
            )),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PlayerBackend for LocalChannelPlayer {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn media_source(&self) -> Option<MediaSource> {
        Some(MediaSource::File {
            path: self.path.clone(),
        })
    }

    fn discard_source(&self) {
        if !self.delete_after_play {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Deleted played source file"),
            Err(e) => warn!(error = %e, "Failed to delete played source file"),
        }
    }
}
