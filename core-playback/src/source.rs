//! Source descriptors and backend classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifier of an asset registered on a playback context.
pub type AssetId = String;

/// Where an asset's audio comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetSource {
    /// Bundled or user file on local storage.
    Local { path: PathBuf },
    /// Progressive download materialized into the shared disk cache.
    Remote { url: String },
    /// Live HLS playlist.
    Stream { url: String },
}

impl AssetSource {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        AssetSource::Local { path: path.into() }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        AssetSource::Remote { url: url.into() }
    }

    pub fn stream(url: impl Into<String>) -> Self {
        AssetSource::Stream { url: url.into() }
    }

    /// Classify a raw location string.
    ///
    /// `http(s)` URLs whose path ends in `.m3u8` are live streams, other
    /// `http(s)` URLs are remote files, and everything else is treated as a
    /// local path (a leading `file://` is stripped).
    pub fn classify(location: &str) -> Self {
        let trimmed = location.trim();
        let lower = trimmed.to_ascii_lowercase();

        if lower.starts_with("http://") || lower.starts_with("https://") {
            if url_path(&lower).ends_with(".m3u8") {
                AssetSource::stream(trimmed)
            } else {
                AssetSource::remote(trimmed)
            }
        } else if let Some(path) = trimmed.strip_prefix("file://") {
            AssetSource::local(path)
        } else {
            AssetSource::local(trimmed)
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            AssetSource::Local { .. } => BackendKind::Local,
            AssetSource::Remote { .. } => BackendKind::Remote,
            AssetSource::Stream { .. } => BackendKind::Stream,
        }
    }
}

/// Backend family serving an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Local,
    Remote,
    Stream,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Local => "local",
            BackendKind::Remote => "remote",
            BackendKind::Stream => "stream",
        };
        f.write_str(name)
    }
}

/// URL without query string or fragment.
pub(crate) fn url_path(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}
