//! # Playback Error Types
//!
//! Error taxonomy shared by every playback backend.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Asset State Errors
    // ========================================================================
    /// No channel exists at the index an operation needs.
    #[error("No channel available at index {index} for asset {asset_id}")]
    ChannelUnavailable { asset_id: String, index: usize },

    /// Operation requires a backend that has signalled ready.
    #[error("Asset not prepared: {0}")]
    AssetNotPrepared(String),

    /// The asset has no channels (never opened, or already unloaded).
    #[error("No underlying player for asset {0}")]
    NoUnderlyingPlayer(String),

    /// An asset with this id already exists on the playback context.
    #[error("Asset already loaded: {0}")]
    AssetAlreadyLoaded(String),

    // ========================================================================
    // Preparation Errors
    // ========================================================================
    /// Constructing or preparing the backend failed.
    #[error("Preparation failed for {asset_id}: {reason}")]
    PreparationFailed { asset_id: String, reason: String },

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// Seek target is negative or not a finite number.
    #[error("Invalid seek target: {0}")]
    InvalidSeekTarget(f64),

    // ========================================================================
    // Context Errors
    // ========================================================================
    /// The owning playback context has shut down.
    #[error("Playback context closed")]
    ContextClosed,

    /// Teardown did not complete within the bounded wait.
    #[error("Teardown of {asset_id} timed out after {waited_ms} ms")]
    TeardownTimeout { asset_id: String, waited_ms: u64 },

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Remote audio cache operation failed.
    #[error("Cache error: {0}")]
    Cache(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Host player or HTTP bridge reported a failure.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    pub(crate) fn preparation(asset_id: impl Into<String>, reason: impl ToString) -> Self {
        PlaybackError::PreparationFailed {
            asset_id: asset_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if retrying the same call later can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::AssetNotPrepared(_)
                | PlaybackError::TeardownTimeout { .. }
                | PlaybackError::Bridge(BridgeError::OperationFailed(_))
        )
    }

    /// Returns `true` if the asset can no longer be used and must be
    /// preloaded again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlaybackError::NoUnderlyingPlayer(_)
                | PlaybackError::PreparationFailed { .. }
                | PlaybackError::ContextClosed
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
