//! # Playback Module
//!
//! Unified playback control over local files, cached remote files and live
//! streams.
//!
//! ## Overview
//!
//! This module handles:
//! - One asset contract ([`PlaybackAsset`]) regardless of backend
//! - Round-robin channel pools for overlapping one-shot sounds
//! - Fades and position reporting driven by tokio timers
//! - The shared LRU disk cache behind remote assets
//!
//! All channels live on a [`PlaybackContext`] actor; asset handles, timers
//! and host driver callbacks talk to it through its mailbox. Events
//! (completion, position, duration, errors) are published on the
//! [`core_runtime::events::EventBus`].

pub mod asset;
pub mod backend;
pub mod cache;
pub mod channel;
pub mod config;
pub mod context;
pub mod error;
pub mod fade;
pub mod source;
mod state;
pub mod ticker;

pub use asset::{Lifecycle, PlayOptions, PlaybackAsset};
pub use backend::{CachedRemotePlayer, LiveStreamPlayer, LocalChannelPlayer};
pub use cache::{CacheConfig, CacheStats, DiskCache};
pub use config::{AssetOptions, PlaybackConfig};
pub use context::{PlaybackContext, PlaybackContextBuilder};
pub use error::{PlaybackError, Result};
pub use fade::{FadeRamp, FadeState};
pub use source::{AssetId, AssetSource, BackendKind};
