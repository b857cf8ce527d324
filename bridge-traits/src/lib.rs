//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the audio core and the
//! platform-specific players and services it drives. The core owns playback
//! state, fades and position tracking; the host supplies concrete players and
//! network access.
//!
//! ## Traits
//!
//! ### Playback
//! - [`PlayerFactory`](playback::PlayerFactory) - Builds one player per channel
//! - [`ChannelDriver`](playback::ChannelDriver) - A single underlying player instance
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Downloads for the remote audio cache
//!
//! ### Utilities
//! - [`LoggerSink`](logger::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop` (HTTP only) | ✅ In Progress |
//! | iOS      | Host shell          | 📋 Planned |
//! | Android  | Host shell          | 📋 Planned |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing, e.g. a remote asset preloaded without an `HttpClient`.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should convert platform errors into it and keep the
//! message actionable.
//!
//! ## Thread Safety
//!
//! Factories and clients are `Send + Sync`. Drivers are only `Send`: the core
//! moves them onto its playback context and never shares them.

pub mod error;
pub mod http;
pub mod logger;
pub mod playback;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpRequest, RetryPolicy};
pub use logger::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{ChannelDriver, DriverEvent, DriverEventSink, MediaSource, PlayerFactory};
