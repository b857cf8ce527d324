//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, used by the remote audio cache
//!
//! Players are always supplied by the host shell; there is no desktop
//! `PlayerFactory` here.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::sync::Arc;
//!
//! let http = Arc::new(ReqwestHttpClient::new()?);
//! let config = CoreConfig::builder()
//!     .player_factory(factory)
//!     .http_client(http)
//!     .build()?;
//! ```

mod http;

pub use http::ReqwestHttpClient;
