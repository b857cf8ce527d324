//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the audio core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its logging conventions,
//! the event types delivered to host shells and the validated configuration
//! the service starts from.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
