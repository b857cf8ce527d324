//! # Playback Configuration
//!
//! Global playback behaviour ([`PlaybackConfig`]) and per-asset options
//! ([`AssetOptions`]).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Lowest volume an exponential ramp may reach.
pub const MIN_VOLUME: f32 = 0.001;
pub const MAX_VOLUME: f32 = 1.0;
pub const DEFAULT_VOLUME: f32 = 1.0;

pub const MIN_RATE: f32 = 0.25;
pub const MAX_RATE: f32 = 4.0;

/// Upper bound on channels per asset.
pub const MAX_CHANNELS: usize = 32;

/// Global playback configuration.
///
/// Tick intervals are exposed for tests and unusual hosts; production code
/// should keep the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackConfig {
    /// Fade out instead of cutting off when `stop()` is called.
    ///
    /// Default: false.
    #[serde(default)]
    pub fade_on_stop: bool,

    /// Duration of fade-on-stop and of fade-in when requested without an
    /// explicit duration.
    ///
    /// Default: 1 second.
    #[serde(default = "default_fade_duration")]
    pub fade_duration: Duration,

    /// How far behind the live edge live streams start.
    ///
    /// Default: 5 seconds.
    #[serde(default = "default_live_offset")]
    pub live_offset: Duration,

    /// Fade engine tick.
    ///
    /// Default: 80 ms.
    #[serde(default = "default_fade_tick")]
    pub fade_tick: Duration,

    /// Position ticker period.
    ///
    /// Default: 100 ms.
    #[serde(default = "default_position_tick")]
    pub position_tick: Duration,

    /// Delay before the first position tick of a cycle, letting the backend
    /// settle after `play`.
    ///
    /// Default: 100 ms.
    #[serde(default = "default_position_grace")]
    pub position_grace: Duration,

    /// Bounded wait for `unload` issued outside the playback context.
    ///
    /// Default: 2 seconds.
    #[serde(default = "default_teardown_timeout")]
    pub teardown_timeout: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fade_on_stop: false,
            fade_duration: default_fade_duration(),
            live_offset: default_live_offset(),
            fade_tick: default_fade_tick(),
            position_tick: default_position_tick(),
            position_grace: default_position_grace(),
            teardown_timeout: default_teardown_timeout(),
        }
    }
}

impl PlaybackConfig {
    /// Enable fade-on-stop with the given duration.
    pub fn with_fade_on_stop(mut self, duration: Duration) -> Self {
        self.fade_on_stop = true;
        self.fade_duration = duration;
        self
    }

    pub fn with_live_offset(mut self, offset: Duration) -> Self {
        self.live_offset = offset;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.fade_tick.is_zero() {
            return Err("fade_tick must be > 0".to_string());
        }

        if self.position_tick.is_zero() {
            return Err("position_tick must be > 0".to_string());
        }

        if self.teardown_timeout.is_zero() {
            return Err("teardown_timeout must be > 0".to_string());
        }

        Ok(())
    }
}

/// Options supplied when an asset is preloaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetOptions {
    /// Number of overlapping channels. Clamped to `[1, 32]`.
    ///
    /// Default: 1.
    #[serde(default = "default_channels")]
    pub channels: usize,

    /// Initial volume, also the target of fade-ins. Clamped to `[0, 1]`.
    ///
    /// Default: 1.0.
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Headers forwarded with every network request for this source.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Delete the local source file once a play-once asset completes.
    ///
    /// Default: false.
    #[serde(default)]
    pub delete_after_play: bool,
}

impl Default for AssetOptions {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            volume: default_volume(),
            headers: HashMap::new(),
            delete_after_play: false,
        }
    }
}

impl AssetOptions {
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_delete_after_play(mut self, delete: bool) -> Self {
        self.delete_after_play = delete;
        self
    }

    /// Copy of these options with every value forced into range.
    pub fn normalized(&self) -> Self {
        Self {
            channels: self.channels.clamp(1, MAX_CHANNELS),
            volume: clamp_volume(self.volume),
            headers: self.headers.clone(),
            delete_after_play: self.delete_after_play,
        }
    }
}

/// Clamp to `[0, 1]`, mapping NaN to silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, MAX_VOLUME)
    }
}

/// Clamp to `[MIN_RATE, MAX_RATE]`, mapping NaN to normal speed.
pub fn clamp_rate(rate: f32) -> f32 {
    if rate.is_nan() {
        1.0
    } else {
        rate.clamp(MIN_RATE, MAX_RATE)
    }
}

fn default_fade_duration() -> Duration {
    Duration::from_secs(1)
}

fn default_live_offset() -> Duration {
    Duration::from_secs(5)
}

fn default_fade_tick() -> Duration {
    Duration::from_millis(80)
}

fn default_position_tick() -> Duration {
    Duration::from_millis(100)
}

fn default_position_grace() -> Duration {
    Duration::from_millis(100)
}

fn default_teardown_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_channels() -> usize {
    1
}

fn default_volume() -> f32 {
    DEFAULT_VOLUME
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlaybackConfig::default();
        assert!(!config.fade_on_stop);
        assert_eq!(config.fade_tick, Duration::from_millis(80));
        assert_eq!(config.position_tick, Duration::from_millis(100));
        assert_eq!(config.live_offset, Duration::from_secs(5));
        assert_eq!(config.teardown_timeout, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_ticks() {
        let config = PlaybackConfig {
            fade_tick: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PlaybackConfig {
            position_tick: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builders() {
        let config = PlaybackConfig::default()
            .with_fade_on_stop(Duration::from_millis(400))
            .with_live_offset(Duration::from_secs(8));
        assert!(config.fade_on_stop);
        assert_eq!(config.fade_duration, Duration::from_millis(400));
        assert_eq!(config.live_offset, Duration::from_secs(8));
    }

    #[test]
    fn test_asset_options_normalized() {
        let options = AssetOptions::default()
            .with_channels(99)
            .with_volume(1.7)
            .with_header("Authorization", "Bearer x");
        let normalized = options.normalized();
        assert_eq!(normalized.channels, MAX_CHANNELS);
        assert_eq!(normalized.volume, 1.0);
        assert_eq!(normalized.headers.len(), 1);

        let zero = AssetOptions::default().with_channels(0).with_volume(-2.0);
        assert_eq!(zero.normalized().channels, 1);
        assert_eq!(zero.normalized().volume, 0.0);
    }

    #[test]
    fn test_clamps() {
        assert_eq!(clamp_volume(f32::NAN), 0.0);
        assert_eq!(clamp_volume(0.4), 0.4);
        assert_eq!(clamp_rate(10.0), MAX_RATE);
        assert_eq!(clamp_rate(0.0), MIN_RATE);
        assert_eq!(clamp_rate(f32::NAN), 1.0);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: AssetOptions = serde_json::from_str(r#"{"channels": 3}"#).unwrap();
        assert_eq!(options.channels, 3);
        assert_eq!(options.volume, DEFAULT_VOLUME);
        assert!(options.headers.is_empty());
        assert!(!options.delete_after_play);
    }
}
