//! A single underlying player instance owned by an asset.

use crate::config::{clamp_rate, clamp_volume};
use crate::error::Result;
use bridge_traits::ChannelDriver;
use std::fmt;
use std::time::Duration;

/// Thin wrapper over one host driver.
///
/// Caches readiness and duration as reported through driver events, and
/// normalizes volume, rate and position on the way in and out. Only ever
/// touched from the playback context.
pub struct Channel {
    driver: Box<dyn ChannelDriver>,
    ready: bool,
    duration: Option<Duration>,
}

impl Channel {
    pub fn new(driver: Box<dyn ChannelDriver>) -> Self {
        let ready = driver.is_ready();
        let duration = driver.duration();
        Self {
            driver,
            ready,
            duration,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready || self.driver.is_ready()
    }

    pub(crate) fn mark_ready(&mut self, duration: Option<Duration>) {
        self.ready = true;
        if duration.is_some() {
            self.duration = duration;
        }
    }

    pub(crate) fn set_duration(&mut self, duration: Duration) {
        self.duration = Some(duration);
    }

    pub fn is_playing(&self) -> bool {
        self.driver.is_playing()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration.or_else(|| self.driver.duration())
    }

    /// Playback position, never past the known duration.
    pub fn position(&self) -> Duration {
        let position = self.driver.position();
        match self.duration() {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    pub fn live_edge(&self) -> Option<Duration> {
        self.driver.live_edge()
    }

    pub fn volume(&self) -> f32 {
        self.driver.volume()
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.driver.set_volume(clamp_volume(volume))?;
        Ok(())
    }

    pub fn set_rate(&mut self, rate: f32) -> Result<()> {
        self.driver.set_rate(clamp_rate(rate))?;
        Ok(())
    }

    pub fn set_looping(&mut self, looping: bool) -> Result<()> {
        self.driver.set_looping(looping)?;
        Ok(())
    }

    pub fn play(&mut self) -> Result<()> {
        self.driver.play()?;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.driver.pause()?;
        Ok(())
    }

    /// Halt and rewind to zero.
    pub fn stop(&mut self) -> Result<()> {
        self.driver.stop()?;
        Ok(())
    }

    pub fn seek(&mut self, position: Duration) -> Result<()> {
        self.driver.seek(position)?;
        Ok(())
    }

    pub fn release(mut self) {
        self.driver.release();
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("ready", &self.ready)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded {
        volume: f32,
        rate: f32,
        position: Duration,
        released: bool,
    }

    struct RecordingDriver(Arc<Mutex<Recorded>>);

    impl ChannelDriver for RecordingDriver {
        fn is_ready(&self) -> bool {
            false
        }
        fn is_playing(&self) -> bool {
            false
        }
        fn play(&mut self) -> BridgeResult<()> {
            Ok(())
        }
        fn pause(&mut self) -> BridgeResult<()> {
            Ok(())
        }
        fn stop(&mut self) -> BridgeResult<()> {
            Ok(())
        }
        fn seek(&mut self, position: Duration) -> BridgeResult<()> {
            self.0.lock().unwrap().position = position;
            Ok(())
        }
        fn position(&self) -> Duration {
            self.0.lock().unwrap().position
        }
        fn duration(&self) -> Option<Duration> {
            None
        }
        fn volume(&self) -> f32 {
            self.0.lock().unwrap().volume
        }
        fn set_volume(&mut self, volume: f32) -> BridgeResult<()> {
            self.0.lock().unwrap().volume = volume;
            Ok(())
        }
        fn set_rate(&mut self, rate: f32) -> BridgeResult<()> {
            self.0.lock().unwrap().rate = rate;
            Ok(())
        }
        fn set_looping(&mut self, _looping: bool) -> BridgeResult<()> {
            Ok(())
        }
        fn release(&mut self) {
            self.0.lock().unwrap().released = true;
        }
    }

    fn channel() -> (Channel, Arc<Mutex<Recorded>>) {
        let recorder = Arc::new(Mutex::new(Recorded::default()));
        (Channel::new(Box::new(RecordingDriver(recorder.clone()))), recorder)
    }

    #[test]
    fn clamps_volume_and_rate() {
        let (mut channel, recorder) = channel();
        channel.set_volume(3.0).unwrap();
        channel.set_rate(9.0).unwrap();
        assert_eq!(recorder.lock().unwrap().volume, 1.0);
        assert_eq!(recorder.lock().unwrap().rate, 4.0);

        channel.set_volume(-1.0).unwrap();
        assert_eq!(channel.volume(), 0.0);
    }

    #[test]
    fn position_is_clamped_to_duration() {
        let (mut channel, _recorder) = channel();
        channel.seek(Duration::from_secs(20)).unwrap();
        assert_eq!(channel.position(), Duration::from_secs(20));

        channel.set_duration(Duration::from_secs(12));
        assert_eq!(channel.position(), Duration::from_secs(12));
    }

    #[test]
    fn readiness_follows_driver_reports() {
        let (mut channel, recorder) = channel();
        assert!(!channel.is_ready());
        channel.mark_ready(Some(Duration::from_millis(125_400)));
        assert!(channel.is_ready());
        assert_eq!(channel.duration(), Some(Duration::from_millis(125_400)));

        channel.release();
        assert!(recorder.lock().unwrap().released);
    }
}
