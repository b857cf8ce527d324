//! Fake host players and HTTP client shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{DynAsyncRead, HttpClient, HttpRequest};
use bridge_traits::{ChannelDriver, DriverEventSink, MediaSource, PlayerFactory};
use core_playback::{PlaybackConfig, PlaybackContext};
use core_runtime::events::{CoreEvent, PlaybackEvent, Receiver};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Player driver
// ============================================================================

/// Observable state of one fake player.
#[derive(Debug, Clone)]
pub struct DriverState {
    pub source: MediaSource,
    pub ready: bool,
    pub playing: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub volume: f32,
    /// Every volume written, in order.
    pub volumes: Vec<f32>,
    pub rate: f32,
    pub looping: bool,
    pub live_edge: Option<Duration>,
    pub plays: usize,
    pub seeks: Vec<Duration>,
    pub released: bool,
}

pub type Recorded = Arc<Mutex<DriverState>>;

pub struct FakeDriver {
    state: Recorded,
}

impl ChannelDriver for FakeDriver {
    fn is_ready(&self) -> bool {
        self.state.lock().unwrap().ready
    }

    fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }

    fn play(&mut self) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap();
        state.playing = true;
        state.plays += 1;
        Ok(())
    }

    fn pause(&mut self) -> BridgeResult<()> {
        self.state.lock().unwrap().playing = false;
        Ok(())
    }

    fn stop(&mut self) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap();
        state.playing = false;
        state.position = Duration::ZERO;
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap();
        state.position = position;
        state.seeks.push(position);
        Ok(())
    }

    fn position(&self) -> Duration {
        self.state.lock().unwrap().position
    }

    fn duration(&self) -> Option<Duration> {
        self.state.lock().unwrap().duration
    }

    fn volume(&self) -> f32 {
        self.state.lock().unwrap().volume
    }

    fn set_volume(&mut self, volume: f32) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap();
        state.volume = volume;
        state.volumes.push(volume);
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) -> BridgeResult<()> {
        self.state.lock().unwrap().rate = rate;
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) -> BridgeResult<()> {
        self.state.lock().unwrap().looping = looping;
        Ok(())
    }

    fn live_edge(&self) -> Option<Duration> {
        self.state.lock().unwrap().live_edge
    }

    fn release(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.playing = false;
        state.released = true;
    }
}

// ============================================================================
// Player factory
// ============================================================================

struct Opened {
    recorder: Recorded,
    sink: DriverEventSink,
}

struct FactoryState {
    ready_on_open: bool,
    duration: Option<Duration>,
    live_edge: Duration,
    failures: usize,
    opened: Vec<Opened>,
}

/// Factory recording every driver it creates.
pub struct FakeFactory {
    state: Mutex<FactoryState>,
}

impl FakeFactory {
    /// Drivers that are ready on return, with a 10 s duration for files.
    pub fn ready() -> Arc<Self> {
        Self::build(true)
    }

    /// Drivers that stay unready until the test emits `Ready`.
    pub fn deferred() -> Arc<Self> {
        Self::build(false)
    }

    fn build(ready_on_open: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FactoryState {
                ready_on_open,
                duration: Some(Duration::from_secs(10)),
                live_edge: Duration::from_secs(60),
                failures: 0,
                opened: Vec::new(),
            }),
        })
    }

    pub fn fail_next_opens(&self, count: usize) {
        self.state.lock().unwrap().failures = count;
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened.len()
    }

    pub fn recorder(&self, index: usize) -> Recorded {
        Arc::clone(&self.state.lock().unwrap().opened[index].recorder)
    }

    pub fn sink(&self, index: usize) -> DriverEventSink {
        self.state.lock().unwrap().opened[index].sink.clone()
    }

    /// Plays recorded per driver, in open order.
    pub fn plays(&self) -> Vec<usize> {
        self.state
            .lock()
            .unwrap()
            .opened
            .iter()
            .map(|opened| opened.recorder.lock().unwrap().plays)
            .collect()
    }
}

impl PlayerFactory for FakeFactory {
    fn open(
        &self,
        source: &MediaSource,
        events: DriverEventSink,
    ) -> BridgeResult<Box<dyn ChannelDriver>> {
        let mut factory = self.state.lock().unwrap();
        if factory.failures > 0 {
            factory.failures -= 1;
            return Err(BridgeError::PlayerError("decoder unavailable".into()));
        }

        let live = source.is_live();
        let recorder = Arc::new(Mutex::new(DriverState {
            source: source.clone(),
            ready: factory.ready_on_open,
            playing: false,
            position: Duration::ZERO,
            duration: if live || !factory.ready_on_open {
                None
            } else {
                factory.duration
            },
            volume: 1.0,
            volumes: Vec::new(),
            rate: 1.0,
            looping: false,
            live_edge: live.then_some(factory.live_edge),
            plays: 0,
            seeks: Vec::new(),
            released: false,
        }));
        factory.opened.push(Opened {
            recorder: Arc::clone(&recorder),
            sink: events,
        });
        Ok(Box::new(FakeDriver { state: recorder }))
    }
}

// ============================================================================
// HTTP client
// ============================================================================

/// Serves fixed bodies per URL and records every request.
#[derive(Default)]
pub struct FakeHttp {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<HttpRequest>>,
    /// Upcoming requests that fail with a server error.
    failures: Mutex<u32>,
}

impl FakeHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, body: &[u8]) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_vec());
    }

    /// Answer the next `count` requests with `503 Service Unavailable`.
    pub fn fail_next(&self, count: u32) {
        *self.failures.lock().unwrap() = count;
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn download_stream(&self, request: HttpRequest) -> BridgeResult<Box<DynAsyncRead>> {
        self.requests.lock().unwrap().push(request.clone());
        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(BridgeError::HttpStatus {
                    status: 503,
                    url: request.url,
                });
            }
        }
        match self.bodies.lock().unwrap().get(&request.url).cloned() {
            Some(body) => Ok(Box::new(std::io::Cursor::new(body))),
            None => Err(BridgeError::HttpStatus {
                status: 404,
                url: request.url,
            }),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn context(factory: &Arc<FakeFactory>) -> PlaybackContext {
    context_with(factory, PlaybackConfig::default())
}

pub fn context_with(factory: &Arc<FakeFactory>, config: PlaybackConfig) -> PlaybackContext {
    let factory: Arc<dyn PlayerFactory> = factory.clone();
    PlaybackContext::builder(factory)
        .config(config)
        .build()
        .unwrap()
}

/// Temporary directory for one test, removed when dropped.
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Small file standing in for a bundled sound.
    pub fn sound_file(&self) -> PathBuf {
        let path = self.path(&format!("{}.wav", uuid::Uuid::new_v4().simple()));
        std::fs::write(&path, b"RIFF0000WAVE").unwrap();
        path
    }
}

/// Wait until the factory has opened `count` players in total.
pub async fn wait_opened(factory: &FakeFactory, count: usize) {
    for _ in 0..1_000 {
        if factory.opened() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("expected {count} opened players, got {}", factory.opened());
}

/// Playback events received so far.
pub fn drain(rx: &mut Receiver<CoreEvent>) -> Vec<PlaybackEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::Playback(event) = event {
            events.push(event);
        }
    }
    events
}

pub fn completions(events: &[PlaybackEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, PlaybackEvent::Completed { .. }))
        .count()
}

pub fn positions(events: &[PlaybackEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|event| match event {
            PlaybackEvent::CurrentTime { seconds, .. } => Some(*seconds),
            _ => None,
        })
        .collect()
}

pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
