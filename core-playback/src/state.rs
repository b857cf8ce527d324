//! Per-asset playback engine.
//!
//! [`AssetState`] is the actor-side half of a
//! [`PlaybackAsset`](crate::asset::PlaybackAsset): channels, rotation, fade
//! and ticker bookkeeping, the completion gate and the queue of operations
//! issued while the backend prepares. Every method runs on the playback
//! context.

use crate::asset::{Lifecycle, PlayOptions};
use crate::backend::{ErrorPolicy, PlayerBackend, StopPolicy};
use crate::channel::Channel;
use crate::config::{clamp_volume, AssetOptions};
use crate::context::Env;
use crate::error::{PlaybackError, Result};
use crate::fade::{FadeRamp, FadeState, FadeStep, FadeTask};
use crate::source::AssetId;
use crate::ticker::{classify_tick, PositionTicker, TickAction};
use bridge_traits::DriverEvent;
use core_runtime::events::PlaybackEvent;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

/// Operation deferred until the backend is ready.
#[derive(Debug, Clone)]
enum PendingAction {
    Play(PlayOptions),
    Loop(PlayOptions),
    Resume,
    Seek(f64),
}

/// Channel start, either immediate or after a delay.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StartPlan {
    index: usize,
    fade_in: Option<Duration>,
    target: f32,
}

/// Answer to a duration query.
pub(crate) enum DurationRequest {
    Ready(f64),
    /// Resolved once the backend reports ready.
    Queued(oneshot::Receiver<Result<f64>>),
}

pub(crate) struct AssetState {
    id: AssetId,
    backend: Box<dyn PlayerBackend>,
    options: AssetOptions,
    channels: Vec<Channel>,
    /// Next channel to claim.
    play_index: usize,
    /// Channel started most recently; fades and ticks follow it.
    active_index: usize,
    lifecycle: Lifecycle,
    fade_state: FadeState,
    fade: Option<FadeTask>,
    fade_generation: u64,
    ticker: Option<PositionTicker>,
    ticker_generation: u64,
    completion_dispatched: bool,
    paused: bool,
    cycle: u64,
    delayed_start: Option<JoinHandle<()>>,
    pending: Vec<PendingAction>,
    duration_waiters: Vec<oneshot::Sender<Result<f64>>>,
    /// Bumped whenever channels are (re)built.
    incarnation: u64,
    auto_cleanup: bool,
    teardown_requested: bool,
}

impl AssetState {
    pub(crate) fn new(
        id: AssetId,
        backend: Box<dyn PlayerBackend>,
        options: AssetOptions,
        auto_cleanup: bool,
    ) -> Self {
        Self {
            id,
            backend,
            options,
            channels: Vec::new(),
            play_index: 0,
            active_index: 0,
            lifecycle: Lifecycle::Idle,
            fade_state: FadeState::None,
            fade: None,
            fade_generation: 0,
            ticker: None,
            ticker_generation: 0,
            // Nothing has played yet, so there is nothing to complete
            completion_dispatched: true,
            paused: false,
            cycle: 0,
            delayed_start: None,
            pending: Vec::new(),
            duration_waiters: Vec::new(),
            incarnation: 0,
            auto_cleanup,
            teardown_requested: false,
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Leave `Idle`; operations issued from here on are queued until the
    /// backend reports ready.
    pub(crate) fn begin_preparation(&mut self) {
        if self.lifecycle == Lifecycle::Idle {
            self.lifecycle = Lifecycle::Preparing;
        }
    }

    pub(crate) fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub(crate) fn teardown_requested(&self) -> bool {
        self.teardown_requested
    }

    fn single(&self) -> Option<&Channel> {
        match self.channels.as_slice() {
            [channel] => Some(channel),
            _ => None,
        }
    }

    fn single_mut(&mut self) -> Option<&mut Channel> {
        match self.channels.as_mut_slice() {
            [channel] => Some(channel),
            _ => None,
        }
    }

    fn unavailable(&self, index: usize) -> PlaybackError {
        PlaybackError::ChannelUnavailable {
            asset_id: self.id.clone(),
            index,
        }
    }

    fn failed(&self) -> PlaybackError {
        PlaybackError::preparation(&self.id, "backend failed to prepare")
    }

    // ========================================================================
    // Channel construction
    // ========================================================================

    /// Open `options.channels` channels on the backend's media source.
    pub(crate) fn open_channels(&mut self, env: &Env) -> Result<()> {
        let source = self
            .backend
            .media_source()
            .ok_or_else(|| PlaybackError::AssetNotPrepared(self.id.clone()))?;
        self.incarnation += 1;

        let mut opened = Vec::with_capacity(self.options.channels);
        for index in 0..self.options.channels {
            let sink = env.driver_sink(&self.id, index, self.incarnation);
            match env.factory.open(&source, sink) {
                Ok(driver) => opened.push(Channel::new(driver)),
                Err(e) => {
                    opened.into_iter().for_each(Channel::release);
                    return Err(e.into());
                }
            }
        }

        for (index, channel) in opened.iter_mut().enumerate() {
            if let Err(e) = channel.set_volume(self.options.volume) {
                warn!(asset_id = %self.id, channel = index, error = %e, "Failed to apply initial volume");
            }
        }

        self.channels = opened;
        self.play_index = 0;
        self.active_index = 0;
        debug!(
            asset_id = %self.id,
            backend = %self.backend.kind(),
            channels = self.channels.len(),
            incarnation = self.incarnation,
            "Channels opened"
        );

        if self.channels.iter().all(Channel::is_ready) {
            self.become_ready(env);
        } else {
            self.lifecycle = Lifecycle::Preparing;
        }
        Ok(())
    }

    /// Attach a finished remote download and build the channels on it.
    pub(crate) fn on_download(&mut self, env: &Env, url: &str, result: Result<PathBuf>) {
        if self.lifecycle != Lifecycle::Preparing || !self.channels.is_empty() {
            trace!(asset_id = %self.id, lifecycle = %self.lifecycle, "Late download ignored");
            return;
        }
        match result {
            Ok(path) => {
                if !self.backend.attach_download(url, path) {
                    trace!(asset_id = %self.id, "Download for a replaced source ignored");
                    return;
                }
                if let Err(e) = self.open_channels(env) {
                    self.fail_preparation(env, e.to_string());
                }
            }
            Err(e) => self.fail_preparation(env, e.to_string()),
        }
    }

    fn release_channels(&mut self) {
        self.channels.drain(..).for_each(Channel::release);
    }

    fn become_ready(&mut self, env: &Env) {
        self.lifecycle = Lifecycle::Ready;
        self.backend.on_ready();

        let known = self.single().map_or(true, |channel| {
            !self.backend.has_timeline() || channel.duration().is_some()
        });
        if known {
            self.resolve_duration_waiters();
        }
        self.announce_duration(env);

        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            debug!(asset_id = %self.id, count = pending.len(), "Flushing queued operations");
        }
        for action in pending {
            let result = match action {
                PendingAction::Play(options) => self.play(env, options, false),
                PendingAction::Loop(options) => self.play(env, options, true),
                PendingAction::Resume => self.resume(env),
                PendingAction::Seek(seconds) => self.set_current_position(seconds),
            };
            if let Err(e) = result {
                warn!(asset_id = %self.id, error = %e, "Queued operation failed");
            }
        }
    }

    fn announce_duration(&self, env: &Env) {
        if !self.backend.announces_duration() {
            return;
        }
        if let Some(duration) = self.single().and_then(Channel::duration) {
            env.emit(PlaybackEvent::DurationAvailable {
                asset_id: self.id.clone(),
                seconds: duration.as_secs_f64(),
            });
        }
    }

    fn resolve_duration_waiters(&mut self) {
        let seconds = self.duration_secs();
        for waiter in self.duration_waiters.drain(..) {
            let _ = waiter.send(Ok(seconds));
        }
    }

    /// Mark preparation as failed and fail everything waiting on it.
    pub(crate) fn fail_preparation(&mut self, env: &Env, reason: String) {
        error!(asset_id = %self.id, reason = %reason, "Asset preparation failed");
        self.lifecycle = Lifecycle::Failed;
        self.pending.clear();
        for waiter in self.duration_waiters.drain(..) {
            let _ = waiter.send(Err(PlaybackError::preparation(&self.id, &reason)));
        }
        env.emit(PlaybackEvent::Error {
            asset_id: self.id.clone(),
            message: reason,
            recoverable: false,
        });
    }

    // ========================================================================
    // Fade and ticker bookkeeping
    // ========================================================================

    fn start_fade(&mut self, env: &Env, ramp: FadeRamp) {
        self.cancel_fade();
        self.fade_generation += 1;
        self.fade_state = ramp.state();
        trace!(
            asset_id = %self.id,
            generation = self.fade_generation,
            state = ?self.fade_state,
            steps = ramp.steps(),
            "Fade started"
        );
        self.fade = Some(FadeTask::start(
            env.mailbox.clone(),
            self.id.clone(),
            ramp,
            self.fade_generation,
            env.config.fade_tick,
        ));
    }

    fn cancel_fade(&mut self) {
        if let Some(task) = self.fade.take() {
            task.cancel();
        }
        self.fade_state = FadeState::None;
    }

    /// Start a ticker cycle; each cycle may complete once.
    fn start_ticker(&mut self, env: &Env) {
        self.stop_ticker();
        self.completion_dispatched = false;
        self.ticker_generation += 1;
        self.ticker = Some(PositionTicker::start(
            env.mailbox.clone(),
            self.id.clone(),
            self.ticker_generation,
            env.config.position_grace,
            env.config.position_tick,
        ));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop();
        }
    }

    /// Invalidate any delayed start of the current cycle.
    fn next_cycle(&mut self) {
        self.cycle += 1;
        if let Some(start) = self.delayed_start.take() {
            start.abort();
        }
    }

    fn dispatch_completion(&mut self, env: &Env) {
        if self.completion_dispatched {
            return;
        }
        self.completion_dispatched = true;
        debug!(asset_id = %self.id, "Playback completed");
        env.emit(PlaybackEvent::Completed {
            asset_id: self.id.clone(),
        });
        if self.auto_cleanup {
            self.teardown_requested = true;
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Claim the next channel and start it. `looping` repeats it forever.
    pub(crate) fn play(&mut self, env: &Env, options: PlayOptions, looping: bool) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Preparing => {
                debug!(asset_id = %self.id, looping, "Backend preparing; play queued");
                self.pending.push(if looping {
                    PendingAction::Loop(options)
                } else {
                    PendingAction::Play(options)
                });
                return Ok(());
            }
            Lifecycle::Failed => return Err(self.failed()),
            _ => {}
        }
        if self.channels.is_empty() {
            return Err(PlaybackError::NoUnderlyingPlayer(self.id.clone()));
        }

        self.cancel_fade();
        self.stop_ticker();
        self.next_cycle();

        let index = self.play_index;
        let live_offset = env.config.live_offset;
        let Some(channel) = self.channels.get_mut(index) else {
            return Err(self.unavailable(index));
        };

        let start = self
            .backend
            .start_position(options.start_offset(), channel.live_edge(), live_offset);
        if let Some(position) = start {
            channel.seek(position)?;
        }
        channel.set_looping(looping)?;
        if let Some(volume) = options.volume {
            channel.set_volume(volume)?;
        }

        let plan = StartPlan {
            index,
            fade_in: options.fade_in,
            target: options
                .volume
                .map(clamp_volume)
                .unwrap_or(self.options.volume),
        };
        self.play_index = (index + 1) % self.channels.len();

        match options.delay.filter(|delay| !delay.is_zero()) {
            Some(delay) => {
                self.schedule_start(env, delay, plan);
                Ok(())
            }
            None => self.begin_cycle(env, plan),
        }
    }

    fn schedule_start(&mut self, env: &Env, delay: Duration, plan: StartPlan) {
        let cycle = self.cycle;
        let id = self.id.clone();
        let mailbox = env.mailbox.clone();
        debug!(asset_id = %self.id, channel = plan.index, delay_ms = delay.as_millis() as u64, "Start scheduled");

        self.delayed_start = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            mailbox.post(Box::new(move |stage| stage.on_delayed_start(&id, cycle, plan)));
        }));
    }

    pub(crate) fn on_delayed_start(&mut self, env: &Env, cycle: u64, plan: StartPlan) {
        if cycle != self.cycle {
            trace!(asset_id = %self.id, cycle, "Stale delayed start ignored");
            return;
        }
        self.delayed_start = None;
        if let Err(e) = self.begin_cycle(env, plan) {
            warn!(asset_id = %self.id, channel = plan.index, error = %e, "Delayed start failed");
        }
    }

    /// Start a claimed channel and open a new completion cycle.
    fn begin_cycle(&mut self, env: &Env, plan: StartPlan) -> Result<()> {
        let Some(channel) = self.channels.get_mut(plan.index) else {
            return Err(self.unavailable(plan.index));
        };
        if plan.fade_in.is_some() {
            channel.set_volume(0.0)?;
        }
        channel.play()?;

        self.active_index = plan.index;
        self.paused = false;
        self.lifecycle = Lifecycle::Playing;
        self.start_ticker(env);

        if let Some(duration) = plan.fade_in {
            let ramp = FadeRamp::fade_in(plan.target, duration, env.config.fade_tick);
            self.start_fade(env, ramp);
        }
        trace!(asset_id = %self.id, channel = plan.index, "Channel started");
        Ok(())
    }

    /// Pause every playing channel. Returns whether anything was playing.
    pub(crate) fn pause(&mut self) -> bool {
        self.cancel_fade();
        self.stop_ticker();
        self.next_cycle();
        self.pending
            .retain(|action| matches!(action, PendingAction::Seek(_)));

        let mut was_playing = false;
        for (index, channel) in self.channels.iter_mut().enumerate() {
            if !channel.is_playing() {
                continue;
            }
            was_playing = true;
            if let Err(e) = channel.pause() {
                warn!(asset_id = %self.id, channel = index, error = %e, "Failed to pause channel");
            }
        }

        if !self.channels.is_empty() {
            self.paused = true;
            if matches!(self.lifecycle, Lifecycle::Playing | Lifecycle::Ready) {
                self.lifecycle = Lifecycle::Paused;
            }
        }
        was_playing
    }

    /// Fade the active channel out, then pause.
    pub(crate) fn pause_with_fade(&mut self, env: &Env, duration: Duration) -> bool {
        let audible = self
            .channels
            .get(self.active_index)
            .filter(|channel| channel.is_playing())
            .map(Channel::volume)
            .filter(|volume| *volume > 0.0);

        match audible {
            Some(volume) => {
                self.next_cycle();
                let ramp = FadeRamp::fade_out(volume, duration, env.config.fade_tick, true);
                self.start_fade(env, ramp);
                true
            }
            None => self.pause(),
        }
    }

    /// Restart the first channel.
    pub(crate) fn resume(&mut self, env: &Env) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Preparing => {
                debug!(asset_id = %self.id, "Backend preparing; resume queued");
                self.pending.push(PendingAction::Resume);
                return Ok(());
            }
            Lifecycle::Failed => return Err(self.failed()),
            _ => {}
        }

        self.cancel_fade();
        self.stop_ticker();
        self.next_cycle();

        let live_offset = env.config.live_offset;
        let Some(channel) = self.channels.first_mut() else {
            return Err(self.unavailable(0));
        };
        if let Some(position) = self
            .backend
            .start_position(None, channel.live_edge(), live_offset)
        {
            channel.seek(position)?;
        }
        channel.play()?;

        self.active_index = 0;
        self.paused = false;
        self.lifecycle = Lifecycle::Playing;
        self.start_ticker(env);
        Ok(())
    }

    /// Stop, fading out first when configured and audible.
    pub(crate) fn stop(&mut self, env: &Env) {
        if env.config.fade_on_stop {
            let audible = self
                .channels
                .get(self.active_index)
                .filter(|channel| channel.is_playing())
                .map(Channel::volume)
                .filter(|volume| *volume > 0.0);

            if let Some(volume) = audible {
                self.next_cycle();
                let ramp =
                    FadeRamp::fade_out(volume, env.config.fade_duration, env.config.fade_tick, false);
                self.start_fade(env, ramp);
                return;
            }
        }
        self.stop_now(env);
    }

    /// Stop every channel, dispatch completion and make the asset replayable.
    fn stop_now(&mut self, env: &Env) {
        self.cancel_fade();
        self.stop_ticker();
        self.next_cycle();
        self.pending.clear();

        for (index, channel) in self.channels.iter_mut().enumerate() {
            if let Err(e) = channel.stop() {
                warn!(asset_id = %self.id, channel = index, error = %e, "Failed to stop channel");
            }
        }
        self.paused = false;

        if matches!(self.lifecycle, Lifecycle::Preparing | Lifecycle::Failed) {
            return;
        }
        self.dispatch_completion(env);

        match self.backend.stop_policy() {
            StopPolicy::Rewind => self.lifecycle = Lifecycle::Stopped,
            StopPolicy::Rebuild => {
                debug!(asset_id = %self.id, "Rebuilding media source after stop");
                self.release_channels();
                if let Err(e) = self.open_channels(env) {
                    self.fail_preparation(env, e.to_string());
                }
            }
        }
    }

    // ========================================================================
    // Volume, rate and position
    // ========================================================================

    /// Set the volume of every channel, or ramp the single playing channel
    /// when `fade` is non-zero. Also becomes the target for later fade-ins.
    pub(crate) fn set_volume(&mut self, env: &Env, volume: f32, fade: Duration) -> Result<()> {
        let volume = clamp_volume(volume);
        self.options.volume = volume;

        let playing_single = self.single().is_some_and(Channel::is_playing);
        if !fade.is_zero() && playing_single {
            let current = self.single().map_or(volume, Channel::volume);
            let ramp = FadeRamp::fade_to(current, volume, fade, env.config.fade_tick);
            if let Some(target) = ramp.immediate_target() {
                self.cancel_fade();
                return self.apply_volume(target);
            }
            self.active_index = 0;
            self.start_fade(env, ramp);
            return Ok(());
        }

        self.cancel_fade();
        self.apply_volume(volume)
    }

    fn apply_volume(&mut self, volume: f32) -> Result<()> {
        for channel in &mut self.channels {
            channel.set_volume(volume)?;
        }
        Ok(())
    }

    pub(crate) fn volume(&self) -> f32 {
        self.single().map_or(0.0, Channel::volume)
    }

    fn duration_secs(&self) -> f64 {
        if !self.backend.has_timeline() {
            return 0.0;
        }
        self.single()
            .and_then(Channel::duration)
            .map_or(0.0, |duration| duration.as_secs_f64())
    }

    pub(crate) fn duration(&mut self) -> Result<DurationRequest> {
        match self.lifecycle {
            Lifecycle::Preparing if !self.backend.has_timeline() => {
                Ok(DurationRequest::Ready(0.0))
            }
            Lifecycle::Preparing => {
                let (tx, rx) = oneshot::channel();
                self.duration_waiters.push(tx);
                debug!(asset_id = %self.id, "Duration requested before ready; queued");
                Ok(DurationRequest::Queued(rx))
            }
            Lifecycle::Failed => Err(self.failed()),
            _ => Ok(DurationRequest::Ready(self.duration_secs())),
        }
    }

    pub(crate) fn current_position(&self) -> f64 {
        self.single()
            .map_or(0.0, |channel| channel.position().as_secs_f64())
    }

    pub(crate) fn set_current_position(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(PlaybackError::InvalidSeekTarget(seconds));
        }
        match self.lifecycle {
            Lifecycle::Preparing => {
                self.pending.push(PendingAction::Seek(seconds));
                return Ok(());
            }
            Lifecycle::Failed => return Err(self.failed()),
            _ => {}
        }

        let Some(channel) = self.single_mut() else {
            return Ok(());
        };
        let mut target = Duration::try_from_secs_f64(seconds)
            .map_err(|_| PlaybackError::InvalidSeekTarget(seconds))?;
        if let Some(duration) = channel.duration() {
            target = target.min(duration);
        }
        channel.seek(target)
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.single().is_some_and(Channel::is_playing)
    }

    pub(crate) fn set_rate(&mut self, rate: f32) -> Result<()> {
        if self.lifecycle == Lifecycle::Preparing {
            return Err(PlaybackError::AssetNotPrepared(self.id.clone()));
        }
        match self.single_mut() {
            Some(channel) => channel.set_rate(rate),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Timer and driver callbacks
    // ========================================================================

    pub(crate) fn on_fade_tick(&mut self, env: &Env, generation: u64) {
        let Some(task) = self.fade.as_mut() else {
            return;
        };
        if task.generation != generation {
            trace!(asset_id = %self.id, generation, "Stale fade tick ignored");
            return;
        }
        let mode = task.ramp.state();
        if self.fade_state != mode {
            self.cancel_fade();
            return;
        }
        let pause_after = task.ramp.pauses_on_finish();

        let index = self.active_index;
        let Some(channel) = self.channels.get_mut(index) else {
            warn!(asset_id = %self.id, channel = index, "Fade target channel vanished");
            self.cancel_fade();
            return;
        };
        if mode == FadeState::FadeTo && !channel.is_playing() {
            self.cancel_fade();
            return;
        }

        match task.ramp.step(channel.volume()) {
            FadeStep::Continue(volume) => {
                if let Err(e) = channel.set_volume(volume) {
                    warn!(asset_id = %self.id, channel = index, error = %e, "Fade step failed");
                    self.cancel_fade();
                }
            }
            FadeStep::Finish(volume) => {
                if let Err(e) = channel.set_volume(volume) {
                    warn!(asset_id = %self.id, channel = index, error = %e, "Final fade step failed");
                }
                self.cancel_fade();
                if mode == FadeState::FadeOut {
                    if pause_after {
                        self.pause();
                    } else {
                        self.stop_now(env);
                    }
                }
            }
        }
    }

    pub(crate) fn on_position_tick(&mut self, env: &Env, generation: u64) {
        match &self.ticker {
            Some(ticker) if ticker.generation == generation => {}
            _ => return,
        }
        let Some(channel) = self.channels.get(self.active_index) else {
            self.stop_ticker();
            return;
        };

        match classify_tick(
            channel.is_ready(),
            channel.is_playing(),
            self.paused,
            channel.position(),
        ) {
            TickAction::Report(seconds) => env.emit(PlaybackEvent::CurrentTime {
                asset_id: self.id.clone(),
                seconds,
            }),
            TickAction::Complete => {
                self.stop_ticker();
                if self.lifecycle == Lifecycle::Playing {
                    self.lifecycle = Lifecycle::Stopped;
                }
                self.dispatch_completion(env);
            }
            TickAction::Halt => self.stop_ticker(),
            TickAction::Wait => {}
        }
    }

    pub(crate) fn on_driver_event(
        &mut self,
        env: &Env,
        index: usize,
        incarnation: u64,
        event: DriverEvent,
    ) {
        if incarnation != self.incarnation {
            trace!(asset_id = %self.id, channel = index, incarnation, "Report from released driver ignored");
            return;
        }

        match event {
            DriverEvent::Ready { duration } => {
                if let Some(channel) = self.channels.get_mut(index) {
                    channel.mark_ready(duration);
                }
                let all_ready =
                    !self.channels.is_empty() && self.channels.iter().all(Channel::is_ready);
                if self.lifecycle == Lifecycle::Preparing && all_ready {
                    self.become_ready(env);
                }
            }
            DriverEvent::DurationChanged { duration } => {
                if let Some(channel) = self.channels.get_mut(index) {
                    channel.set_duration(duration);
                }
                if self.lifecycle != Lifecycle::Preparing {
                    self.resolve_duration_waiters();
                    self.announce_duration(env);
                }
            }
            DriverEvent::Error { message } => self.on_backend_error(env, index, message),
        }
    }

    fn on_backend_error(&mut self, env: &Env, index: usize, message: String) {
        match self.backend.error_policy() {
            ErrorPolicy::Recreate { attempt } => {
                warn!(
                    asset_id = %self.id,
                    channel = index,
                    attempt,
                    error = %message,
                    "Backend failed; recreating channels"
                );
                env.emit(PlaybackEvent::Error {
                    asset_id: self.id.clone(),
                    message,
                    recoverable: true,
                });

                let was_playing = self.lifecycle == Lifecycle::Playing
                    || self.channels.iter().any(Channel::is_playing);
                self.cancel_fade();
                self.stop_ticker();
                self.next_cycle();
                self.release_channels();

                let queued_start = self.pending.iter().any(|action| {
                    matches!(action, PendingAction::Play(_) | PendingAction::Loop(_))
                });
                if was_playing && !queued_start {
                    self.pending.push(PendingAction::Play(PlayOptions::default()));
                }

                if let Err(e) = self.open_channels(env) {
                    self.fail_preparation(env, e.to_string());
                }
            }
            ErrorPolicy::Fatal => {
                if self.lifecycle == Lifecycle::Preparing {
                    self.fail_preparation(env, message);
                    return;
                }
                error!(asset_id = %self.id, channel = index, error = %message, "Backend failed");
                env.emit(PlaybackEvent::Error {
                    asset_id: self.id.clone(),
                    message,
                    recoverable: false,
                });
            }
        }
    }

    /// Stop timers and release every channel.
    pub(crate) fn release(&mut self) {
        self.cancel_fade();
        self.stop_ticker();
        self.next_cycle();
        self.release_channels();
        self.pending.clear();
        for waiter in self.duration_waiters.drain(..) {
            let _ = waiter.send(Err(PlaybackError::NoUnderlyingPlayer(self.id.clone())));
        }
        self.lifecycle = Lifecycle::Released;
        if self.auto_cleanup {
            self.backend.discard_source();
        }
    }
}
