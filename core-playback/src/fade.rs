//! # Fade Engine
//!
//! Volume ramps applied to an asset's active channel.
//!
//! A fade is split in two halves:
//! - [`FadeRamp`], a pure step function deciding the volume for each tick.
//! - A timer task ([`spawn_fade_timer`]) that only posts generation-stamped
//!   tick jobs to the playback context. The volume write itself always happens
//!   on the context, which discards ticks whose generation or mode no longer
//!   matches the asset's current fade.
//!
//! Fade-in and fade-out are linear; fade-to is exponential so that perceived
//! loudness changes evenly.

use crate::config::{clamp_volume, MAX_VOLUME, MIN_VOLUME};
use crate::context::WeakContext;
use crate::source::AssetId;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Kind of ramp in progress on an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FadeState {
    #[default]
    None,
    FadeIn,
    FadeOut,
    FadeTo,
}

/// Outcome of one ramp step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeStep {
    /// Write this volume and keep going.
    Continue(f32),
    /// Write this volume; the fade is over.
    Finish(f32),
}

/// Number of ticks a fade of `duration` takes: `max(1, ceil(duration / tick))`.
pub fn step_count(duration: Duration, tick: Duration) -> u32 {
    let tick = tick.as_nanos().max(1);
    let steps = duration.as_nanos().div_ceil(tick).max(1);
    u32::try_from(steps).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Rise { target: f32, per_step: f32 },
    Fall { start: f32, per_step: f32, to_pause: bool },
    Exponential { target: f32, ratio: f32, immediate: bool },
}

/// Pure per-tick step function of a fade.
#[derive(Debug, Clone, PartialEq)]
pub struct FadeRamp {
    shape: Shape,
    steps: u32,
    taken: u32,
}

impl FadeRamp {
    /// Linear ramp from silence to `target`.
    pub fn fade_in(target: f32, duration: Duration, tick: Duration) -> Self {
        let target = clamp_volume(target);
        let steps = step_count(duration, tick);
        Self {
            shape: Shape::Rise {
                target,
                per_step: target / steps as f32,
            },
            steps,
            taken: 0,
        }
    }

    /// Linear ramp from `current` down to silence.
    pub fn fade_out(current: f32, duration: Duration, tick: Duration, to_pause: bool) -> Self {
        let start = clamp_volume(current);
        let steps = step_count(duration, tick);
        Self {
            shape: Shape::Fall {
                start,
                per_step: start / steps as f32,
                to_pause,
            },
            steps,
            taken: 0,
        }
    }

    /// Exponential ramp from `current` to `target`.
    ///
    /// Both ends are floored at [`MIN_VOLUME`] for the ratio computation. A
    /// non-finite, non-positive or unit ratio makes the fade immediate.
    pub fn fade_to(current: f32, target: f32, duration: Duration, tick: Duration) -> Self {
        let steps = step_count(duration, tick);
        let v0 = current.max(MIN_VOLUME);
        let vt = target.max(MIN_VOLUME);

        let ratio = (vt / v0).powf(1.0 / steps as f32);
        let immediate =
            !ratio.is_finite() || ratio <= 0.0 || (ratio - 1.0).abs() <= f32::EPSILON;

        Self {
            shape: Shape::Exponential {
                target: clamp_volume(target),
                ratio: if immediate { 1.0 } else { ratio },
                immediate,
            },
            steps,
            taken: 0,
        }
    }

    pub fn state(&self) -> FadeState {
        match self.shape {
            Shape::Rise { .. } => FadeState::FadeIn,
            Shape::Fall { .. } => FadeState::FadeOut,
            Shape::Exponential { .. } => FadeState::FadeTo,
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Volume to apply right away instead of scheduling ticks, if any.
    pub fn immediate_target(&self) -> Option<f32> {
        match self.shape {
            Shape::Exponential {
                target,
                immediate: true,
                ..
            } => Some(target),
            _ => None,
        }
    }

    /// Whether a finished fade-out should pause rather than stop.
    pub fn pauses_on_finish(&self) -> bool {
        matches!(self.shape, Shape::Fall { to_pause: true, .. })
    }

    /// Advance one tick given the channel's current volume.
    pub fn step(&mut self, current: f32) -> FadeStep {
        self.taken = self.taken.saturating_add(1);
        let k = self.taken as f32;
        let last = self.taken >= self.steps;

        match self.shape {
            Shape::Rise { target, per_step } => {
                let volume = (per_step * k).min(target);
                if last || volume >= target {
                    FadeStep::Finish(target)
                } else {
                    FadeStep::Continue(volume)
                }
            }
            Shape::Fall {
                start, per_step, ..
            } => {
                if last {
                    FadeStep::Finish(0.0)
                } else {
                    FadeStep::Continue((start - per_step * k).max(0.0))
                }
            }
            Shape::Exponential { target, ratio, .. } => {
                if last {
                    FadeStep::Finish(target)
                } else {
                    FadeStep::Continue((current * ratio).clamp(MIN_VOLUME, MAX_VOLUME))
                }
            }
        }
    }
}

/// Running fade owned by an asset.
#[derive(Debug)]
pub(crate) struct FadeTask {
    pub(crate) ramp: FadeRamp,
    pub(crate) generation: u64,
    token: CancellationToken,
    timer: JoinHandle<()>,
}

impl FadeTask {
    pub(crate) fn start(
        mailbox: WeakContext,
        asset_id: AssetId,
        ramp: FadeRamp,
        generation: u64,
        tick: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let timer = spawn_fade_timer(mailbox, asset_id, generation, tick, token.clone());
        Self {
            ramp,
            generation,
            token,
            timer,
        }
    }

    pub(crate) fn cancel(self) {
        self.token.cancel();
        self.timer.abort();
    }
}

/// Post a fade tick for `asset_id` every `tick` until cancelled or the
/// context goes away.
pub(crate) fn spawn_fade_timer(
    mailbox: WeakContext,
    asset_id: AssetId,
    generation: u64,
    tick: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + tick, tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    let id = asset_id.clone();
                    let posted = mailbox.post(Box::new(move |stage| stage.on_fade_tick(&id, generation)));
                    if !posted {
                        break;
                    }
                }
            }
        }

        trace!(asset_id = %asset_id, generation, "Fade timer exited");
    })
}
