//! Position ticker.
//!
//! While an asset plays, a tokio task posts a tick to the playback context
//! every `position_tick` (after an initial grace delay). The context decides
//! what each tick means with [`classify_tick`].

use crate::context::WeakContext;
use crate::source::AssetId;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// What the context should do with a position tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickAction {
    /// Report the position in seconds.
    Report(f64),
    /// Playback ended on its own: stop ticking and dispatch completion.
    Complete,
    /// Explicitly paused: stop ticking without completion.
    Halt,
    /// Backend still preparing or buffering.
    Wait,
}

pub fn classify_tick(ready: bool, playing: bool, paused: bool, position: Duration) -> TickAction {
    if !ready {
        TickAction::Wait
    } else if playing {
        TickAction::Report(round_tenth(position.as_secs_f64()))
    } else if paused {
        TickAction::Halt
    } else {
        TickAction::Complete
    }
}

/// Round to the nearest 0.1 second.
pub fn round_tenth(seconds: f64) -> f64 {
    (seconds * 10.0).round() / 10.0
}

/// Running ticker owned by an asset.
#[derive(Debug)]
pub(crate) struct PositionTicker {
    pub(crate) generation: u64,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PositionTicker {
    pub(crate) fn start(
        mailbox: WeakContext,
        asset_id: AssetId,
        generation: u64,
        grace: Duration,
        period: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let child = token.clone();

        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + grace, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {
                        let id = asset_id.clone();
                        let posted = mailbox
                            .post(Box::new(move |stage| stage.on_position_tick(&id, generation)));
                        if !posted {
                            break;
                        }
                    }
                }
            }

            trace!(asset_id = %asset_id, generation, "Position ticker exited");
        });

        Self {
            generation,
            token,
            task,
        }
    }

    pub(crate) fn stop(self) {
        self.token.cancel();
        self.task.abort();
    }
}
