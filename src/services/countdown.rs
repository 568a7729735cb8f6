use std::{future::Future, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval, sleep_until},
};
use tracing::debug;
use uuid::Uuid;

use crate::state::state_machine::TurnPhase;

/// Interval between two remaining-time notifications.
pub const TICK: Duration = Duration::from_secs(1);

/// Remaining part of a phase that started at `started_at_ms`, clamped to `[0, duration]`.
pub fn remaining_time(duration: Duration, started_at_ms: u64, now_ms: u64) -> Duration {
    let elapsed = Duration::from_millis(now_ms.saturating_sub(started_at_ms));
    duration.saturating_sub(elapsed)
}

/// Local timer for one phase of one round.
///
/// The elapsed handler runs only if the cancel flag is still clear when the
/// deadline is reached. Dropping the countdown cancels it as well.
pub struct Countdown {
    round_id: Uuid,
    phase: TurnPhase,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Countdown {
    /// Start counting down `duration`, reporting whole remaining seconds to `on_tick`.
    pub fn start<T, F, Fut>(
        round_id: Uuid,
        phase: TurnPhase,
        duration: Duration,
        on_tick: T,
        on_elapsed: F,
    ) -> Self
    where
        T: Fn(u64) + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel, mut cancelled) = watch::channel(false);
        let task = tokio::spawn(async move {
            let deadline = Instant::now() + duration;
            let expired = sleep_until(deadline);
            tokio::pin!(expired);
            let mut ticker = interval(TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    changed = cancelled.changed() => {
                        if changed.is_err() || *cancelled.borrow() {
                            debug!(%round_id, ?phase, "countdown cancelled");
                            return;
                        }
                    }
                    _ = &mut expired => break,
                    _ = ticker.tick() => {
                        let left = deadline.saturating_duration_since(Instant::now());
                        on_tick(whole_seconds(left));
                    }
                }
            }

            if *cancelled.borrow() {
                return;
            }
            on_tick(0);
            debug!(%round_id, ?phase, "countdown elapsed");
            on_elapsed().await;
        });

        Self {
            round_id,
            phase,
            cancel,
            task,
        }
    }

    /// Whether this countdown belongs to `phase` of `round_id`.
    pub fn matches(&self, round_id: Uuid, phase: TurnPhase) -> bool {
        self.round_id == round_id && self.phase == phase
    }

    /// Whether the timer task already returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Raise the cancel flag; a handler that already started is left to finish.
    pub fn cancel(self) {
        self.cancel.send_replace(true);
    }
}

fn whole_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
