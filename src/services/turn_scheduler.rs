//! Drives the round through its phases: start, drawing timeout, resolution,
//! pause, and the per-peer countdowns that trigger them.
//!
//! Every peer runs the same logic against the same replicated round record.
//! Transitions re-read the record before acting and carry the round id they
//! were computed for, so duplicates from several peers collapse into one.

use futures::Future;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{models::DrawRecord, shared_store::StoreEvent},
    error::SessionError,
    services::{
        countdown::{Countdown, remaining_time},
        message_bus, roster, score_ledger, sse_events,
    },
    state::{
        SessionContext, SharedSession,
        game::{PlayerId, RosterSnapshot},
        now_millis,
        state_machine::{
            DrawingEnd, NextRound, RoundOutcome, RoundState, TurnEvent, TurnPhase,
        },
        transitions::run_transition_or_skip,
    },
};

type RoundKey = (Option<Uuid>, TurnPhase);

/// Start a round with `drawer_id`, unless another peer already did.
pub async fn start_round(
    session: &SessionContext,
    drawer_id: PlayerId,
) -> Result<Option<RoundState>, SessionError> {
    let word = session
        .words()
        .next_round_word()
        .ok_or_else(|| SessionError::InvalidState("word bank is empty".into()))?;
    let event = TurnEvent::StartRound { drawer_id, word };
    let Some(((), next)) = run_transition_or_skip(session, event, || async { Ok(()) }).await?
    else {
        return Ok(None);
    };

    info!(peer = %session.peer_id(), round_id = ?next.round_id(), drawer = ?next.drawer_id(), "round started");
    after_round_started(session, &next).await;
    Ok(Some(next))
}

/// Start a round if the roster is within limits and the session idles.
///
/// The first known player in store order draws.
pub async fn maybe_start_round(
    session: &SessionContext,
) -> Result<Option<RoundState>, SessionError> {
    let snapshot = roster::snapshot(session).await?;
    if !roster::in_range(session, &snapshot) {
        return Ok(None);
    }
    if session.fetch_round().await?.phase() != TurnPhase::Idle {
        return Ok(None);
    }
    let Some(drawer_id) = snapshot.first_known().cloned() else {
        return Ok(None);
    };
    start_round(session, drawer_id).await
}

/// Move `round_id` from drawing to guessing.
pub async fn finish_drawing(
    session: &SessionContext,
    round_id: Uuid,
    reason: DrawingEnd,
) -> Result<Option<RoundState>, SessionError> {
    let event = TurnEvent::DrawingFinished { round_id, reason };
    let Some(((), next)) = run_transition_or_skip(session, event, || async { Ok(()) }).await?
    else {
        return Ok(None);
    };
    info!(peer = %session.peer_id(), %round_id, ?reason, "drawing finished");
    Ok(Some(next))
}

/// Close `round_id` with `outcome` and rotate the drawer.
pub async fn resolve_round(
    session: &SessionContext,
    round_id: Uuid,
    outcome: RoundOutcome,
) -> Result<Option<RoundState>, SessionError> {
    resolve_round_with(session, round_id, outcome, || async { Ok(()) }).await
}

/// [`resolve_round`] running `work` only if this peer wins the transition.
pub async fn resolve_round_with<F, Fut>(
    session: &SessionContext,
    round_id: Uuid,
    outcome: RoundOutcome,
    work: F,
) -> Result<Option<RoundState>, SessionError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), SessionError>>,
{
    let current = session.fetch_round().await?;
    let Some(drawer_id) = current
        .round()
        .filter(|round| round.round_id == round_id)
        .map(|round| round.drawer_id.clone())
    else {
        debug!(peer = %session.peer_id(), %round_id, "round already resolved");
        return Ok(None);
    };

    let snapshot = roster::snapshot(session).await?;
    let next = next_round(session, &snapshot, &drawer_id);
    let event = TurnEvent::Resolve {
        round_id,
        outcome: outcome.clone(),
        next,
    };
    let Some(((), next)) = run_transition_or_skip(session, event, work).await? else {
        return Ok(None);
    };

    info!(peer = %session.peer_id(), %round_id, ?outcome, next_phase = ?next.phase(), "round resolved");
    if outcome == RoundOutcome::DrawerLeft {
        message_bus::announce(session, "The drawer left; passing the pencil on").await;
    }
    if next.phase() == TurnPhase::Drawing {
        after_round_started(session, &next).await;
    } else {
        message_bus::announce(session, "Player count out of range; waiting for the roster to settle")
            .await;
    }
    Ok(Some(next))
}

/// Force `round_id` back to idle.
pub async fn pause_round(
    session: &SessionContext,
    round_id: Uuid,
) -> Result<Option<RoundState>, SessionError> {
    let event = TurnEvent::Pause { round_id };
    let Some(((), next)) = run_transition_or_skip(session, event, || async { Ok(()) }).await?
    else {
        return Ok(None);
    };
    info!(peer = %session.peer_id(), %round_id, "round paused");
    message_bus::announce(session, "Player count out of range; round paused").await;
    Ok(Some(next))
}

/// Who draws next: the following id in sorted order, or idle outside the player limits.
fn next_round(session: &SessionContext, snapshot: &RosterSnapshot, drawer_id: &str) -> NextRound {
    if !roster::in_range(session, snapshot) {
        return NextRound::Idle;
    }
    let Some(next_drawer) = snapshot.next_drawer(drawer_id) else {
        return NextRound::Idle;
    };
    match session.words().next_round_word() {
        Some(word) => NextRound::Start {
            drawer_id: next_drawer,
            word,
        },
        None => NextRound::Idle,
    }
}

/// Wipe the canvas and announce the drawer of a round this peer just started.
async fn after_round_started(session: &SessionContext, round: &RoundState) {
    if let Err(err) = session
        .paths()
        .drawing
        .put(&DrawRecord::Clear { clear: true })
        .await
    {
        warn!(peer = %session.peer_id(), error = %err, "failed to clear canvas");
    }

    let Some(drawer_id) = round.drawer_id() else {
        return;
    };
    let name = roster::player_name(session, drawer_id)
        .await
        .unwrap_or_else(|| drawer_id.to_string());
    message_bus::announce(session, format!("{name} is drawing now")).await;
}

/// React to a roster change: pause outside the player limits, rotate if the drawer left.
pub async fn on_roster_changed(session: &SessionContext, snapshot: &RosterSnapshot) {
    if session.local_player_id().await.is_none() {
        return;
    }
    let round = match session.fetch_round().await {
        Ok(round) => round,
        Err(err) => {
            warn!(peer = %session.peer_id(), error = %err, "failed to read round");
            return;
        }
    };
    let Some(active) = round.round() else {
        return;
    };

    let result = if !roster::in_range(session, snapshot) {
        pause_round(session, active.round_id).await
    } else if !snapshot.contains(&active.drawer_id) {
        resolve_round(session, active.round_id, RoundOutcome::DrawerLeft).await
    } else {
        return;
    };
    log_failure(session, "roster-driven transition", result);
}

/// Follow the round record for the lifetime of the session.
pub fn spawn_round_watcher(session: SharedSession) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut subscription = match session.paths().round.on().await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(peer = %session.peer_id(), error = %err, "cannot watch round");
                return;
            }
        };

        let mut handled: Option<RoundKey> = None;
        let mut last_seen: Option<RoundState> = None;
        while let Some(event) = subscription.next().await {
            let round = match event {
                StoreEvent::Changed(change) => RoundState::decode(change.value.as_ref())
                    .unwrap_or_else(|err| {
                        warn!(peer = %session.peer_id(), error = %err, "treating malformed round as idle");
                        RoundState::idle()
                    }),
                StoreEvent::Lagged => match session.fetch_round().await {
                    Ok(round) => round,
                    Err(err) => {
                        warn!(peer = %session.peer_id(), error = %err, "failed to resync round");
                        continue;
                    }
                },
            };
            on_round_observed(&session, round, &mut handled, &mut last_seen).await;
        }
        debug!(peer = %session.peer_id(), "round subscription closed");
    })
}

async fn on_round_observed(
    session: &SharedSession,
    round: RoundState,
    handled: &mut Option<RoundKey>,
    last_seen: &mut Option<RoundState>,
) {
    session.observe_round(round.clone()).await;
    session.refresh_role().await;

    if last_seen.as_ref() != Some(&round) {
        sse_events::broadcast_phase_changed(session, &round).await;
        *last_seen = Some(round.clone());
    }

    apply_timeout_penalty(session, &round).await;

    let key = (round.round_id(), round.phase());
    if *handled == Some(key) {
        return;
    }
    *handled = Some(key);
    session.cancel_countdown().await;

    match (round.phase(), round.round()) {
        (TurnPhase::Idle, _) => recover_idle(session).await,
        (phase, Some(active)) => {
            let duration = match phase {
                TurnPhase::Drawing => session.config().drawing_time(),
                _ => session.config().guessing_time(),
            };
            let left = remaining_time(duration, active.started_at, now_millis());
            let round_id = active.round_id;
            let ticking = session.clone();
            let firing = session.clone();
            let countdown = Countdown::start(
                round_id,
                phase,
                left,
                move |secs| {
                    ticking.set_remaining(Some(secs));
                    sse_events::broadcast_countdown(&ticking, phase, secs);
                },
                move || async move { on_countdown_elapsed(&firing, round_id, phase).await },
            );
            session.replace_countdown(Some(countdown)).await;
            debug!(peer = %session.peer_id(), %round_id, ?phase, secs = left.as_secs(), "countdown started");
        }
        (_, None) => {}
    }
}

/// The local timer for `phase` of `round_id` ran out.
///
/// Only the drawer's peer ends the drawing phase; every joined peer tries to
/// end the guessing phase and all but the first are no-ops.
async fn on_countdown_elapsed(session: &SessionContext, round_id: Uuid, phase: TurnPhase) {
    let Some(local_id) = session.local_player_id().await else {
        return;
    };
    let result = match phase {
        TurnPhase::Drawing => {
            let round = session.current_round().await;
            if round.drawer_id() != Some(local_id.as_str()) {
                return;
            }
            finish_drawing(session, round_id, DrawingEnd::TimeUp).await
        }
        TurnPhase::Guessing => resolve_round(session, round_id, RoundOutcome::TimedOut).await,
        TurnPhase::Idle => return,
    };
    log_failure(session, "timeout transition", result);
}

/// Penalise the local player once for a round it drew that timed out.
async fn apply_timeout_penalty(session: &SessionContext, round: &RoundState) {
    let Some(summary) = round.last_round() else {
        return;
    };
    if summary.outcome != RoundOutcome::TimedOut {
        return;
    }
    let Some(local) = session.local_player().await else {
        return;
    };
    if summary.drawer_id != local.id || !session.mark_penalized(summary.round_id).await {
        return;
    }

    match score_ledger::adjust(session, &local.id, -1).await {
        Ok(score) => info!(peer = %session.peer_id(), round_id = %summary.round_id, ?score, "timeout penalty applied"),
        Err(err) => warn!(peer = %session.peer_id(), error = %err, "failed to apply timeout penalty"),
    }
    message_bus::announce(
        session,
        format!("Time's up! Nobody guessed it; {} loses a point", local.name),
    )
    .await;
}

/// Idle with a full roster: the first known player's peer starts the next round.
async fn recover_idle(session: &SessionContext) {
    let Some(local_id) = session.local_player_id().await else {
        return;
    };
    let snapshot = match roster::snapshot(session).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(peer = %session.peer_id(), error = %err, "failed to read roster");
            return;
        }
    };
    if snapshot.first_known() != Some(&local_id) {
        return;
    }
    log_failure(session, "idle recovery", maybe_start_round(session).await);
}

fn log_failure<T>(session: &SessionContext, action: &str, result: Result<T, SessionError>) {
    if let Err(err) = result {
        warn!(peer = %session.peer_id(), action, error = %err, "round transition failed");
    }
}
