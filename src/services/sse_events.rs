use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        phase::RoundSnapshot,
        session::PlayerView,
        sse::{
            CountdownEvent, DrawingEvent, MessageEvent, PhaseChangedEvent, RosterEvent,
            ServerEvent, SessionResetEvent,
        },
    },
    state::{
        SessionContext,
        game::{DrawEvent, Message, RosterSnapshot},
        state_machine::{RoundState, TurnPhase},
    },
};

const EVENT_PHASE_CHANGED: &str = "phase_changed";
const EVENT_COUNTDOWN: &str = "countdown";
const EVENT_ROSTER: &str = "roster";
const EVENT_MESSAGE: &str = "message";
const EVENT_DRAWING: &str = "drawing";
const EVENT_SESSION_RESET: &str = "session.reset";
const EVENT_INFO: &str = "info";

/// Broadcast the round state as seen by the local player.
pub async fn broadcast_phase_changed(session: &SessionContext, round: &RoundState) {
    let snapshot = round_snapshot(session, round).await;
    send_ui_event(session, EVENT_PHASE_CHANGED, &PhaseChangedEvent(snapshot));
}

/// Project `round` for the local player of `session`.
pub async fn round_snapshot(session: &SessionContext, round: &RoundState) -> RoundSnapshot {
    let roster = session.roster().await;
    let viewer = session.local_player_id().await;
    let already_guessed = match round.round_id() {
        Some(round_id) => session.has_guessed(round_id).await,
        None => false,
    };
    RoundSnapshot::for_viewer(round, &roster, viewer.as_deref(), already_guessed)
}

/// Broadcast the remaining seconds of the local countdown.
pub fn broadcast_countdown(session: &SessionContext, phase: TurnPhase, remaining_secs: u64) {
    let payload = CountdownEvent {
        phase: phase.into(),
        remaining_secs,
    };
    send_ui_event(session, EVENT_COUNTDOWN, &payload);
}

/// Broadcast the pruned roster with scores.
pub fn broadcast_roster(session: &SessionContext, snapshot: &RosterSnapshot) {
    let payload = RosterEvent {
        players: snapshot.players().values().map(PlayerView::from).collect(),
        valid_count: snapshot.valid_count(),
        min_players: session.config().min_players(),
        max_players: session.config().max_players(),
    };
    send_ui_event(session, EVENT_ROSTER, &payload);
}

/// Broadcast one log entry.
pub fn broadcast_message(session: &SessionContext, message: &Message) {
    send_ui_event(session, EVENT_MESSAGE, &MessageEvent::from(message));
}

/// Broadcast the latest drawing channel value.
pub fn broadcast_drawing(session: &SessionContext, event: &DrawEvent) {
    send_ui_event(session, EVENT_DRAWING, &DrawingEvent::from(event));
}

/// Tell the UI the local peer wiped the session and must start over.
pub fn broadcast_session_reset(session: &SessionContext) {
    let payload = SessionResetEvent {
        message: "session was reset; join again to play".into(),
    };
    send_ui_event(session, EVENT_SESSION_RESET, &payload);
}

/// Send a human-readable info message onto the UI stream.
pub fn broadcast_info(session: &SessionContext, message: &str) {
    session.ui().broadcast(ServerEvent::new(
        Some(EVENT_INFO.to_string()),
        message.to_string(),
    ));
}

fn send_ui_event(session: &SessionContext, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => session.ui().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize UI event payload"),
    }
}
