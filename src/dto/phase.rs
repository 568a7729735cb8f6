use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::format_millis,
    state::{
        game::RosterSnapshot,
        state_machine::{RoundOutcome, RoundState, TurnPhase},
    },
};

/// Publicly visible turn phase exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleTurnPhase {
    /// Waiting for enough players.
    Idle,
    /// The drawer is sketching.
    Drawing,
    /// Guessers pick an option.
    Guessing,
}

impl From<TurnPhase> for VisibleTurnPhase {
    fn from(value: TurnPhase) -> Self {
        match value {
            TurnPhase::Idle => VisibleTurnPhase::Idle,
            TurnPhase::Drawing => VisibleTurnPhase::Drawing,
            TurnPhase::Guessing => VisibleTurnPhase::Guessing,
        }
    }
}

/// How the previous round ended.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleOutcome {
    Correct,
    TimedOut,
    DrawerLeft,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema, Clone)]
/// Recap of the previous round.
pub struct LastRoundSnapshot {
    pub round_id: Uuid,
    pub drawer_id: String,
    pub outcome: VisibleOutcome,
    pub guesser_id: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema, Clone)]
/// Round state as seen from one peer; the word is only disclosed to the drawer.
pub struct RoundSnapshot {
    pub phase: VisibleTurnPhase,
    pub round_id: Option<Uuid>,
    pub drawer_id: Option<String>,
    pub drawer_name: Option<String>,
    pub category: Option<String>,
    pub word: Option<String>,
    pub options: Vec<String>,
    /// RFC 3339 start of the current phase.
    pub started_at: Option<String>,
    /// Whether the local player is the drawer.
    pub is_drawer: bool,
    /// Whether the local player may still submit a guess.
    pub can_guess: bool,
    pub last_round: Option<LastRoundSnapshot>,
}

impl RoundSnapshot {
    /// Project `round` for the peer whose local player is `viewer`.
    pub fn for_viewer(
        round: &RoundState,
        roster: &RosterSnapshot,
        viewer: Option<&str>,
        already_guessed: bool,
    ) -> Self {
        let active = round.round();
        let is_drawer = viewer.is_some() && viewer == round.drawer_id();
        let can_guess = round.phase() == TurnPhase::Guessing
            && viewer.is_some()
            && !is_drawer
            && !already_guessed;

        Self {
            phase: round.phase().into(),
            round_id: round.round_id(),
            drawer_id: round.drawer_id().map(str::to_string),
            drawer_name: round
                .drawer_id()
                .and_then(|id| roster.get(id))
                .map(|player| player.name.clone()),
            category: active.map(|r| r.word.category.clone()),
            word: active
                .filter(|_| is_drawer)
                .map(|r| r.word.word.clone()),
            options: active.map(|r| r.word.options.clone()).unwrap_or_default(),
            started_at: active.map(|r| format_millis(r.started_at)),
            is_drawer,
            can_guess,
            last_round: round.last_round().map(|summary| {
                let (outcome, guesser_id) = match &summary.outcome {
                    RoundOutcome::Correct { guesser_id } => {
                        (VisibleOutcome::Correct, Some(guesser_id.clone()))
                    }
                    RoundOutcome::TimedOut => (VisibleOutcome::TimedOut, None),
                    RoundOutcome::DrawerLeft => (VisibleOutcome::DrawerLeft, None),
                };
                LastRoundSnapshot {
                    round_id: summary.round_id,
                    drawer_id: summary.drawer_id.clone(),
                    outcome,
                    guesser_id,
                }
            }),
        }
    }
}
