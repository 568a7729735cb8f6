use std::time::Instant;

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::models::{OutcomeRecord, PhaseRecord, RoundRecord, RoundSummaryRecord},
    state::game::PlayerId,
};

/// Number of multiple-choice options offered each round.
pub const OPTION_COUNT: usize = 4;

/// Session-wide turn phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TurnPhase {
    /// No active round; waiting for enough players.
    #[default]
    Idle,
    /// The drawer is sketching.
    Drawing,
    /// Non-drawers pick one of the options.
    Guessing,
}

/// Word to draw plus the options shown to guessers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundWord {
    /// Category both the word and its distractors come from.
    pub category: String,
    /// The word to draw.
    pub word: String,
    /// Exactly [`OPTION_COUNT`] distinct entries, `word` among them once.
    pub options: Vec<String>,
}

/// Data of the round currently drawn or guessed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRound {
    /// Fresh identifier per round, used to detect stale transitions.
    pub round_id: Uuid,
    /// Player drawing this round.
    pub drawer_id: PlayerId,
    /// Word and guess options.
    pub word: RoundWord,
    /// Milliseconds since the Unix epoch at which the current phase started.
    pub started_at: u64,
}

/// How a round ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// A guesser picked the right option.
    Correct {
        /// Player who guessed it.
        guesser_id: PlayerId,
    },
    /// The guessing timer elapsed without a correct guess.
    TimedOut,
    /// The drawer vanished from the roster mid-round.
    DrawerLeft,
}

/// Recap of the previous round carried by the following round record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    /// Id of the finished round.
    pub round_id: Uuid,
    /// Who drew it.
    pub drawer_id: PlayerId,
    /// How it ended.
    pub outcome: RoundOutcome,
}

/// Replicated round state; `round` is present exactly when the phase is not idle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundState {
    phase: TurnPhase,
    round: Option<ActiveRound>,
    last_round: Option<RoundSummary>,
}

/// Why a stored round record could not be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed round record: {0}")]
pub struct MalformedRound(pub &'static str);

impl RoundState {
    /// Idle state without history.
    pub fn idle() -> Self {
        Self::default()
    }

    fn active(phase: TurnPhase, round: ActiveRound, last_round: Option<RoundSummary>) -> Self {
        Self {
            phase,
            round: Some(round),
            last_round,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Active round data, `None` while idle.
    pub fn round(&self) -> Option<&ActiveRound> {
        self.round.as_ref()
    }

    /// Identifier of the active round.
    pub fn round_id(&self) -> Option<Uuid> {
        self.round.as_ref().map(|round| round.round_id)
    }

    /// Designated drawer of the active round.
    pub fn drawer_id(&self) -> Option<&str> {
        self.round.as_ref().map(|round| round.drawer_id.as_str())
    }

    /// How the previous round ended, if known.
    pub fn last_round(&self) -> Option<&RoundSummary> {
        self.last_round.as_ref()
    }

    /// Decode a stored record, rejecting anything partially written.
    pub fn decode(value: Option<&Value>) -> Result<Self, MalformedRound> {
        let Some(value) = value else {
            return Ok(Self::idle());
        };
        let record = serde_json::from_value::<RoundRecord>(value.clone())
            .map_err(|_| MalformedRound("undecodable"))?;
        Self::try_from(record)
    }

    /// Encode as the record written to the store.
    pub fn to_record(&self) -> RoundRecord {
        let round = self.round.as_ref();
        RoundRecord {
            round_id: round.map(|r| r.round_id),
            phase: Some(match self.phase {
                TurnPhase::Idle => PhaseRecord::Idle,
                TurnPhase::Drawing => PhaseRecord::Drawing,
                TurnPhase::Guessing => PhaseRecord::Guessing,
            }),
            drawer_id: round.map(|r| r.drawer_id.clone()),
            category: round.map(|r| r.word.category.clone()),
            word: round.map(|r| r.word.word.clone()),
            options: round.map(|r| r.word.options.clone()),
            started_at: round.map(|r| r.started_at),
            last_round: self.last_round.as_ref().map(Into::into),
        }
    }
}

impl TryFrom<RoundRecord> for RoundState {
    type Error = MalformedRound;

    fn try_from(record: RoundRecord) -> Result<Self, Self::Error> {
        let last_round = record.last_round.map(Into::into);
        let phase = match record.phase {
            None | Some(PhaseRecord::Idle) => {
                return Ok(Self {
                    phase: TurnPhase::Idle,
                    round: None,
                    last_round,
                });
            }
            Some(PhaseRecord::Drawing) => TurnPhase::Drawing,
            Some(PhaseRecord::Guessing) => TurnPhase::Guessing,
        };

        let round_id = record.round_id.ok_or(MalformedRound("missing round id"))?;
        let drawer_id = record
            .drawer_id
            .filter(|id| !id.is_empty())
            .ok_or(MalformedRound("missing drawer"))?;
        let word = record
            .word
            .filter(|word| !word.is_empty())
            .ok_or(MalformedRound("missing word"))?;
        let options = record.options.ok_or(MalformedRound("missing options"))?;
        if options.len() != OPTION_COUNT
            || options.iter().filter(|option| **option == word).count() != 1
        {
            return Err(MalformedRound("options do not hold the word exactly once"));
        }
        let started_at = record
            .started_at
            .ok_or(MalformedRound("missing start time"))?;

        Ok(Self::active(
            phase,
            ActiveRound {
                round_id,
                drawer_id,
                word: RoundWord {
                    category: record.category.unwrap_or_default(),
                    word,
                    options,
                },
                started_at,
            },
            last_round,
        ))
    }
}

impl From<RoundSummaryRecord> for RoundSummary {
    fn from(value: RoundSummaryRecord) -> Self {
        Self {
            round_id: value.round_id,
            drawer_id: value.drawer_id,
            outcome: match value.outcome {
                OutcomeRecord::Correct { guesser_id } => RoundOutcome::Correct { guesser_id },
                OutcomeRecord::TimedOut => RoundOutcome::TimedOut,
                OutcomeRecord::DrawerLeft => RoundOutcome::DrawerLeft,
            },
        }
    }
}

impl From<&RoundSummary> for RoundSummaryRecord {
    fn from(value: &RoundSummary) -> Self {
        Self {
            round_id: value.round_id,
            drawer_id: value.drawer_id.clone(),
            outcome: match &value.outcome {
                RoundOutcome::Correct { guesser_id } => OutcomeRecord::Correct {
                    guesser_id: guesser_id.clone(),
                },
                RoundOutcome::TimedOut => OutcomeRecord::TimedOut,
                RoundOutcome::DrawerLeft => OutcomeRecord::DrawerLeft,
            },
        }
    }
}

/// Why the drawing phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawingEnd {
    /// The drawer submitted early.
    Submitted,
    /// The drawer's peer saw the drawing timer elapse.
    TimeUp,
}

/// What follows a resolved round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextRound {
    /// Start drawing with this drawer and word.
    Start {
        /// Next drawer.
        drawer_id: PlayerId,
        /// Word for the next round.
        word: RoundWord,
    },
    /// Roster is outside the player limits; go idle.
    Idle,
}

/// Events that can be applied to the round state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// Leave idle with the elected drawer.
    StartRound {
        /// Elected drawer.
        drawer_id: PlayerId,
        /// Word to draw.
        word: RoundWord,
    },
    /// Move the given round from drawing to guessing.
    DrawingFinished {
        /// Round expected to be drawing.
        round_id: Uuid,
        /// Submitted early or timed out.
        reason: DrawingEnd,
    },
    /// Close the given round and pick what follows.
    Resolve {
        /// Round expected to be guessing.
        round_id: Uuid,
        /// How it ended.
        outcome: RoundOutcome,
        /// Round that follows.
        next: NextRound,
    },
    /// Force the given round back to idle (roster outside the player limits).
    Pause {
        /// Round expected to be active.
        round_id: Uuid,
    },
}

/// Transition attempted against a state that already moved on.
///
/// Never surfaced to users: peers race to perform the same transition and
/// all but one lose.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stale transition: {event:?} no longer applies while in {from:?}")]
pub struct StaleTransition {
    /// Phase the state was in when the event was evaluated.
    pub from: TurnPhase,
    /// The event that no longer applies.
    pub event: TurnEvent,
}

/// Compute the state following `event`, stamping new phases with `now_ms`.
pub fn compute_transition(
    current: &RoundState,
    event: TurnEvent,
    now_ms: u64,
) -> Result<RoundState, StaleTransition> {
    let active_id = current.round_id();
    let next = match (current.phase, &event) {
        (TurnPhase::Idle, TurnEvent::StartRound { drawer_id, word }) => RoundState::active(
            TurnPhase::Drawing,
            new_round(drawer_id.clone(), word.clone(), now_ms),
            current.last_round.clone(),
        ),
        (TurnPhase::Drawing, TurnEvent::DrawingFinished { round_id, .. })
            if active_id == Some(*round_id) =>
        {
            let mut round = current.round.clone().ok_or_else(|| stale(current, &event))?;
            round.started_at = now_ms;
            RoundState::active(TurnPhase::Guessing, round, current.last_round.clone())
        }
        (
            TurnPhase::Guessing,
            TurnEvent::Resolve {
                round_id,
                outcome,
                next,
            },
        )
        | (
            TurnPhase::Drawing,
            TurnEvent::Resolve {
                round_id,
                outcome: outcome @ RoundOutcome::DrawerLeft,
                next,
            },
        ) if active_id == Some(*round_id) => {
            let finished = current.round.as_ref().ok_or_else(|| stale(current, &event))?;
            let summary = RoundSummary {
                round_id: finished.round_id,
                drawer_id: finished.drawer_id.clone(),
                outcome: outcome.clone(),
            };
            match next {
                NextRound::Start { drawer_id, word } => RoundState::active(
                    TurnPhase::Drawing,
                    new_round(drawer_id.clone(), word.clone(), now_ms),
                    Some(summary),
                ),
                NextRound::Idle => RoundState {
                    phase: TurnPhase::Idle,
                    round: None,
                    last_round: Some(summary),
                },
            }
        }
        (TurnPhase::Drawing | TurnPhase::Guessing, TurnEvent::Pause { round_id })
            if active_id == Some(*round_id) =>
        {
            RoundState {
                phase: TurnPhase::Idle,
                round: None,
                last_round: current.last_round.clone(),
            }
        }
        _ => return Err(stale(current, &event)),
    };

    Ok(next)
}

fn new_round(drawer_id: PlayerId, word: RoundWord, now_ms: u64) -> ActiveRound {
    ActiveRound {
        round_id: Uuid::new_v4(),
        drawer_id,
        word,
        started_at: now_ms,
    }
}

fn stale(current: &RoundState, event: &TurnEvent) -> StaleTransition {
    StaleTransition {
        from: current.phase,
        event: event.clone(),
    }
}

/// Errors that can occur when planning a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The event no longer applies to the observed state.
    Stale(StaleTransition),
}

/// Errors that can occur when applying a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// Another round state was observed since the plan was created.
    VersionMismatch {
        /// Version when the plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A validated transition that has not been written yet.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Round state the plan was computed against.
    pub from: RoundState,
    /// Round state to publish.
    pub to: RoundState,
    /// Event that triggered this transition.
    pub event: TurnEvent,
    /// Observation version the plan was computed against.
    pub version: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the local mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Last observed phase.
    pub phase: TurnPhase,
    /// Number of distinct round states observed so far.
    pub version: usize,
    /// Phase a pending transition would publish.
    pub pending: Option<TurnPhase>,
}

/// Per-peer mirror of the replicated round state.
///
/// Observations come from store notifications and fresh reads; a plan is only
/// applied when nothing new was observed between planning and publishing.
#[derive(Debug, Clone, Default)]
pub struct TurnStateMachine {
    observed: RoundState,
    version: usize,
    pending: Option<Plan>,
}

impl TurnStateMachine {
    /// Create a mirror that has only seen the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed round state.
    pub fn current(&self) -> &RoundState {
        &self.observed
    }

    /// Inspect the observed phase.
    pub fn phase(&self) -> TurnPhase {
        self.observed.phase
    }

    /// Record a freshly read or notified round state; returns whether it differs.
    pub fn observe(&mut self, round: RoundState) -> bool {
        if self.observed == round {
            return false;
        }
        self.observed = round;
        self.version += 1;
        true
    }

    /// Create a snapshot of the mirror.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.observed.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to.phase),
        }
    }

    /// Validate `event` against the observed state and reserve the pending slot.
    pub fn plan(&mut self, event: TurnEvent, now_ms: u64) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next =
            compute_transition(&self.observed, event.clone(), now_ms).map_err(PlanError::Stale)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.observed.clone(),
            to: next,
            event,
            version: self.version,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Adopt the planned state locally, returning the state to publish.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<RoundState, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.version != plan.version {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version,
                actual: self.version,
            });
        }

        self.observe(plan.to.clone());
        Ok(plan.to)
    }

    /// Drop a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn word(word: &str) -> RoundWord {
        RoundWord {
            category: "fruit".into(),
            word: word.into(),
            options: vec![word.into(), "pear".into(), "plum".into(), "kiwi".into()],
        }
    }

    fn start(drawer: &str) -> RoundState {
        compute_transition(
            &RoundState::idle(),
            TurnEvent::StartRound {
                drawer_id: drawer.into(),
                word: word("apple"),
            },
            1_000,
        )
        .unwrap()
    }

    fn to_guessing(state: &RoundState) -> RoundState {
        compute_transition(
            state,
            TurnEvent::DrawingFinished {
                round_id: state.round_id().unwrap(),
                reason: DrawingEnd::TimeUp,
            },
            2_000,
        )
        .unwrap()
    }

    fn resolve_timeout(state: &RoundState, next: NextRound) -> Result<RoundState, StaleTransition> {
        compute_transition(
            state,
            TurnEvent::Resolve {
                round_id: state.round_id().unwrap(),
                outcome: RoundOutcome::TimedOut,
                next,
            },
            3_000,
        )
    }

    #[test]
    fn initial_state_is_idle() {
        let sm = TurnStateMachine::new();
        assert_eq!(sm.phase(), TurnPhase::Idle);
        assert_eq!(sm.current().drawer_id(), None);
    }

    #[test]
    fn full_round_through_guessing_to_next_drawer() {
        let drawing = start("a");
        assert_eq!(drawing.phase(), TurnPhase::Drawing);
        assert_eq!(drawing.drawer_id(), Some("a"));

        let guessing = to_guessing(&drawing);
        assert_eq!(guessing.phase(), TurnPhase::Guessing);
        assert_eq!(guessing.round_id(), drawing.round_id());
        assert_eq!(guessing.round().unwrap().started_at, 2_000);

        let next = compute_transition(
            &guessing,
            TurnEvent::Resolve {
                round_id: guessing.round_id().unwrap(),
                outcome: RoundOutcome::Correct {
                    guesser_id: "c".into(),
                },
                next: NextRound::Start {
                    drawer_id: "b".into(),
                    word: word("grape"),
                },
            },
            3_000,
        )
        .unwrap();

        assert_eq!(next.phase(), TurnPhase::Drawing);
        assert_eq!(next.drawer_id(), Some("b"));
        assert_ne!(next.round_id(), guessing.round_id());
        let summary = next.last_round().unwrap();
        assert_eq!(summary.drawer_id, "a");
        assert_eq!(
            summary.outcome,
            RoundOutcome::Correct {
                guesser_id: "c".into()
            }
        );
    }

    #[test]
    fn duplicate_resolution_is_a_no_op() {
        let guessing = to_guessing(&start("a"));
        let event = TurnEvent::Resolve {
            round_id: guessing.round_id().unwrap(),
            outcome: RoundOutcome::TimedOut,
            next: NextRound::Start {
                drawer_id: "b".into(),
                word: word("grape"),
            },
        };

        let once = compute_transition(&guessing, event.clone(), 3_000).unwrap();
        let err = compute_transition(&once, event, 3_500).unwrap_err();

        assert_eq!(err.from, TurnPhase::Drawing);
        assert_eq!(once.phase(), TurnPhase::Drawing);
        assert_eq!(once.drawer_id(), Some("b"));
    }

    #[test]
    fn events_for_another_round_are_stale() {
        let drawing = start("a");
        let err = compute_transition(
            &drawing,
            TurnEvent::DrawingFinished {
                round_id: Uuid::new_v4(),
                reason: DrawingEnd::Submitted,
            },
            2_000,
        )
        .unwrap_err();
        assert_eq!(err.from, TurnPhase::Drawing);

        let err = resolve_timeout(&drawing, NextRound::Idle).unwrap_err();
        assert_eq!(err.from, TurnPhase::Drawing);
    }

    #[test]
    fn drawer_leaving_mid_drawing_resolves_the_round() {
        let drawing = start("a");
        let next = compute_transition(
            &drawing,
            TurnEvent::Resolve {
                round_id: drawing.round_id().unwrap(),
                outcome: RoundOutcome::DrawerLeft,
                next: NextRound::Idle,
            },
            2_000,
        )
        .unwrap();
        assert_eq!(next.phase(), TurnPhase::Idle);
        assert_eq!(next.last_round().unwrap().outcome, RoundOutcome::DrawerLeft);
    }

    #[test]
    fn starting_twice_is_stale() {
        let drawing = start("a");
        let err = compute_transition(
            &drawing,
            TurnEvent::StartRound {
                drawer_id: "b".into(),
                word: word("grape"),
            },
            1_500,
        )
        .unwrap_err();
        assert_eq!(err.from, TurnPhase::Drawing);
    }

    #[test]
    fn pause_only_applies_to_active_rounds() {
        let guessing = to_guessing(&start("a"));
        let paused = compute_transition(
            &guessing,
            TurnEvent::Pause {
                round_id: guessing.round_id().unwrap(),
            },
            5_000,
        )
        .unwrap();
        assert_eq!(paused, RoundState::idle());

        assert!(
            compute_transition(
                &paused,
                TurnEvent::Pause {
                    round_id: guessing.round_id().unwrap()
                },
                5_000
            )
            .is_err()
        );
    }

    #[test]
    fn record_round_trip_preserves_state() {
        let guessing = resolve_timeout(
            &to_guessing(&start("a")),
            NextRound::Start {
                drawer_id: "b".into(),
                word: word("grape"),
            },
        )
        .unwrap();
        let value = serde_json::to_value(guessing.to_record()).unwrap();
        assert_eq!(value["phase"], json!("drawing"));
        assert_eq!(value["lastRound"]["outcome"]["kind"], json!("timed_out"));
        assert_eq!(RoundState::decode(Some(&value)).unwrap(), guessing);
    }

    #[test]
    fn partial_records_are_rejected() {
        let missing_drawer = json!({
            "roundId": Uuid::new_v4(),
            "phase": "drawing",
            "word": "apple",
            "options": ["apple", "pear", "plum", "kiwi"],
            "startedAt": 1
        });
        assert!(RoundState::decode(Some(&missing_drawer)).is_err());

        let duplicated_word = json!({
            "roundId": Uuid::new_v4(),
            "phase": "guessing",
            "drawerId": "a",
            "word": "apple",
            "options": ["apple", "apple", "plum", "kiwi"],
            "startedAt": 1
        });
        assert!(RoundState::decode(Some(&duplicated_word)).is_err());
        assert!(RoundState::decode(Some(&json!({"phase": "nonsense"}))).is_err());
        assert_eq!(RoundState::decode(None).unwrap(), RoundState::idle());
    }

    #[test]
    fn apply_after_new_observation_is_rejected() {
        let mut sm = TurnStateMachine::new();
        let plan = sm
            .plan(
                TurnEvent::StartRound {
                    drawer_id: "a".into(),
                    word: word("apple"),
                },
                1_000,
            )
            .unwrap();
        assert_eq!(sm.snapshot().pending, Some(TurnPhase::Drawing));

        sm.observe(start("b"));
        let err = sm.apply(plan.id).unwrap_err();
        assert!(matches!(err, ApplyError::VersionMismatch { .. }));
        assert_eq!(sm.current().drawer_id(), Some("b"));
        assert_eq!(sm.snapshot().pending, None);
    }

    #[test]
    fn plan_apply_and_abort() {
        let mut sm = TurnStateMachine::new();
        let event = TurnEvent::StartRound {
            drawer_id: "a".into(),
            word: word("apple"),
        };

        let plan = sm.plan(event.clone(), 1_000).unwrap();
        assert_eq!(sm.plan(event.clone(), 1_000).unwrap_err(), PlanError::AlreadyPending);
        sm.abort(plan.id).unwrap();
        assert_eq!(sm.abort(plan.id), Err(AbortError::NoPending));

        let plan = sm.plan(event.clone(), 1_000).unwrap();
        let published = sm.apply(plan.id).unwrap();
        assert_eq!(published.phase(), TurnPhase::Drawing);
        assert_eq!(sm.snapshot().version, 1);
        assert!(!sm.observe(published));

        assert!(matches!(sm.plan(event, 1_000), Err(PlanError::Stale(_))));
    }
}
