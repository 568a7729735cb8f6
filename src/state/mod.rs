/// Players, roster snapshots, messages and drawing events.
pub mod game;
mod sse;
/// Round state and its plan/apply/abort machine.
pub mod state_machine;
/// Transition helpers tolerating lost races.
pub mod transitions;

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tokio::{
    sync::{Mutex, RwLock, watch},
    task::JoinHandle,
    time::timeout,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        models::{DRAWING_PATH, MESSAGES_PATH, PLAYERS_PATH, ROUND_PATH},
        shared_store::{SharedStore, StoreHandle},
        storage::StorageResult,
    },
    error::SessionError,
    services::{countdown::Countdown, word_bank::WordBank},
    state::{
        game::{Player, PlayerId, RosterSnapshot},
        state_machine::{RoundState, TurnEvent, TurnPhase, TurnStateMachine},
    },
};

pub use self::sse::{DEFAULT_UI_CAPACITY, SseHub};
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};

/// Session context shared between a peer's tasks.
pub type SharedSession = Arc<SessionContext>;
/// Upper bound on the work done inside one transition.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// Milliseconds since the Unix epoch according to the local clock.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Role of the local player in the observed round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LocalRole {
    /// No player joined from this peer.
    #[default]
    Spectator,
    /// The local player draws this round.
    Drawer,
    /// The local player joined and does not draw.
    Guesser,
}

/// Store handles for every path the session uses.
#[derive(Clone)]
pub struct SessionPaths {
    /// Session root; everything below it is wiped on reset.
    pub root: StoreHandle,
    /// Keyed collection of player records.
    pub players: StoreHandle,
    /// Single round record.
    pub round: StoreHandle,
    /// Latest drawing event.
    pub drawing: StoreHandle,
    /// Append-only message log.
    pub messages: StoreHandle,
}

impl SessionPaths {
    /// Resolve the session layout under `root`.
    pub fn new(store: Arc<dyn SharedStore>, root: &str) -> Self {
        let root = StoreHandle::new(store, root);
        Self {
            players: root.get(PLAYERS_PATH),
            round: root.get(ROUND_PATH),
            drawing: root.get(DRAWING_PATH),
            messages: root.get(MESSAGES_PATH),
            root,
        }
    }
}

#[derive(Debug, Default)]
struct LocalSeat {
    player: Option<Player>,
    role: LocalRole,
    guessed_round: Option<Uuid>,
}

/// Everything one peer knows and owns; nothing here is shared with other peers.
pub struct SessionContext {
    peer_id: Uuid,
    config: Arc<AppConfig>,
    paths: SessionPaths,
    words: WordBank,
    seat: RwLock<LocalSeat>,
    turn: RwLock<TurnStateMachine>,
    roster: RwLock<RosterSnapshot>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
    countdown: Mutex<Option<Countdown>>,
    remaining: watch::Sender<Option<u64>>,
    last_penalized: Mutex<Option<Uuid>>,
    ui: SseHub,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionContext {
    /// Construct a new [`SessionContext`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(peer_id: Uuid, config: Arc<AppConfig>, store: Arc<dyn SharedStore>) -> SharedSession {
        let (remaining, _rx) = watch::channel(None);
        Arc::new(Self {
            peer_id,
            paths: SessionPaths::new(store, config.session_root()),
            words: WordBank::new(config.categories().clone()),
            config,
            seat: RwLock::new(LocalSeat::default()),
            turn: RwLock::new(TurnStateMachine::new()),
            roster: RwLock::new(RosterSnapshot::default()),
            transition_gate: Mutex::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
            countdown: Mutex::new(None),
            remaining,
            last_penalized: Mutex::new(None),
            ui: SseHub::default(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Identifier of this peer.
    pub fn peer_id(&self) -> Uuid {
        self.peer_id
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Store handles of the session layout.
    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    /// Word supplier for new rounds.
    pub fn words(&self) -> &WordBank {
        &self.words
    }

    /// Broadcast hub feeding this peer's UI stream.
    pub fn ui(&self) -> &SseHub {
        &self.ui
    }

    /// Player joined from this peer, if any.
    pub async fn local_player(&self) -> Option<Player> {
        self.seat.read().await.player.clone()
    }

    /// Id of the player joined from this peer, if any.
    pub async fn local_player_id(&self) -> Option<PlayerId> {
        self.seat.read().await.player.as_ref().map(|p| p.id.clone())
    }

    /// Install or clear the local player and recompute the local role.
    pub async fn set_local_player(&self, player: Option<Player>) {
        {
            let mut seat = self.seat.write().await;
            seat.player = player;
            seat.guessed_round = None;
        }
        self.refresh_role().await;
    }

    /// Role of the local player in the observed round.
    pub async fn local_role(&self) -> LocalRole {
        self.seat.read().await.role
    }

    /// Recompute the local role from the observed round.
    pub async fn refresh_role(&self) -> LocalRole {
        let drawer = self.turn.read().await.current().drawer_id().map(str::to_string);
        let mut seat = self.seat.write().await;
        seat.role = match &seat.player {
            None => LocalRole::Spectator,
            Some(player) if drawer.as_deref() == Some(player.id.as_str()) => LocalRole::Drawer,
            Some(_) => LocalRole::Guesser,
        };
        seat.role
    }

    /// Whether the local player already guessed during `round_id`.
    pub async fn has_guessed(&self, round_id: Uuid) -> bool {
        self.seat.read().await.guessed_round == Some(round_id)
    }

    /// Record a guess for `round_id`; returns `false` when one was already recorded.
    pub async fn mark_guessed(&self, round_id: Uuid) -> bool {
        let mut seat = self.seat.write().await;
        if seat.guessed_round == Some(round_id) {
            return false;
        }
        seat.guessed_round = Some(round_id);
        true
    }

    /// Last roster snapshot observed by this peer.
    pub async fn roster(&self) -> RosterSnapshot {
        self.roster.read().await.clone()
    }

    /// Replace the cached roster snapshot.
    pub async fn set_roster(&self, snapshot: RosterSnapshot) {
        *self.roster.write().await = snapshot;
    }

    /// Last round state observed by this peer.
    pub async fn current_round(&self) -> RoundState {
        self.turn.read().await.current().clone()
    }

    /// Record an observed round state; returns whether it differs from the last one.
    pub async fn observe_round(&self, round: RoundState) -> bool {
        self.turn.write().await.observe(round)
    }

    /// Fresh read of the round record; partial records read as idle.
    pub async fn fetch_round(&self) -> StorageResult<RoundState> {
        let value = self.paths.round.once().await?;
        Ok(RoundState::decode(value.as_ref()).unwrap_or_else(|err| {
            warn!(peer = %self.peer_id, error = %err, "ignoring malformed round record");
            RoundState::idle()
        }))
    }

    /// Replace the running countdown; the previous one is cancelled.
    pub async fn replace_countdown(&self, next: Option<Countdown>) {
        let previous = {
            let mut slot = self.countdown.lock().await;
            std::mem::replace(&mut *slot, next)
        };
        if let Some(previous) = previous {
            previous.cancel();
            self.remaining.send_replace(None);
        }
    }

    /// Cancel the running countdown, if any.
    pub async fn cancel_countdown(&self) {
        self.replace_countdown(None).await;
    }

    /// Cancel the running countdown only if it still times `phase` of `round_id`.
    pub async fn cancel_countdown_for(&self, round_id: Uuid, phase: TurnPhase) {
        let stale = {
            let mut slot = self.countdown.lock().await;
            if slot.as_ref().is_some_and(|countdown| countdown.matches(round_id, phase)) {
                slot.take()
            } else {
                None
            }
        };
        if let Some(countdown) = stale {
            countdown.cancel();
            self.remaining.send_replace(None);
        }
    }

    /// Publish the remaining seconds of the local countdown.
    pub fn set_remaining(&self, secs: Option<u64>) {
        self.remaining.send_replace(secs);
    }

    /// Remaining seconds of the local countdown.
    pub fn remaining(&self) -> Option<u64> {
        *self.remaining.borrow()
    }

    /// Remember that the timeout penalty for `round_id` was handled; `false` if it already was.
    ///
    /// Only the latest round summary can carry a penalty.
    pub async fn mark_penalized(&self, round_id: Uuid) -> bool {
        let mut last = self.last_penalized.lock().await;
        if *last == Some(round_id) {
            return false;
        }
        *last = Some(round_id);
        true
    }

    /// Keep a background task so it is aborted on teardown.
    pub async fn register_task(&self, handle: JoinHandle<()>) {
        self.tasks.lock().await.push(handle);
    }

    /// Abort every background task and the running countdown.
    pub async fn abort_tasks(&self) {
        for handle in self.tasks.lock().await.drain(..) {
            handle.abort();
        }
        self.cancel_countdown().await;
    }

    /// Plan a transition against the observed round state, returning the plan.
    async fn plan_transition(&self, event: TurnEvent) -> Result<Plan, PlanError> {
        let mut sm = self.turn.write().await;
        sm.plan(event, now_millis())
    }

    /// Apply the planned transition to the local mirror, returning the state to publish.
    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<RoundState, ApplyError> {
        let mut sm = self.turn.write().await;
        sm.apply(plan_id)
    }

    /// Abort a planned transition of the local mirror.
    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.turn.write().await;
        sm.abort(plan_id)
    }

    /// Run `event` against a fresh read of the round, execute `work`, then publish the result.
    ///
    /// Only one transition per peer is in flight at a time. Another peer may
    /// still publish concurrently; the store keeps whichever write lands last.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: TurnEvent,
        work: F,
    ) -> Result<(T, RoundState), SessionError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, SessionError>>,
    {
        let gate = self.transition_gate.lock().await;
        let fresh = self.fetch_round().await?;
        self.observe_round(fresh).await;
        let Plan { id: plan_id, .. } = self.plan_transition(event.clone()).await?;

        let work_future = work();
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(SessionError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                self.paths.round.put(&next.to_record()).await?;
                drop(gate);
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::shared_store::memory::MemoryStore;

    #[tokio::test]
    async fn penalty_is_marked_once_per_round() {
        let session = SessionContext::new(
            Uuid::new_v4(),
            Arc::new(AppConfig::default()),
            Arc::new(MemoryStore::default()),
        );
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(session.mark_penalized(first).await);
        assert!(!session.mark_penalized(first).await);
        assert!(session.mark_penalized(second).await);
        assert!(!session.mark_penalized(second).await);
        assert_eq!(*session.last_penalized.lock().await, Some(second));
    }
}
