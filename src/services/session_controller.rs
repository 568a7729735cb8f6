use std::sync::Arc;

use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        models::DrawRecord,
        shared_store::{SharedStore, StoreEvent},
    },
    dto::{
        session::{PlayerView, SessionView},
        sse::ServerEvent,
    },
    error::{RejectReason, SessionError},
    services::{
        message_bus, roster, score_ledger, sse_events,
        turn_scheduler::{self, finish_drawing, resolve_round_with},
    },
    state::{
        SessionContext, SharedSession,
        game::{DrawEvent, Player, Stroke},
        state_machine::{DrawingEnd, RoundOutcome, RoundState, TurnPhase},
    },
};

/// One peer: its session context plus the watchers keeping it in sync.
#[derive(Clone)]
pub struct SessionController {
    session: SharedSession,
}

impl SessionController {
    /// Attach a fresh peer to `store` and start following the session.
    pub async fn attach(config: Arc<AppConfig>, store: Arc<dyn SharedStore>) -> Self {
        let session = SessionContext::new(Uuid::new_v4(), config, store);
        for handle in [
            roster::spawn_watcher(session.clone()),
            turn_scheduler::spawn_round_watcher(session.clone()),
            message_bus::spawn_subscriber(session.clone()),
            spawn_drawing_watcher(session.clone()),
        ] {
            session.register_task(handle).await;
        }
        info!(peer = %session.peer_id(), "peer attached");
        Self { session }
    }

    /// Identifier of this peer.
    pub fn peer_id(&self) -> Uuid {
        self.session.peer_id()
    }

    /// Session context owned by this peer.
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Receiver for the UI events produced from now on.
    pub fn subscribe_ui(&self) -> broadcast::Receiver<ServerEvent> {
        self.session.ui().subscribe()
    }

    /// Join the session as `name` and start a round once enough players are in.
    pub async fn join_session(&self, name: &str) -> Result<Player, SessionError> {
        if let Some(existing) = self.session.local_player().await {
            return Err(SessionError::InvalidState(format!(
                "this peer already joined as `{}`",
                existing.name
            )));
        }

        let player = roster::join(&self.session, name).await?;
        self.session.set_local_player(Some(player.clone())).await;
        message_bus::announce(&self.session, format!("{} joined the game", player.name)).await;

        if let Err(err) = turn_scheduler::maybe_start_round(&self.session).await {
            warn!(peer = %self.peer_id(), error = %err, "failed to start round after join");
        }
        Ok(player)
    }

    /// Remove the local player from the roster.
    pub async fn leave_session(&self) -> Result<(), SessionError> {
        let local = self.joined_player().await?;
        roster::remove(&self.session, &local.id).await?;
        self.session.set_local_player(None).await;
        message_bus::announce(&self.session, format!("{} left the game", local.name)).await;
        Ok(())
    }

    /// Guess one of the offered options; returns whether it was the word.
    ///
    /// Each non-drawer gets one guess per round. A correct guess scores a
    /// point and ends the round for everyone. A correct guess that loses the
    /// race against another resolution is rejected with `InvalidPhase`.
    pub async fn submit_guess(&self, option: &str) -> Result<bool, SessionError> {
        let local = self.joined_player().await?;
        let round = self.session.fetch_round().await?;
        let active = match round.round() {
            Some(active) if round.phase() == TurnPhase::Guessing && active.drawer_id != local.id => {
                active
            }
            _ => return Err(RejectReason::InvalidPhase.into()),
        };
        if !active.word.options.iter().any(|candidate| candidate == option) {
            return Err(SessionError::InvalidInput(format!(
                "`{option}` is not one of the offered options"
            )));
        }
        if !self.session.mark_guessed(active.round_id).await {
            return Err(RejectReason::AlreadyGuessed.into());
        }

        let round_id = active.round_id;
        if option != active.word.word {
            message_bus::post(
                &self.session,
                &message_bus::player_entry(&local, format!("Guess: {option}"), false),
            )
            .await?;
            debug!(peer = %self.peer_id(), %round_id, "wrong guess");
            return Ok(false);
        }

        // The local timer must not resolve this round as timed out underneath us.
        self.session
            .cancel_countdown_for(round_id, TurnPhase::Guessing)
            .await;

        let session = &self.session;
        let word = active.word.word.clone();
        let outcome = RoundOutcome::Correct {
            guesser_id: local.id.clone(),
        };
        let resolved = resolve_round_with(session, round_id, outcome, || async move {
            score_ledger::adjust(session, &local.id, 1).await?;
            let text = format!("{} guessed it! The word was {word}", local.name);
            message_bus::post(session, &message_bus::player_entry(&local, text, true)).await?;
            Ok(())
        })
        .await?;
        Self::scored(resolved, round_id)
    }

    /// A correct guess only counts if it resolved the round.
    fn scored(resolved: Option<RoundState>, round_id: Uuid) -> Result<bool, SessionError> {
        match resolved {
            Some(_) => Ok(true),
            None => {
                debug!(%round_id, "correct guess arrived after the round ended");
                Err(RejectReason::InvalidPhase.into())
            }
        }
    }

    /// Hand the drawing over to the guessers before the timer runs out.
    pub async fn submit_drawing(&self) -> Result<(), SessionError> {
        let local = self.joined_player().await?;
        let round = self.session.fetch_round().await?;
        let round_id = Self::drawing_round(&round, &local)?;
        if finish_drawing(&self.session, round_id, DrawingEnd::Submitted)
            .await?
            .is_some()
        {
            self.session
                .cancel_countdown_for(round_id, TurnPhase::Drawing)
                .await;
        }
        Ok(())
    }

    /// Publish one stroke sample of the local drawer.
    pub async fn draw(&self, stroke: Stroke) -> Result<(), SessionError> {
        let local = self.joined_player().await?;
        Self::drawing_round(&self.session.current_round().await, &local)?;
        if !stroke.is_valid() {
            return Err(SessionError::InvalidInput(
                "stroke lies outside the canvas or has no size".into(),
            ));
        }
        let record = DrawRecord::from(&DrawEvent::Stroke(stroke));
        self.session.paths().drawing.put(&record).await?;
        Ok(())
    }

    /// Wipe the shared canvas.
    pub async fn clear_canvas(&self) -> Result<(), SessionError> {
        let local = self.joined_player().await?;
        Self::drawing_round(&self.session.current_round().await, &local)?;
        self.session
            .paths()
            .drawing
            .put(&DrawRecord::from(&DrawEvent::Clear))
            .await?;
        Ok(())
    }

    /// Post a free chat line.
    pub async fn post_chat(&self, text: &str) -> Result<(), SessionError> {
        let local = self.joined_player().await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::InvalidInput("message must not be blank".into()));
        }
        message_bus::post(&self.session, &message_bus::player_entry(&local, text, false)).await?;
        Ok(())
    }

    /// Tombstone everything under the session root and start over locally.
    ///
    /// Other peers notice through their own subscriptions; until then they
    /// may still act on what they cached.
    pub async fn reset_session(&self) -> Result<(), SessionError> {
        // Round first, so roster watchers see an idle session while seats vanish.
        self.session.paths().round.tombstone().await?;
        let root = &self.session.paths().root;
        let paths = root.descendants().await?;
        for path in &paths {
            root.at(path.as_str()).tombstone().await?;
        }

        self.session.cancel_countdown().await;
        self.session.set_local_player(None).await;
        self.session.observe_round(RoundState::idle()).await;
        sse_events::broadcast_session_reset(&self.session);
        warn!(peer = %self.peer_id(), paths = paths.len(), "session reset");
        Ok(())
    }

    /// Local render snapshot.
    pub async fn view(&self) -> SessionView {
        let round = self.session.current_round().await;
        let roster = self.session.roster().await;
        let player = self.session.local_player().await.map(|local| {
            roster
                .get(&local.id)
                .map(PlayerView::from)
                .unwrap_or_else(|| PlayerView::from(&local))
        });

        SessionView {
            peer_id: self.peer_id(),
            player,
            role: self.session.local_role().await.into(),
            round: sse_events::round_snapshot(&self.session, &round).await,
            roster: roster.players().values().map(PlayerView::from).collect(),
            min_players: self.session.config().min_players(),
            max_players: self.session.config().max_players(),
            remaining_secs: self.session.remaining(),
        }
    }

    /// Stop every timer and watcher of this peer.
    pub async fn teardown(&self) {
        self.session.abort_tasks().await;
        info!(peer = %self.peer_id(), "peer detached");
    }

    async fn joined_player(&self) -> Result<Player, SessionError> {
        self.session
            .local_player()
            .await
            .ok_or_else(|| RejectReason::NotJoined.into())
    }

    fn drawing_round(round: &RoundState, local: &Player) -> Result<Uuid, SessionError> {
        match round.round() {
            Some(active) if round.phase() == TurnPhase::Drawing && active.drawer_id == local.id => {
                Ok(active.round_id)
            }
            _ => Err(RejectReason::InvalidPhase.into()),
        }
    }
}

/// Forward canvas updates to the UI stream.
fn spawn_drawing_watcher(session: SharedSession) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut subscription = match session.paths().drawing.on().await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(peer = %session.peer_id(), error = %err, "cannot watch drawing");
                return;
            }
        };

        while let Some(event) = subscription.next().await {
            let value = match event {
                StoreEvent::Changed(change) => change.value,
                StoreEvent::Lagged => match session.paths().drawing.once().await {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(peer = %session.peer_id(), error = %err, "failed to resync drawing");
                        continue;
                    }
                },
            };
            match value.as_ref().and_then(DrawEvent::from_value) {
                Some(event) => sse_events::broadcast_drawing(&session, &event),
                None => debug!(peer = %session.peer_id(), "ignoring empty or invalid drawing value"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        dao::{models::PlayerRecord, shared_store::memory::MemoryStore},
        state::state_machine::ActiveRound,
    };

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    async fn peers(store: &MemoryStore, config: AppConfig, count: usize) -> Vec<SessionController> {
        let config = Arc::new(config);
        let mut peers = Vec::new();
        for _ in 0..count {
            peers.push(SessionController::attach(config.clone(), Arc::new(store.clone())).await);
        }
        settle().await;
        peers
    }

    async fn join_all(peers: &[SessionController]) -> Vec<Player> {
        let mut players = Vec::new();
        for (index, peer) in peers.iter().enumerate() {
            players.push(peer.join_session(&format!("p{}", index + 1)).await.unwrap());
            settle().await;
        }
        players
    }

    async fn round(peer: &SessionController) -> RoundState {
        peer.session().fetch_round().await.unwrap()
    }

    fn active(round: &RoundState) -> ActiveRound {
        round.round().cloned().expect("active round")
    }

    async fn score(peer: &SessionController, id: &str) -> Option<u32> {
        let snapshot = roster::snapshot(peer.session()).await.unwrap();
        snapshot.get(id).map(|player| player.score)
    }

    async fn expected_next(peer: &SessionController, drawer: &str) -> String {
        roster::snapshot(peer.session())
            .await
            .unwrap()
            .next_drawer(drawer)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn third_join_starts_drawing_and_timer_moves_to_guessing() {
        let store = MemoryStore::default();
        let peers = peers(&store, AppConfig::default(), 3).await;
        let players = join_all(&peers[..2]).await;
        assert_eq!(round(&peers[0]).await.phase(), TurnPhase::Idle);

        let third = peers[2].join_session("p3").await.unwrap();
        settle().await;

        let drawing = round(&peers[2]).await;
        assert_eq!(drawing.phase(), TurnPhase::Drawing);
        assert_eq!(drawing.drawer_id(), Some(players[0].id.as_str()));
        assert_ne!(drawing.drawer_id(), Some(third.id.as_str()));
        assert_eq!(peers[0].session().local_role().await, crate::state::LocalRole::Drawer);
        assert_eq!(peers[1].session().local_role().await, crate::state::LocalRole::Guesser);

        let option = active(&drawing).word.options[0].clone();
        let err = peers[0].submit_guess(&option).await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(RejectReason::InvalidPhase)));

        tokio::time::sleep(Duration::from_secs(121)).await;
        let guessing = round(&peers[0]).await;
        assert_eq!(guessing.phase(), TurnPhase::Guessing);
        assert_eq!(guessing.round_id(), drawing.round_id());

        let err = peers[0].submit_guess(&option).await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(RejectReason::InvalidPhase)));
    }

    #[tokio::test(start_paused = true)]
    async fn correct_guess_scores_and_rotates_the_drawer() {
        let store = MemoryStore::default();
        let peers = peers(&store, AppConfig::default(), 3).await;
        let players = join_all(&peers).await;

        peers[0].submit_drawing().await.unwrap();
        settle().await;
        let guessing = round(&peers[1]).await;
        assert_eq!(guessing.phase(), TurnPhase::Guessing);

        let word = active(&guessing).word.word;
        assert!(peers[1].submit_guess(&word).await.unwrap());
        settle().await;

        let next = round(&peers[2]).await;
        assert_eq!(next.phase(), TurnPhase::Drawing);
        assert_ne!(next.round_id(), guessing.round_id());
        let expected = expected_next(&peers[0], &players[0].id).await;
        assert_eq!(next.drawer_id(), Some(expected.as_str()));
        assert_eq!(
            next.last_round().map(|summary| summary.outcome.clone()),
            Some(RoundOutcome::Correct {
                guesser_id: players[1].id.clone()
            })
        );
        assert_eq!(score(&peers[0], &players[1].id).await, Some(1));

        let err = peers[2].submit_guess(&word).await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(RejectReason::InvalidPhase)));
    }

    #[tokio::test(start_paused = true)]
    async fn one_guess_per_round() {
        let store = MemoryStore::default();
        let peers = peers(&store, AppConfig::default(), 3).await;
        join_all(&peers).await;
        peers[0].submit_drawing().await.unwrap();
        settle().await;

        let guessing = active(&round(&peers[1]).await);
        let wrong = guessing
            .word
            .options
            .iter()
            .find(|option| **option != guessing.word.word)
            .cloned()
            .unwrap();

        assert!(!peers[1].submit_guess(&wrong).await.unwrap());
        let err = peers[1].submit_guess(&guessing.word.word).await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(RejectReason::AlreadyGuessed)));

        let err = peers[2].submit_guess("not offered").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
        assert_eq!(round(&peers[2]).await.phase(), TurnPhase::Guessing);
    }

    #[tokio::test(start_paused = true)]
    async fn guessing_timeout_penalises_the_drawer_once() {
        let store = MemoryStore::default();
        let peers = peers(&store, AppConfig::default(), 3).await;
        let players = join_all(&peers).await;
        score_ledger::adjust(peers[0].session(), &players[0].id, 2)
            .await
            .unwrap();

        peers[0].submit_drawing().await.unwrap();
        settle().await;
        let guessing = round(&peers[0]).await;

        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;

        let next = round(&peers[1]).await;
        assert_eq!(next.phase(), TurnPhase::Drawing);
        let summary = next.last_round().cloned().unwrap();
        assert_eq!(Some(summary.round_id), guessing.round_id());
        assert_eq!(summary.outcome, RoundOutcome::TimedOut);
        let expected = expected_next(&peers[0], &players[0].id).await;
        assert_eq!(next.drawer_id(), Some(expected.as_str()));

        settle().await;
        assert_eq!(score(&peers[0], &players[0].id).await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn drawer_leaving_passes_the_pencil() {
        let store = MemoryStore::default();
        let peers = peers(&store, AppConfig::default(), 4).await;
        let players = join_all(&peers).await;
        let drawing = round(&peers[1]).await;
        assert_eq!(drawing.drawer_id(), Some(players[0].id.as_str()));

        peers[0].leave_session().await.unwrap();
        settle().await;

        let next = round(&peers[1]).await;
        assert_eq!(next.phase(), TurnPhase::Drawing);
        assert_eq!(
            next.last_round().map(|summary| summary.outcome.clone()),
            Some(RoundOutcome::DrawerLeft)
        );
        let expected = expected_next(&peers[1], &players[0].id).await;
        assert_eq!(next.drawer_id(), Some(expected.as_str()));
        assert_eq!(peers[0].session().local_role().await, crate::state::LocalRole::Spectator);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_under_minimum_pauses_until_someone_joins() {
        let store = MemoryStore::default();
        let peers = peers(&store, AppConfig::default(), 4).await;
        join_all(&peers[..3]).await;
        assert_eq!(round(&peers[0]).await.phase(), TurnPhase::Drawing);

        peers[2].leave_session().await.unwrap();
        settle().await;
        assert_eq!(round(&peers[0]).await.phase(), TurnPhase::Idle);

        peers[3].join_session("p4").await.unwrap();
        settle().await;
        assert_eq!(round(&peers[0]).await.phase(), TurnPhase::Drawing);
    }

    #[tokio::test(start_paused = true)]
    async fn join_is_rejected_when_full() {
        let store = MemoryStore::default();
        let peers = peers(&store, AppConfig::default().with_player_limits(3, 3), 4).await;
        join_all(&peers[..3]).await;

        let err = peers[3].join_session("late").await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(RejectReason::Full)));
        assert!(peers[3].session().local_player().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_drawer_touches_the_canvas() {
        let store = MemoryStore::default();
        let peers = peers(&store, AppConfig::default(), 3).await;
        join_all(&peers).await;
        let stroke = Stroke {
            x: 0.5,
            y: 0.25,
            color: "#112233".into(),
            size: 4.0,
            is_new_line: true,
        };

        let err = peers[1].draw(stroke.clone()).await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(RejectReason::InvalidPhase)));

        peers[0].draw(stroke.clone()).await.unwrap();
        let stored = peers[1].session().paths().drawing.once().await.unwrap();
        assert_eq!(
            stored.as_ref().and_then(DrawEvent::from_value),
            Some(DrawEvent::Stroke(stroke.clone()))
        );

        let off_canvas = Stroke { x: 1.5, ..stroke };
        let err = peers[0].draw(off_canvas).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));

        peers[0].clear_canvas().await.unwrap();
        let stored = peers[2].session().paths().drawing.once().await.unwrap();
        assert_eq!(stored.as_ref().and_then(DrawEvent::from_value), Some(DrawEvent::Clear));
    }

    #[tokio::test(start_paused = true)]
    async fn spectators_cannot_act() {
        let store = MemoryStore::default();
        let peers = peers(&store, AppConfig::default(), 1).await;

        for err in [
            peers[0].submit_guess("apple").await.unwrap_err(),
            peers[0].submit_drawing().await.unwrap_err(),
            peers[0].post_chat("hi").await.unwrap_err(),
            peers[0].leave_session().await.unwrap_err(),
        ] {
            assert!(matches!(err, SessionError::Rejected(RejectReason::NotJoined)));
        }
        let view = peers[0].view().await;
        assert!(view.player.is_none());
        assert_eq!(view.role, crate::dto::session::RoleView::Spectator);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_wipes_the_session_for_everyone() {
        let store = MemoryStore::default();
        let peers = peers(&store, AppConfig::default(), 3).await;
        join_all(&peers).await;
        peers[1].post_chat("hello").await.unwrap();
        let mut ui = peers[0].subscribe_ui();

        peers[0].reset_session().await.unwrap();
        settle().await;

        assert!(peers[0].session().paths().root.descendants().await.unwrap().is_empty());
        assert_eq!(round(&peers[1]).await.phase(), TurnPhase::Idle);
        for peer in &peers {
            assert!(peer.session().local_player().await.is_none());
        }

        let mut saw_reset = false;
        while let Ok(event) = ui.try_recv() {
            saw_reset |= event.event.as_deref() == Some("session.reset");
        }
        assert!(saw_reset);
    }

    #[tokio::test(start_paused = true)]
    async fn view_reports_the_local_seat() {
        let store = MemoryStore::default();
        let peers = peers(&store, AppConfig::default(), 3).await;
        let players = join_all(&peers).await;

        let view = peers[1].view().await;
        assert_eq!(view.peer_id, peers[1].peer_id());
        assert_eq!(view.player.map(|player| player.id), Some(players[1].id.clone()));
        assert_eq!(view.role, crate::dto::session::RoleView::Guesser);
        assert_eq!(view.roster.len(), 3);
        assert_eq!(view.min_players, 3);
        assert!(view.remaining_secs.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn roster_over_capacity_forces_idle() {
        let store = MemoryStore::default();
        let peers = peers(&store, AppConfig::default().with_player_limits(3, 3), 3).await;
        join_all(&peers).await;
        assert_eq!(round(&peers[0]).await.phase(), TurnPhase::Drawing);

        // A join that slipped past the capacity check on another replica.
        let extra = Player::new("late".into());
        peers[0]
            .session()
            .paths()
            .players
            .get(&extra.id)
            .put(&PlayerRecord::from(&extra))
            .await
            .unwrap();
        settle().await;

        let snapshot = roster::snapshot(peers[0].session()).await.unwrap();
        assert_eq!(roster::valid_count(&snapshot), 4);
        assert_eq!(round(&peers[1]).await.phase(), TurnPhase::Idle);

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(round(&peers[2]).await.phase(), TurnPhase::Idle);
        assert!(
            turn_scheduler::maybe_start_round(peers[2].session())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn correct_guess_after_the_round_ended_is_rejected() {
        let store = MemoryStore::default();
        let peers = peers(&store, AppConfig::default(), 3).await;
        let players = join_all(&peers).await;
        peers[0].submit_drawing().await.unwrap();
        settle().await;
        let guessing = round(&peers[1]).await;
        let round_id = guessing.round_id().unwrap();

        turn_scheduler::resolve_round(peers[2].session(), round_id, RoundOutcome::TimedOut)
            .await
            .unwrap()
            .unwrap();
        let outcome = RoundOutcome::Correct {
            guesser_id: players[1].id.clone(),
        };
        let late = turn_scheduler::resolve_round(peers[1].session(), round_id, outcome)
            .await
            .unwrap();

        let err = SessionController::scored(late, round_id).unwrap_err();
        assert!(matches!(err, SessionError::Rejected(RejectReason::InvalidPhase)));
        let err = peers[1].submit_guess(&active(&guessing).word.word).await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(RejectReason::InvalidPhase)));
        assert_eq!(score(&peers[0], &players[1].id).await, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn correct_guess_stops_the_local_guessing_timer() {
        let store = MemoryStore::default();
        let peers = peers(&store, AppConfig::default(), 3).await;
        let players = join_all(&peers).await;
        score_ledger::adjust(peers[0].session(), &players[0].id, 1)
            .await
            .unwrap();
        peers[0].submit_drawing().await.unwrap();
        settle().await;
        let guessing = active(&round(&peers[1]).await);

        assert!(peers[1].submit_guess(&guessing.word.word).await.unwrap());
        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;

        let next = round(&peers[2]).await;
        assert_ne!(next.round_id(), Some(guessing.round_id));
        let summary = next.last_round().cloned().unwrap();
        assert_eq!(summary.round_id, guessing.round_id);
        assert!(matches!(summary.outcome, RoundOutcome::Correct { .. }));
        assert_eq!(score(&peers[0], &players[0].id).await, Some(1));
    }
}
