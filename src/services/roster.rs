use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    dao::{models::PlayerRecord, shared_store::StoreEvent},
    error::{RejectReason, SessionError},
    services::{sse_events, turn_scheduler},
    state::{
        SessionContext, SharedSession,
        game::{Player, RosterEntry, RosterSnapshot},
    },
};

/// Fresh roster snapshot; malformed entries are tombstoned on the way.
pub async fn snapshot(session: &SessionContext) -> Result<RosterSnapshot, SessionError> {
    let children = session.paths().players.map().await?;
    let snapshot = RosterSnapshot::from_children(children);
    prune(session, &snapshot).await;
    Ok(snapshot)
}

/// Number of valid entries in `snapshot`.
pub fn valid_count(snapshot: &RosterSnapshot) -> usize {
    snapshot.valid_count()
}

/// Whether the valid roster lies within the configured player limits.
pub fn in_range(session: &SessionContext, snapshot: &RosterSnapshot) -> bool {
    let config = session.config();
    (config.min_players()..=config.max_players()).contains(&valid_count(snapshot))
}

async fn prune(session: &SessionContext, snapshot: &RosterSnapshot) {
    for (key, reason) in snapshot.malformed() {
        warn!(peer = %session.peer_id(), key = %key, ?reason, "pruning malformed roster entry");
        if let Err(err) = session.paths().players.get(key).tombstone().await {
            warn!(key = %key, error = %err, "failed to tombstone malformed roster entry");
        }
    }
}

/// Write a new player record unless the session is full.
pub async fn join(session: &SessionContext, name: &str) -> Result<Player, SessionError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SessionError::InvalidInput("name must not be blank".into()));
    }

    let snapshot = snapshot(session).await?;
    let max_players = session.config().max_players();
    if valid_count(&snapshot) >= max_players {
        info!(
            peer = %session.peer_id(),
            count = snapshot.valid_count(),
            max_players,
            "join rejected: session full"
        );
        return Err(RejectReason::Full.into());
    }

    let player = Player::new(name.to_string());
    session
        .paths()
        .players
        .get(&player.id)
        .put(&PlayerRecord::from(&player))
        .await?;
    info!(peer = %session.peer_id(), player_id = %player.id, name = %player.name, "player joined");
    Ok(player)
}

/// Tombstone the record of `player_id`.
pub async fn remove(session: &SessionContext, player_id: &str) -> Result<(), SessionError> {
    session.paths().players.get(player_id).tombstone().await?;
    info!(peer = %session.peer_id(), player_id, "player removed");
    Ok(())
}

/// Display name of `player_id` read straight from its record.
pub async fn player_name(session: &SessionContext, player_id: &str) -> Option<String> {
    let value = session.paths().players.get(player_id).once().await.ok()??;
    match RosterEntry::classify(player_id, Some(&value)) {
        RosterEntry::Valid(player) => Some(player.name),
        _ => None,
    }
}

/// Follow the players collection for the lifetime of the session.
pub fn spawn_watcher(session: SharedSession) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut subscription = match session.paths().players.on().await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(peer = %session.peer_id(), error = %err, "cannot watch roster");
                return;
            }
        };

        while let Some(event) = subscription.next().await {
            if let StoreEvent::Changed(change) = &event {
                debug!(peer = %session.peer_id(), path = %change.path, "roster change");
            }
            on_roster_changed(&session).await;
        }
        debug!(peer = %session.peer_id(), "roster subscription closed");
    })
}

async fn on_roster_changed(session: &SessionContext) {
    let snapshot = match snapshot(session).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(peer = %session.peer_id(), error = %err, "failed to refresh roster");
            return;
        }
    };

    let previous = session.roster().await;
    if let Some(local) = session.local_player().await {
        if previous.contains(&local.id) && !snapshot.contains(&local.id) {
            info!(peer = %session.peer_id(), player_id = %local.id, "local player left the roster");
            session.set_local_player(None).await;
            sse_events::broadcast_info(session, "your player was removed from the session");
        }
    }

    session.set_roster(snapshot.clone()).await;
    sse_events::broadcast_roster(session, &snapshot);
    turn_scheduler::on_roster_changed(session, &snapshot).await;
}
