use tracing::{debug, info, warn};

use crate::{
    dao::models::PlayerRecord,
    error::SessionError,
    state::{SessionContext, game::RosterEntry},
};

/// Apply `delta` to the score of `player_id`, flooring at zero.
///
/// Read-then-write on the whole player record: a concurrent write to the same
/// record from another peer can be lost. Callers only ever adjust the local
/// player's own record. Returns the new score, or `None` when the record is
/// missing or malformed.
pub async fn adjust(
    session: &SessionContext,
    player_id: &str,
    delta: i64,
) -> Result<Option<u32>, SessionError> {
    let handle = session.paths().players.get(player_id);
    let Some(value) = handle.once().await? else {
        debug!(player_id, delta, "score adjustment skipped: no player record");
        return Ok(None);
    };

    let mut player = match RosterEntry::classify(player_id, Some(&value)) {
        RosterEntry::Valid(player) => player,
        other => {
            warn!(player_id, entry = ?other, "score adjustment skipped: invalid player record");
            return Ok(None);
        }
    };

    let previous = player.score;
    player.score = (i64::from(previous) + delta).clamp(0, i64::from(u32::MAX)) as u32;
    handle.put(&PlayerRecord::from(&player)).await?;
    info!(player_id, delta, previous, score = player.score, "score adjusted");
    Ok(Some(player.score))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::{config::AppConfig, dao::shared_store::memory::MemoryStore, services::roster};

    #[tokio::test]
    async fn score_never_goes_below_zero() {
        let session = SessionContext::new(
            Uuid::new_v4(),
            Arc::new(AppConfig::default()),
            Arc::new(MemoryStore::default()),
        );
        let player = roster::join(&session, "Ann").await.unwrap();

        for _ in 0..3 {
            assert_eq!(adjust(&session, &player.id, -1).await.unwrap(), Some(0));
        }
        assert_eq!(adjust(&session, &player.id, 2).await.unwrap(), Some(2));
        assert_eq!(adjust(&session, &player.id, -1).await.unwrap(), Some(1));

        let snapshot = roster::snapshot(&session).await.unwrap();
        assert_eq!(snapshot.get(&player.id).map(|p| p.score), Some(1));
    }

    #[tokio::test]
    async fn missing_player_is_ignored() {
        let session = SessionContext::new(
            Uuid::new_v4(),
            Arc::new(AppConfig::default()),
            Arc::new(MemoryStore::default()),
        );
        assert_eq!(adjust(&session, "ghost", 1).await.unwrap(), None);
    }
}
