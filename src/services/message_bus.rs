//! Append-only replicated log of chat lines, guesses and system announcements.

use std::collections::HashSet;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    dao::{models::MessageRecord, shared_store::StoreEvent},
    error::SessionError,
    services::sse_events,
    state::{
        SessionContext, SharedSession,
        game::{Message, Player},
        now_millis,
    },
};

/// Author id and name used for announcements.
pub const SYSTEM_AUTHOR: &str = "system";

/// Record for a line typed or guessed by `player`.
pub fn player_entry(player: &Player, text: impl Into<String>, is_correct: bool) -> MessageRecord {
    MessageRecord {
        player_id: Some(player.id.clone()),
        player_name: Some(player.name.clone()),
        text: Some(text.into()),
        is_correct: is_correct.then_some(true),
        system: None,
        timestamp: Some(now_millis()),
    }
}

/// Record for a synthesised announcement.
pub fn system_entry(text: impl Into<String>) -> MessageRecord {
    MessageRecord {
        player_id: Some(SYSTEM_AUTHOR.to_string()),
        player_name: Some(SYSTEM_AUTHOR.to_string()),
        text: Some(text.into()),
        is_correct: None,
        system: Some(true),
        timestamp: Some(now_millis()),
    }
}

/// Append one immutable entry, returning its key.
pub async fn post(session: &SessionContext, entry: &MessageRecord) -> Result<String, SessionError> {
    let key = session.paths().messages.set(entry).await?;
    debug!(peer = %session.peer_id(), key = %key, "message posted");
    Ok(key)
}

/// Post an announcement; failures are logged and otherwise ignored.
pub async fn announce(session: &SessionContext, text: impl Into<String>) {
    if let Err(err) = post(session, &system_entry(text)).await {
        warn!(peer = %session.peer_id(), error = %err, "failed to post announcement");
    }
}

/// Deliver every entry, past and future, exactly once and in local arrival order.
///
/// Returns when the store goes away. After a lagged notification the whole
/// log is re-read and entries not yet delivered are handed over.
pub async fn subscribe<F>(session: &SessionContext, mut deliver: F) -> Result<(), SessionError>
where
    F: FnMut(&Message),
{
    let messages = session.paths().messages.clone();
    let mut subscription = messages.on().await?;
    let mut delivered: HashSet<String> = HashSet::new();

    let mut offer = |key: &str, value: Option<&Value>| {
        let Some(value) = value else {
            return;
        };
        if delivered.contains(key) {
            return;
        }
        if let Some(message) = Message::from_value(key, value) {
            delivered.insert(key.to_string());
            deliver(&message);
        }
    };

    while let Some(event) = subscription.next().await {
        match event {
            StoreEvent::Changed(change) => {
                if let Some(key) = messages.child_key(&change.path) {
                    offer(key, change.value.as_ref());
                }
            }
            StoreEvent::Lagged => {
                for (key, value) in messages.map().await? {
                    offer(&key, value.as_ref());
                }
            }
        }
    }
    Ok(())
}

/// Forward the log to the UI stream for the lifetime of the session.
pub fn spawn_subscriber(session: SharedSession) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = subscribe(&session, |message| {
            sse_events::broadcast_message(&session, message)
        })
        .await;
        if let Err(err) = result {
            warn!(peer = %session.peer_id(), error = %err, "message subscription ended");
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::shared_store::memory::MemoryStore,
        state::{SessionContext, game::Player},
    };

    fn session(store: &MemoryStore) -> SharedSession {
        SessionContext::new(
            Uuid::new_v4(),
            Arc::new(AppConfig::default()),
            Arc::new(store.clone()),
        )
    }

    fn collect(session: SharedSession) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let _ = subscribe(&session, |message| {
                let _ = tx.send(message.clone());
            })
            .await;
        });
        rx
    }

    #[tokio::test]
    async fn delivers_history_then_new_entries_once() {
        let store = MemoryStore::default();
        let writer = session(&store);
        let ann = Player::new("Ann".into());
        post(&writer, &player_entry(&ann, "hello", false))
            .await
            .unwrap();

        let mut received = collect(session(&store));
        let first = received.recv().await.unwrap();
        assert_eq!(first.text, "hello");
        assert_eq!(first.player_name, "Ann");
        assert!(!first.system);

        announce(&writer, "Ann is drawing").await;
        let second = received.recv().await.unwrap();
        assert!(second.system);
        assert_eq!(second.player_name, SYSTEM_AUTHOR);
        assert_ne!(first.key, second.key);
    }

    #[tokio::test]
    async fn resync_after_lag_skips_delivered_entries() {
        let store = MemoryStore::new(2);
        let writer = session(&store);
        let reader = session(&store);
        let ann = Player::new("Ann".into());
        post(&writer, &player_entry(&ann, "first", false))
            .await
            .unwrap();

        let burst: Vec<_> = (0..6)
            .map(|n| player_entry(&ann, format!("burst {n}"), n == 5))
            .collect();

        let mut received = collect(reader);
        let mut seen = vec![received.recv().await.unwrap().text];
        for entry in &burst {
            post(&writer, entry).await.unwrap();
        }
        for _ in 0..6 {
            seen.push(received.recv().await.unwrap().text);
        }

        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 7);
        assert!(seen.contains(&"burst 5".to_string()));
    }

    #[test]
    fn player_entries_only_flag_correct_guesses() {
        let ann = Player::new("Ann".into());
        assert_eq!(player_entry(&ann, "pear", false).is_correct, None);
        assert_eq!(player_entry(&ann, "apple", true).is_correct, Some(true));
        assert_eq!(system_entry("hi").system, Some(true));
    }
}
