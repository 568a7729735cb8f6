use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};
use uuid::Uuid;

use crate::dao::storage::{StorageError, StorageResult};

use super::{
    Change, Children, PATH_SEPARATOR, SharedStore, Subscription, is_under, validate_path,
};

/// Default number of buffered change notifications per subscriber.
pub const DEFAULT_CHANGE_CAPACITY: usize = 1024;

/// In-process replica of the shared graph.
///
/// Every peer holding a clone observes the same converged map; the last write
/// to arrive at a path wins and is fanned out to all subscribers.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    entries: RwLock<IndexMap<String, Option<Value>>>,
    changes: broadcast::Sender<Change>,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store with the given notification buffer per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (changes, _rx) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(IndexMap::new()),
                changes,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Stop accepting operations; pending subscriptions still drain.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            info!("shared store closed");
        }
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHANGE_CAPACITY)
    }
}

impl Inner {
    async fn store(&self, path: String, value: Option<Value>) {
        let mut entries = self.entries.write().await;
        entries.insert(path.clone(), value.clone());
        // No subscriber is not an error: the write still lands.
        let _ = self.changes.send(Change { path, value });
    }
}

impl SharedStore for MemoryStore {
    fn read(&self, path: &str) -> BoxFuture<'static, StorageResult<Option<Value>>> {
        let this = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            this.ensure_open()?;
            validate_path(&path)?;
            let entries = this.inner.entries.read().await;
            Ok(entries.get(&path).cloned().flatten())
        })
    }

    fn write(&self, path: &str, value: Option<Value>) -> BoxFuture<'static, StorageResult<()>> {
        let this = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            this.ensure_open()?;
            validate_path(&path)?;
            debug!(%path, tombstone = value.is_none(), "store write");
            this.inner.store(path, value).await;
            Ok(())
        })
    }

    fn append(&self, path: &str, value: Value) -> BoxFuture<'static, StorageResult<String>> {
        let this = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            this.ensure_open()?;
            validate_path(&path)?;
            let key = Uuid::new_v4().simple().to_string();
            let child = format!("{path}{PATH_SEPARATOR}{key}");
            debug!(path = %child, "store append");
            this.inner.store(child, Some(value)).await;
            Ok(key)
        })
    }

    fn children(&self, path: &str) -> BoxFuture<'static, StorageResult<Children>> {
        let this = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            this.ensure_open()?;
            validate_path(&path)?;
            let entries = this.inner.entries.read().await;
            let children = entries
                .iter()
                .filter_map(|(candidate, value)| {
                    let rest = candidate
                        .strip_prefix(path.as_str())?
                        .strip_prefix(PATH_SEPARATOR)?;
                    (!rest.contains(PATH_SEPARATOR)).then(|| (rest.to_string(), value.clone()))
                })
                .collect();
            Ok(children)
        })
    }

    fn descendants(&self, path: &str) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let this = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            this.ensure_open()?;
            validate_path(&path)?;
            let entries = this.inner.entries.read().await;
            Ok(entries
                .iter()
                .filter(|(candidate, value)| value.is_some() && is_under(&path, candidate))
                .map(|(candidate, _)| candidate.clone())
                .collect())
        })
    }

    fn watch(&self, path: &str) -> BoxFuture<'static, StorageResult<Subscription>> {
        let this = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            this.ensure_open()?;
            validate_path(&path)?;
            // Subscribe while holding the read lock so no write slips between
            // the backlog snapshot and the live receiver.
            let entries = this.inner.entries.read().await;
            let receiver = this.inner.changes.subscribe();
            let backlog = entries
                .iter()
                .filter(|(candidate, value)| value.is_some() && is_under(&path, candidate))
                .map(|(candidate, value)| Change {
                    path: candidate.clone(),
                    value: value.clone(),
                })
                .collect();
            drop(entries);
            Ok(Subscription::new(path, backlog, receiver))
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dao::shared_store::{StoreEvent, StoreHandle};

    fn handle(store: &MemoryStore, path: &str) -> StoreHandle {
        StoreHandle::new(Arc::new(store.clone()), path)
    }

    #[tokio::test]
    async fn last_write_wins_per_path() {
        let store = MemoryStore::default();
        let round = handle(&store, "game/round");

        round.put(&json!({"phase": "drawing"})).await.unwrap();
        round.put(&json!({"phase": "guessing"})).await.unwrap();

        assert_eq!(
            round.once().await.unwrap(),
            Some(json!({"phase": "guessing"}))
        );
    }

    #[tokio::test]
    async fn tombstone_reads_as_absent_but_stays_listed() {
        let store = MemoryStore::default();
        let players = handle(&store, "game/players");
        players.get("a").put(&json!({"id": "a"})).await.unwrap();
        players.get("b").put(&json!({"id": "b"})).await.unwrap();
        players.get("a").tombstone().await.unwrap();

        assert_eq!(players.get("a").once().await.unwrap(), None);
        let children = players.map().await.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0], ("a".to_string(), None));
        assert_eq!(players.descendants().await.unwrap(), vec!["game/players/b"]);
    }

    #[tokio::test]
    async fn children_keep_insertion_order_and_skip_grandchildren() {
        let store = MemoryStore::default();
        let root = handle(&store, "game");
        root.get("players").get("z").put(&json!(1)).await.unwrap();
        root.get("players").get("a").put(&json!(2)).await.unwrap();
        root.get("players").get("a").get("deep").put(&json!(3)).await.unwrap();

        let keys: Vec<_> = root
            .get("players")
            .map()
            .await
            .unwrap()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[tokio::test]
    async fn subscription_replays_current_values_then_follows_changes() {
        let store = MemoryStore::default();
        let messages = handle(&store, "game/messages");
        let first = messages.set(&json!({"text": "hi"})).await.unwrap();

        let mut subscription = messages.on().await.unwrap();
        let second = messages.set(&json!({"text": "there"})).await.unwrap();
        handle(&store, "game/round").put(&json!({})).await.unwrap();

        let Some(StoreEvent::Changed(change)) = subscription.next().await else {
            panic!("expected backlog entry");
        };
        assert_eq!(messages.child_key(&change.path), Some(first.as_str()));
        let Some(StoreEvent::Changed(change)) = subscription.next().await else {
            panic!("expected live entry");
        };
        assert_eq!(messages.child_key(&change.path), Some(second.as_str()));
    }

    #[tokio::test]
    async fn lagging_subscriber_is_told_to_resync() {
        let store = MemoryStore::new(2);
        let round = handle(&store, "game/round");
        let mut subscription = round.on().await.unwrap();
        for phase in 0..5 {
            round.put(&json!({ "n": phase })).await.unwrap();
        }
        assert_eq!(subscription.next().await, Some(StoreEvent::Lagged));
    }

    #[tokio::test]
    async fn closed_store_rejects_operations() {
        let store = MemoryStore::default();
        let round = handle(&store, "game/round");
        store.close();
        assert!(matches!(round.once().await, Err(StorageError::Closed)));
        assert!(matches!(round.put(&json!(1)).await, Err(StorageError::Closed)));
    }
}
