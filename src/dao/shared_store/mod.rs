//! Path-addressed replicated key/value graph that carries the whole session.
//!
//! The store has no transactions and no server-side validation: every write
//! is a last-write-wins overwrite of a single path, a tombstone is a `None`
//! write, and every subscribed peer is told about each change it receives.

/// In-process replica.
pub mod memory;

use std::{collections::VecDeque, sync::Arc};

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::dao::storage::{StorageError, StorageResult};

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// Child entries returned by [`SharedStore::children`], tombstones included as `None`.
pub type Children = Vec<(String, Option<Value>)>;

/// A single observed mutation of one path.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Full path that was written.
    pub path: String,
    /// New value, `None` for a tombstone.
    pub value: Option<Value>,
}

/// What a subscription hands to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A path under the subscription prefix changed (or was present at subscribe time).
    Changed(Change),
    /// Notifications were dropped; the consumer must re-read fresh state.
    Lagged,
}

/// Backend primitives of the replicated store.
///
/// Implementations must be cheap to clone into `'static` futures.
pub trait SharedStore: Send + Sync {
    /// Current value at `path`, `None` when absent or tombstoned.
    fn read(&self, path: &str) -> BoxFuture<'static, StorageResult<Option<Value>>>;
    /// Overwrite `path`; `None` writes a tombstone.
    fn write(&self, path: &str, value: Option<Value>) -> BoxFuture<'static, StorageResult<()>>;
    /// Append `value` under `path` with a freshly generated child key, returning the key.
    fn append(&self, path: &str, value: Value) -> BoxFuture<'static, StorageResult<String>>;
    /// Direct children of `path` in store insertion order.
    fn children(&self, path: &str) -> BoxFuture<'static, StorageResult<Children>>;
    /// Every live (non-tombstoned) path at or below `path`.
    fn descendants(&self, path: &str) -> BoxFuture<'static, StorageResult<Vec<String>>>;
    /// Subscribe to `path` and everything below it; current values are delivered first.
    fn watch(&self, path: &str) -> BoxFuture<'static, StorageResult<Subscription>>;
}

/// Persistent subscription created by [`StoreHandle::on`].
pub struct Subscription {
    prefix: String,
    backlog: VecDeque<Change>,
    receiver: broadcast::Receiver<Change>,
}

impl Subscription {
    /// Build a subscription that replays `backlog` before listening to `receiver`.
    pub fn new(prefix: String, backlog: Vec<Change>, receiver: broadcast::Receiver<Change>) -> Self {
        Self {
            prefix,
            backlog: backlog.into(),
            receiver,
        }
    }

    /// Wait for the next change under the subscribed prefix.
    ///
    /// Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<StoreEvent> {
        if let Some(change) = self.backlog.pop_front() {
            return Some(StoreEvent::Changed(change));
        }

        loop {
            match self.receiver.recv().await {
                Ok(change) if is_under(&self.prefix, &change.path) => {
                    return Some(StoreEvent::Changed(change));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(prefix = %self.prefix, skipped, "store subscription lagged");
                    return Some(StoreEvent::Lagged);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Handle addressing one path of a [`SharedStore`].
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn SharedStore>,
    path: String,
}

impl StoreHandle {
    /// Handle for `path` in `store`.
    pub fn new(store: Arc<dyn SharedStore>, path: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    /// Handle for the child `key` of this path.
    pub fn get(&self, key: &str) -> StoreHandle {
        StoreHandle {
            store: self.store.clone(),
            path: join(&self.path, key),
        }
    }

    /// Handle for the absolute `path` in the same store.
    pub fn at(&self, path: impl Into<String>) -> StoreHandle {
        StoreHandle::new(self.store.clone(), path)
    }

    /// Full path addressed by this handle.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Direct child key of this handle that `path` belongs to, if any.
    pub fn child_key<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path
            .strip_prefix(self.path.as_str())?
            .strip_prefix(PATH_SEPARATOR)?;
        rest.split(PATH_SEPARATOR).next().filter(|key| !key.is_empty())
    }

    /// Single read of the current value.
    pub async fn once(&self) -> StorageResult<Option<Value>> {
        self.store.read(&self.path).await
    }

    /// Overwrite the value at this path.
    pub async fn put<T: Serialize + ?Sized>(&self, value: &T) -> StorageResult<()> {
        let value = self.encode(value)?;
        self.store.write(&self.path, Some(value)).await
    }

    /// Write a tombstone at this path.
    pub async fn tombstone(&self) -> StorageResult<()> {
        self.store.write(&self.path, None).await
    }

    /// Append an entry to the keyed collection at this path.
    pub async fn set<T: Serialize + ?Sized>(&self, value: &T) -> StorageResult<String> {
        let value = self.encode(value)?;
        self.store.append(&self.path, value).await
    }

    /// Snapshot of the direct children.
    pub async fn map(&self) -> StorageResult<Children> {
        self.store.children(&self.path).await
    }

    /// Every live path at or below this one.
    pub async fn descendants(&self) -> StorageResult<Vec<String>> {
        self.store.descendants(&self.path).await
    }

    /// Persistent subscription to this path and its descendants.
    pub async fn on(&self) -> StorageResult<Subscription> {
        self.store.watch(&self.path).await
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> StorageResult<Value> {
        serde_json::to_value(value).map_err(|source| StorageError::Encode {
            path: self.path.clone(),
            source,
        })
    }
}

/// Concatenate a parent path and a child key.
pub fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}{PATH_SEPARATOR}{key}")
    }
}

/// Whether `path` equals `prefix` or lies below it.
pub fn is_under(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(PATH_SEPARATOR),
        None => false,
    }
}

/// Reject paths with empty segments.
pub fn validate_path(path: &str) -> StorageResult<()> {
    if path.is_empty() || path.split(PATH_SEPARATOR).any(str::is_empty) {
        return Err(StorageError::InvalidPath {
            path: path.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matching_respects_segments() {
        assert!(is_under("game/players", "game/players"));
        assert!(is_under("game/players", "game/players/abc"));
        assert!(!is_under("game/players", "game/playersx"));
        assert!(!is_under("game/players", "game"));
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(validate_path("game/round").is_ok());
        assert!(validate_path("").is_err());
        assert!(validate_path("game//round").is_err());
        assert!(validate_path("game/").is_err());
    }
}
