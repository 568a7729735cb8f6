use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::shared_store::SharedStore,
    error::{RejectReason, SessionError},
    services::session_controller::SessionController,
};

/// Peers hosted by this process, all attached to the same shared store.
///
/// Peers never look into each other's memory; the registry only routes
/// requests to the right [`SessionController`].
#[derive(Clone)]
pub struct PeerRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    config: Arc<AppConfig>,
    store: Arc<dyn SharedStore>,
    peers: DashMap<Uuid, SessionController>,
}

impl PeerRegistry {
    /// Empty registry attaching future peers to `store`.
    pub fn new(config: AppConfig, store: Arc<dyn SharedStore>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                config: Arc::new(config),
                store,
                peers: DashMap::new(),
            }),
        }
    }

    /// Configuration shared by every hosted peer.
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Shared store every peer is attached to.
    pub fn store(&self) -> &Arc<dyn SharedStore> {
        &self.inner.store
    }

    /// Attach a new peer and keep it until [`PeerRegistry::remove_peer`].
    pub async fn create_peer(&self) -> SessionController {
        let controller =
            SessionController::attach(self.inner.config.clone(), self.inner.store.clone()).await;
        self.inner.peers.insert(controller.peer_id(), controller.clone());
        info!(peer = %controller.peer_id(), hosted = self.len(), "peer registered");
        controller
    }

    /// Controller of `peer_id`, cloned out of the map.
    pub fn get(&self, peer_id: Uuid) -> Option<SessionController> {
        self.inner.peers.get(&peer_id).map(|entry| entry.value().clone())
    }

    /// Leave the session on behalf of `peer_id` and stop its tasks.
    ///
    /// Returns `false` when no such peer is hosted.
    pub async fn remove_peer(&self, peer_id: Uuid) -> bool {
        let Some((_, controller)) = self.inner.peers.remove(&peer_id) else {
            return false;
        };
        match controller.leave_session().await {
            Ok(()) | Err(SessionError::Rejected(RejectReason::NotJoined)) => {}
            Err(err) => warn!(peer = %peer_id, error = %err, "failed to leave before teardown"),
        }
        controller.teardown().await;
        true
    }

    /// Number of hosted peers.
    pub fn len(&self) -> usize {
        self.inner.peers.len()
    }

    /// Whether no peer is hosted.
    pub fn is_empty(&self) -> bool {
        self.inner.peers.is_empty()
    }

    /// Tear down every hosted peer without touching the shared store.
    pub async fn shutdown(&self) {
        let controllers: Vec<_> = self
            .inner
            .peers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.inner.peers.clear();
        for controller in controllers {
            controller.teardown().await;
        }
    }
}
