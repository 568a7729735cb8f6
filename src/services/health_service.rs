use tracing::warn;

use crate::{dto::health::HealthResponse, services::peer_registry::PeerRegistry};

/// Report the number of hosted peers, degraded when the shared store stops answering.
pub async fn health_status(registry: &PeerRegistry) -> HealthResponse {
    let root = registry.config().session_root().to_string();
    match registry.store().read(&root).await {
        Ok(_) => HealthResponse::ok(registry.len()),
        Err(err) => {
            warn!(error = %err, "shared store health check failed");
            HealthResponse::degraded(registry.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::shared_store::memory::MemoryStore};

    #[tokio::test]
    async fn closed_store_reports_degraded() {
        let store = MemoryStore::default();
        let config = AppConfig::default().with_session_root("healthProbe");
        let registry = PeerRegistry::new(config, Arc::new(store.clone()));
        assert_eq!(health_status(&registry).await.status, "ok");

        store.close();
        assert_eq!(health_status(&registry).await.status, "degraded");
    }
}
