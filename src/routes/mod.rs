use axum::Router;

use crate::services::peer_registry::PeerRegistry;

/// Swagger UI and the OpenAPI document.
pub mod docs;
/// Liveness probe.
pub mod health;
/// Peer lifecycle and player actions.
pub mod peers;
/// Per-peer UI event streams.
pub mod sse;

/// Compose all route trees, wiring in the peer registry and documentation routes.
pub fn router(registry: PeerRegistry) -> Router<()> {
    health::router()
        .merge(peers::router())
        .merge(sse::router())
        .merge(docs::router())
        .with_state(registry)
}
