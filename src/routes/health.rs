use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::health::HealthResponse,
    services::{health_service, peer_registry::PeerRegistry},
};

#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses((status = 200, description = "Service is running", body = HealthResponse))
)]
/// Return the current health status and probe the shared store.
pub async fn healthcheck(State(registry): State<PeerRegistry>) -> Json<HealthResponse> {
    Json(health_service::health_status(&registry).await)
}

/// Configure the health routes subtree.
pub fn router() -> Router<PeerRegistry> {
    Router::<PeerRegistry>::new().route("/healthcheck", get(healthcheck))
}
