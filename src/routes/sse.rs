use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    routes::peers::controller,
    services::{peer_registry::PeerRegistry, sse_service},
};

#[utoipa::path(
    get,
    path = "/peers/{peer}/events",
    tag = "sse",
    params(("peer" = Uuid, Path, description = "Hosted peer")),
    responses(
        (status = 200, description = "UI event stream of the peer", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown peer")
    )
)]
/// Stream the UI events of one peer: phase, countdown, roster, messages and canvas.
pub async fn peer_stream(
    State(registry): State<PeerRegistry>,
    Path(peer): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let controller = controller(&registry, peer)?;
    let receiver = sse_service::subscribe(&controller);
    info!(%peer, "new UI stream connection");
    Ok(sse_service::to_sse_stream(receiver, peer))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<PeerRegistry> {
    Router::<PeerRegistry>::new().route("/peers/{peer}/events", get(peer_stream))
}
