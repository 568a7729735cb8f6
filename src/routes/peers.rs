use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::session::{
        ActionResponse, ChatRequest, GuessRequest, GuessResponse, JoinRequest, PeerCreatedResponse,
        PlayerView, SessionView, StrokeRequest,
    },
    error::AppError,
    services::{peer_registry::PeerRegistry, session_controller::SessionController},
};

/// Routes driving hosted peers: lifecycle, player actions and local views.
pub fn router() -> Router<PeerRegistry> {
    Router::new()
        .route("/peers", post(create_peer))
        .route("/peers/{peer}", delete(delete_peer))
        .route("/peers/{peer}/join", post(join))
        .route("/peers/{peer}/guess", post(guess))
        .route("/peers/{peer}/drawing/submit", post(submit_drawing))
        .route("/peers/{peer}/drawing/stroke", post(stroke))
        .route("/peers/{peer}/drawing/clear", post(clear_canvas))
        .route("/peers/{peer}/chat", post(chat))
        .route("/peers/{peer}/reset", post(reset))
        .route("/peers/{peer}/state", get(state))
}

/// Look up a hosted peer or fail with 404.
pub(crate) fn controller(
    registry: &PeerRegistry,
    peer_id: Uuid,
) -> Result<SessionController, AppError> {
    registry
        .get(peer_id)
        .ok_or_else(|| AppError::NotFound(format!("peer `{peer_id}` is not hosted here")))
}

/// Attach a new peer to the shared session.
#[utoipa::path(
    post,
    path = "/peers",
    tag = "peers",
    responses(
        (status = 201, description = "Peer attached", body = PeerCreatedResponse)
    )
)]
pub async fn create_peer(
    State(registry): State<PeerRegistry>,
) -> (StatusCode, Json<PeerCreatedResponse>) {
    let controller = registry.create_peer().await;
    (
        StatusCode::CREATED,
        Json(PeerCreatedResponse {
            peer_id: controller.peer_id(),
        }),
    )
}

/// Leave the session and detach the peer.
#[utoipa::path(
    delete,
    path = "/peers/{peer}",
    tag = "peers",
    params(("peer" = Uuid, Path, description = "Hosted peer")),
    responses(
        (status = 204, description = "Peer detached"),
        (status = 404, description = "Unknown peer")
    )
)]
pub async fn delete_peer(
    State(registry): State<PeerRegistry>,
    Path(peer): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if registry.remove_peer(peer).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("peer `{peer}` is not hosted here")))
    }
}

/// Join the session with a display name.
#[utoipa::path(
    post,
    path = "/peers/{peer}/join",
    tag = "peers",
    params(("peer" = Uuid, Path, description = "Hosted peer")),
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Player joined", body = PlayerView),
        (status = 409, description = "Session full or peer already joined")
    )
)]
pub async fn join(
    State(registry): State<PeerRegistry>,
    Path(peer): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<JoinRequest>>,
) -> Result<Json<PlayerView>, AppError> {
    let player = controller(&registry, peer)?
        .join_session(&payload.name)
        .await?;
    Ok(Json(PlayerView::from(&player)))
}

/// Guess one of the offered options.
#[utoipa::path(
    post,
    path = "/peers/{peer}/guess",
    tag = "peers",
    params(("peer" = Uuid, Path, description = "Hosted peer")),
    request_body = GuessRequest,
    responses(
        (status = 200, description = "Guess recorded", body = GuessResponse),
        (status = 409, description = "Not guessing, drawer, or already guessed")
    )
)]
pub async fn guess(
    State(registry): State<PeerRegistry>,
    Path(peer): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<GuessRequest>>,
) -> Result<Json<GuessResponse>, AppError> {
    let correct = controller(&registry, peer)?
        .submit_guess(&payload.option)
        .await?;
    Ok(Json(GuessResponse { correct }))
}

/// End the drawing phase early.
#[utoipa::path(
    post,
    path = "/peers/{peer}/drawing/submit",
    tag = "peers",
    params(("peer" = Uuid, Path, description = "Hosted peer")),
    responses(
        (status = 200, description = "Drawing handed over", body = ActionResponse),
        (status = 409, description = "Not the drawer or not drawing")
    )
)]
pub async fn submit_drawing(
    State(registry): State<PeerRegistry>,
    Path(peer): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    controller(&registry, peer)?.submit_drawing().await?;
    Ok(Json(ActionResponse::new("drawing submitted")))
}

/// Publish a stroke sample.
#[utoipa::path(
    post,
    path = "/peers/{peer}/drawing/stroke",
    tag = "peers",
    params(("peer" = Uuid, Path, description = "Hosted peer")),
    request_body = StrokeRequest,
    responses(
        (status = 200, description = "Stroke published", body = ActionResponse),
        (status = 409, description = "Not the drawer or not drawing")
    )
)]
pub async fn stroke(
    State(registry): State<PeerRegistry>,
    Path(peer): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<StrokeRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    controller(&registry, peer)?.draw(payload.into()).await?;
    Ok(Json(ActionResponse::new("stroke published")))
}

/// Wipe the shared canvas.
#[utoipa::path(
    post,
    path = "/peers/{peer}/drawing/clear",
    tag = "peers",
    params(("peer" = Uuid, Path, description = "Hosted peer")),
    responses(
        (status = 200, description = "Canvas cleared", body = ActionResponse),
        (status = 409, description = "Not the drawer or not drawing")
    )
)]
pub async fn clear_canvas(
    State(registry): State<PeerRegistry>,
    Path(peer): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    controller(&registry, peer)?.clear_canvas().await?;
    Ok(Json(ActionResponse::new("canvas cleared")))
}

/// Post a chat line.
#[utoipa::path(
    post,
    path = "/peers/{peer}/chat",
    tag = "peers",
    params(("peer" = Uuid, Path, description = "Hosted peer")),
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Message posted", body = ActionResponse),
        (status = 409, description = "No player joined from this peer")
    )
)]
pub async fn chat(
    State(registry): State<PeerRegistry>,
    Path(peer): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<ChatRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    controller(&registry, peer)?.post_chat(&payload.text).await?;
    Ok(Json(ActionResponse::new("message posted")))
}

/// Wipe the whole session.
#[utoipa::path(
    post,
    path = "/peers/{peer}/reset",
    tag = "peers",
    params(("peer" = Uuid, Path, description = "Hosted peer")),
    responses(
        (status = 200, description = "Session wiped", body = ActionResponse)
    )
)]
pub async fn reset(
    State(registry): State<PeerRegistry>,
    Path(peer): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    controller(&registry, peer)?.reset_session().await?;
    Ok(Json(ActionResponse::new(
        "session reset; other peers resync on their next read",
    )))
}

/// Local render snapshot of the peer.
#[utoipa::path(
    get,
    path = "/peers/{peer}/state",
    tag = "peers",
    params(("peer" = Uuid, Path, description = "Hosted peer")),
    responses(
        (status = 200, description = "Local view", body = SessionView),
        (status = 404, description = "Unknown peer")
    )
)]
pub async fn state(
    State(registry): State<PeerRegistry>,
    Path(peer): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(controller(&registry, peer)?.view().await))
}
