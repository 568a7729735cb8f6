use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Sketch Relay.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::peers::create_peer,
        crate::routes::peers::delete_peer,
        crate::routes::peers::join,
        crate::routes::peers::guess,
        crate::routes::peers::submit_drawing,
        crate::routes::peers::stroke,
        crate::routes::peers::clear_canvas,
        crate::routes::peers::chat,
        crate::routes::peers::reset,
        crate::routes::peers::state,
        crate::routes::sse::peer_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::JoinRequest,
            crate::dto::session::GuessRequest,
            crate::dto::session::ChatRequest,
            crate::dto::session::StrokeRequest,
            crate::dto::session::PeerCreatedResponse,
            crate::dto::session::PlayerView,
            crate::dto::session::GuessResponse,
            crate::dto::session::ActionResponse,
            crate::dto::session::RoleView,
            crate::dto::session::SessionView,
            crate::dto::phase::RoundSnapshot,
            crate::dto::phase::LastRoundSnapshot,
            crate::dto::phase::VisibleTurnPhase,
            crate::dto::phase::VisibleOutcome,
            crate::dto::sse::Handshake,
            crate::dto::sse::PhaseChangedEvent,
            crate::dto::sse::CountdownEvent,
            crate::dto::sse::RosterEvent,
            crate::dto::sse::MessageEvent,
            crate::dto::sse::DrawingEvent,
            crate::dto::sse::SessionResetEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "peers", description = "Hosted peers and their player actions"),
        (name = "sse", description = "Per-peer UI event streams"),
    )
)]
pub struct ApiDoc;
