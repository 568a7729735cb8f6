use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::services::{documentation::ApiDoc, peer_registry::PeerRegistry};

/// Serve the Swagger UI backed by the generated OpenAPI document.
pub fn router() -> Router<PeerRegistry> {
    SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into()
}
