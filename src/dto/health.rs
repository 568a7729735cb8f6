use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Number of peers hosted by this process.
    pub peers: usize,
}

impl HealthResponse {
    /// Create a health response indicating the shared store answers.
    pub fn ok(peers: usize) -> Self {
        Self {
            status: "ok".to_string(),
            peers,
        }
    }

    /// Create a health response indicating the shared store is unusable.
    pub fn degraded(peers: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            peers,
        }
    }
}
