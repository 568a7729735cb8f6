//! Request and response shapes of the per-peer session API.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        phase::RoundSnapshot,
        validation::{validate_color, validate_display_name},
    },
    state::{
        LocalRole,
        game::{Player, Stroke},
    },
};

/// Payload used to join the session from a peer.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    #[validate(length(min = 1, max = 32), custom(function = validate_display_name))]
    pub name: String,
}

/// Payload carrying the option picked by a guesser.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GuessRequest {
    #[validate(length(min = 1, max = 64))]
    pub option: String,
}

/// Free chat line.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 280))]
    pub text: String,
}

/// One stroke sample in normalised canvas coordinates.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StrokeRequest {
    #[validate(range(min = 0.0, max = 1.0))]
    pub x: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub y: f64,
    #[validate(custom(function = validate_color))]
    pub color: String,
    #[validate(range(exclusive_min = 0.0, max = 100.0))]
    pub size: f64,
    #[serde(default)]
    pub is_new_line: bool,
}

impl From<StrokeRequest> for Stroke {
    fn from(value: StrokeRequest) -> Self {
        Self {
            x: value.x,
            y: value.y,
            color: value.color,
            size: value.size,
            is_new_line: value.is_new_line,
        }
    }
}

/// Identifier of a freshly hosted peer.
#[derive(Debug, Serialize, ToSchema)]
pub struct PeerCreatedResponse {
    pub peer_id: Uuid,
}

/// Player entry as shown to clients.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub score: u32,
}

impl From<&Player> for PlayerView {
    fn from(value: &Player) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
            score: value.score,
        }
    }
}

/// Result of a guess submission.
#[derive(Debug, Serialize, ToSchema)]
pub struct GuessResponse {
    pub correct: bool,
}

/// Generic action acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}

impl ActionResponse {
    /// Build an acknowledgement with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Role of the peer's local player in the current round.
#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoleView {
    Spectator,
    Drawer,
    Guesser,
}

impl From<LocalRole> for RoleView {
    fn from(value: LocalRole) -> Self {
        match value {
            LocalRole::Spectator => RoleView::Spectator,
            LocalRole::Drawer => RoleView::Drawer,
            LocalRole::Guesser => RoleView::Guesser,
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
/// Everything a UI needs to render one peer.
pub struct SessionView {
    pub peer_id: Uuid,
    pub player: Option<PlayerView>,
    pub role: RoleView,
    pub round: RoundSnapshot,
    pub roster: Vec<PlayerView>,
    pub min_players: usize,
    pub max_players: usize,
    /// Seconds left on the local countdown.
    pub remaining_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;

    #[test]
    fn stroke_outside_canvas_is_invalid() {
        let stroke = StrokeRequest {
            x: 1.2,
            y: 0.5,
            color: "#000000".into(),
            size: 4.0,
            is_new_line: false,
        };
        assert!(stroke.validate().is_err());
    }

    #[test]
    fn zero_brush_size_is_invalid() {
        let stroke = StrokeRequest {
            x: 0.2,
            y: 0.5,
            color: "#000000".into(),
            size: 0.0,
            is_new_line: true,
        };
        assert!(stroke.validate().is_err());
    }

    #[test]
    fn join_requires_a_visible_name() {
        assert!(JoinRequest { name: "Ann".into() }.validate().is_ok());
        assert!(JoinRequest { name: "   ".into() }.validate().is_err());
        assert!(JoinRequest { name: "x".repeat(40) }.validate().is_err());
    }
}
