use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::{
        format_millis,
        phase::{RoundSnapshot, VisibleTurnPhase},
        session::PlayerView,
    },
    state::game::{DrawEvent, Message},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across the UI stream.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Raw event with a plain-text payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Peer the stream belongs to.
    pub peer_id: Uuid,
    /// Human-readable message confirming the subscription.
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast whenever the observed round state changes.
pub struct PhaseChangedEvent(pub RoundSnapshot);

#[derive(Debug, Serialize, ToSchema)]
/// Remaining time of the local countdown, emitted once per second.
pub struct CountdownEvent {
    pub phase: VisibleTurnPhase,
    pub remaining_secs: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Valid roster after pruning.
pub struct RosterEvent {
    pub players: Vec<PlayerView>,
    pub valid_count: usize,
    pub min_players: usize,
    pub max_players: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// One log entry, delivered once per subscription.
pub struct MessageEvent {
    pub key: String,
    pub player_id: String,
    pub player_name: String,
    pub text: String,
    pub is_correct: bool,
    pub system: bool,
    /// RFC 3339 timestamp written by the posting peer.
    pub timestamp: String,
}

impl From<&Message> for MessageEvent {
    fn from(value: &Message) -> Self {
        Self {
            key: value.key.clone(),
            player_id: value.player_id.clone(),
            player_name: value.player_name.clone(),
            text: value.text.clone(),
            is_correct: value.is_correct,
            system: value.system,
            timestamp: format_millis(value.timestamp),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
/// Latest drawing channel value.
pub enum DrawingEvent {
    /// Stroke sample in normalised coordinates.
    Stroke {
        x: f64,
        y: f64,
        color: String,
        size: f64,
        is_new_line: bool,
    },
    /// Canvas wipe marker.
    Clear { clear: bool },
}

impl From<&DrawEvent> for DrawingEvent {
    fn from(value: &DrawEvent) -> Self {
        match value {
            DrawEvent::Clear => DrawingEvent::Clear { clear: true },
            DrawEvent::Stroke(stroke) => DrawingEvent::Stroke {
                x: stroke.x,
                y: stroke.y,
                color: stroke.color.clone(),
                size: stroke.size,
                is_new_line: stroke.is_new_line,
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when the local peer wiped the session.
pub struct SessionResetEvent {
    pub message: String,
}
