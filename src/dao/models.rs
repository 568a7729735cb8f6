//! Raw record shapes as they travel through the shared store.
//!
//! Every field is optional: replicated writes propagate field by field and a
//! peer can observe any partial record. Validation into domain types lives in
//! `state`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Collection of player records keyed by player id.
pub const PLAYERS_PATH: &str = "players";
/// Single record holding the current round.
pub const ROUND_PATH: &str = "round";
/// Latest drawing event (stroke sample or clear marker).
pub const DRAWING_PATH: &str = "drawing";
/// Append-only chat/guess/system log.
pub const MESSAGES_PATH: &str = "messages";

/// Player entry stored at `players/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    /// Player id, expected to match the record key.
    #[serde(default)]
    pub id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Points; negative values read as malformed.
    #[serde(default)]
    pub score: Option<i64>,
}

/// Phase tag as written in the round record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseRecord {
    /// No round in progress.
    Idle,
    /// The drawer is sketching.
    Drawing,
    /// Guessers pick among the options.
    Guessing,
}

/// How a finished round ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeRecord {
    /// Someone picked the word.
    Correct {
        /// Player who guessed it.
        #[serde(rename = "guesserId")]
        guesser_id: String,
    },
    /// The guessing timer ran out.
    TimedOut,
    /// The drawer left the roster.
    DrawerLeft,
}

/// Summary of the previous round carried by the next round record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummaryRecord {
    /// Id of the finished round.
    pub round_id: Uuid,
    /// Who drew it.
    pub drawer_id: String,
    /// How it ended.
    pub outcome: OutcomeRecord,
}

/// Whole round state stored at `round`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecord {
    /// Id of the active round.
    #[serde(default)]
    pub round_id: Option<Uuid>,
    /// Current phase; missing reads as idle.
    #[serde(default)]
    pub phase: Option<PhaseRecord>,
    /// Player drawing this round.
    #[serde(default)]
    pub drawer_id: Option<String>,
    /// Category the word was drawn from.
    #[serde(default)]
    pub category: Option<String>,
    /// Word to draw.
    #[serde(default)]
    pub word: Option<String>,
    /// Shuffled guess options, the word included.
    #[serde(default)]
    pub options: Option<Vec<String>>,
    /// Milliseconds since the Unix epoch, per the writer's clock.
    #[serde(default)]
    pub started_at: Option<u64>,
    /// Summary of the round before this one.
    #[serde(default)]
    pub last_round: Option<RoundSummaryRecord>,
}

/// Entry appended under `messages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Author id; absent for system entries.
    #[serde(default)]
    pub player_id: Option<String>,
    /// Author display name.
    #[serde(default)]
    pub player_name: Option<String>,
    /// Message body.
    #[serde(default)]
    pub text: Option<String>,
    /// Set on the entry announcing a correct guess.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    /// Set on announcements written by the session itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: Option<u64>,
}

/// Latest value at `drawing`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DrawRecord {
    /// Canvas wipe marker.
    Clear {
        /// Always `true` when written.
        clear: bool,
    },
    /// One stroke sample.
    Stroke {
        /// Horizontal position in `[0, 1]`.
        x: f64,
        /// Vertical position in `[0, 1]`.
        y: f64,
        /// CSS colour string.
        color: String,
        /// Brush size.
        size: f64,
        /// Whether this sample starts a new line.
        #[serde(rename = "isNewLine", default)]
        is_new_line: bool,
    },
}
