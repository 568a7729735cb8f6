use indexmap::IndexMap;
use serde_json::Value;
use uuid::Uuid;

use crate::dao::{
    models::{DrawRecord, MessageRecord, PlayerRecord},
    shared_store::Children,
};

/// Caller-generated opaque player identifier.
pub type PlayerId = String;

/// Validated player entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Random token generated by the joining peer.
    pub id: PlayerId,
    /// Display name chosen on join.
    pub name: String,
    /// Current score, never negative.
    pub score: u32,
}

impl Player {
    /// Build a fresh player with a locally generated id.
    ///
    /// Ids are not coordinated with other peers; a collision silently merges
    /// two players into one record.
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            name,
            score: 0,
        }
    }
}

impl From<&Player> for PlayerRecord {
    fn from(value: &Player) -> Self {
        Self {
            id: Some(value.id.clone()),
            name: Some(value.name.clone()),
            score: Some(i64::from(value.score)),
        }
    }
}

/// Why a roster entry was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// The stored value is not a player record at all.
    Undecodable,
    /// `name` is missing or blank.
    MissingName,
    /// `id` is missing or blank.
    MissingId,
    /// `id` does not match the key the record is stored under.
    IdMismatch {
        /// Id found inside the record.
        stored: String,
    },
}

/// Classification of one raw `players/{key}` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEntry {
    /// A usable player.
    Valid(Player),
    /// Present but unusable; gets pruned.
    Malformed(MalformedReason),
    /// Deleted entry.
    Tombstone,
}

impl RosterEntry {
    /// Validate the value stored under `key`.
    pub fn classify(key: &str, value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return RosterEntry::Tombstone;
        };
        let Ok(record) = serde_json::from_value::<PlayerRecord>(value.clone()) else {
            return RosterEntry::Malformed(MalformedReason::Undecodable);
        };

        let Some(name) = record.name.filter(|name| !name.trim().is_empty()) else {
            return RosterEntry::Malformed(MalformedReason::MissingName);
        };
        let Some(id) = record.id.filter(|id| !id.is_empty()) else {
            return RosterEntry::Malformed(MalformedReason::MissingId);
        };
        if id != key {
            return RosterEntry::Malformed(MalformedReason::IdMismatch { stored: id });
        }

        let score = record
            .score
            .unwrap_or(0)
            .clamp(0, i64::from(u32::MAX)) as u32;
        RosterEntry::Valid(Player { id, name, score })
    }
}

/// Pruned view of the roster at one instant.
///
/// Insertion order follows the store; rotation always uses the sorted ids.
#[derive(Debug, Clone, Default)]
pub struct RosterSnapshot {
    players: IndexMap<PlayerId, Player>,
    malformed: Vec<(String, MalformedReason)>,
}

impl RosterSnapshot {
    /// Classify every child of the players collection.
    pub fn from_children(children: Children) -> Self {
        let mut snapshot = RosterSnapshot::default();
        for (key, value) in children {
            match RosterEntry::classify(&key, value.as_ref()) {
                RosterEntry::Valid(player) => {
                    snapshot.players.insert(key, player);
                }
                RosterEntry::Malformed(reason) => snapshot.malformed.push((key, reason)),
                RosterEntry::Tombstone => {}
            }
        }
        snapshot
    }

    /// Number of valid entries.
    pub fn valid_count(&self) -> usize {
        self.players.len()
    }

    /// Valid players keyed by id, in store order.
    pub fn players(&self) -> &IndexMap<PlayerId, Player> {
        &self.players
    }

    /// Look up a valid player.
    pub fn get(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    /// Whether `id` is a valid member.
    pub fn contains(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    /// Keys of entries that must be tombstoned.
    pub fn malformed(&self) -> &[(String, MalformedReason)] {
        &self.malformed
    }

    /// First valid id in store order.
    pub fn first_known(&self) -> Option<&PlayerId> {
        self.players.keys().next()
    }

    /// Valid ids sorted lexicographically.
    pub fn sorted_ids(&self) -> Vec<&PlayerId> {
        let mut ids: Vec<_> = self.players.keys().collect();
        ids.sort();
        ids
    }

    /// Player after `current` in sorted id order, wrapping around.
    ///
    /// When `current` already left, the first id sorting after it is chosen.
    /// With a single valid player the answer is that player.
    pub fn next_drawer(&self, current: &str) -> Option<PlayerId> {
        let ids = self.sorted_ids();
        let first = *ids.first()?;
        let next = match ids.binary_search_by(|id| id.as_str().cmp(current)) {
            Ok(index) => ids[(index + 1) % ids.len()],
            Err(index) => ids.get(index).copied().unwrap_or(first),
        };
        Some(next.clone())
    }
}

/// Validated message log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Child key the entry was appended under.
    pub key: String,
    /// Author id, empty for announcements.
    pub player_id: String,
    /// Author display name.
    pub player_name: String,
    /// Message body.
    pub text: String,
    /// Whether this entry reports a correct guess.
    pub is_correct: bool,
    /// Synthesised announcement rather than player input.
    pub system: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl Message {
    /// Validate a raw log entry; entries without text are ignored.
    pub fn from_value(key: &str, value: &Value) -> Option<Self> {
        let record = serde_json::from_value::<MessageRecord>(value.clone()).ok()?;
        let text = record.text.filter(|text| !text.is_empty())?;
        Some(Self {
            key: key.to_string(),
            player_id: record.player_id.unwrap_or_default(),
            player_name: record.player_name.unwrap_or_default(),
            text,
            is_correct: record.is_correct.unwrap_or(false),
            system: record.system.unwrap_or(false),
            timestamp: record.timestamp.unwrap_or(0),
        })
    }
}

/// One freehand stroke sample in normalised canvas coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    /// Horizontal position in `[0, 1]`.
    pub x: f64,
    /// Vertical position in `[0, 1]`.
    pub y: f64,
    /// CSS colour string.
    pub color: String,
    /// Brush size, strictly positive.
    pub size: f64,
    /// Starts a new line instead of continuing the previous one.
    pub is_new_line: bool,
}

/// Broadcast drawing channel value.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawEvent {
    /// A stroke sample.
    Stroke(Stroke),
    /// Wipe the canvas.
    Clear,
}

impl DrawEvent {
    /// Validate a raw drawing value; out-of-range samples are dropped.
    pub fn from_value(value: &Value) -> Option<Self> {
        match serde_json::from_value::<DrawRecord>(value.clone()).ok()? {
            DrawRecord::Clear { clear: true } => Some(DrawEvent::Clear),
            DrawRecord::Clear { clear: false } => None,
            DrawRecord::Stroke {
                x,
                y,
                color,
                size,
                is_new_line,
            } => {
                let stroke = Stroke {
                    x,
                    y,
                    color,
                    size,
                    is_new_line,
                };
                stroke.is_valid().then_some(DrawEvent::Stroke(stroke))
            }
        }
    }
}

impl Stroke {
    /// Coordinates inside `[0, 1]` and a positive brush size.
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.x)
            && (0.0..=1.0).contains(&self.y)
            && self.size.is_finite()
            && self.size > 0.0
    }
}

impl From<&DrawEvent> for DrawRecord {
    fn from(value: &DrawEvent) -> Self {
        match value {
            DrawEvent::Clear => DrawRecord::Clear { clear: true },
            DrawEvent::Stroke(stroke) => DrawRecord::Stroke {
                x: stroke.x,
                y: stroke.y,
                color: stroke.color.clone(),
                size: stroke.size,
                is_new_line: stroke.is_new_line,
            },
        }
    }
}
