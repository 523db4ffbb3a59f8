use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Opaque ID types for readability
pub type RoomId = String;
pub type ParticipantId = String;
pub type MessageId = String;
pub type InstanceId = String;

/// Fewest participants a game can start with
pub const MIN_PLAYERS: usize = 3;
/// Largest capacity a room can be created with
pub const MAX_PLAYERS: usize = 20;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Spy,
    Civilian,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Vote,
    Continue,
}

/// Which side won a finished game
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Civilians,
    Spy,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Civilians => "civilians",
            Side::Spy => "spy",
        }
    }
}

/// The secret thing civilians describe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: u32,
    pub name: String,
    pub query: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Store key of the participant record (filled in after reading)
    #[serde(skip)]
    pub id: ParticipantId,
    pub name: String,
    pub is_host: bool,
    /// Epoch milliseconds
    pub joined_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(skip)]
    pub id: MessageId,
    pub player_id: ParticipantId,
    pub player_name: String,
    pub message: String,
    /// Epoch milliseconds
    pub timestamp: i64,
}

/// One played game inside a room. Replaced wholesale on start and restart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameInstance {
    /// Fresh for every start/restart so observers can tell instances apart
    #[serde(default)]
    pub instance_id: InstanceId,
    pub item: Item,
    pub roles: BTreeMap<ParticipantId, Role>,
    pub turn_order: Vec<ParticipantId>,
    pub current_turn_index: usize,
    pub current_turn_player: ParticipantId,
    pub round: u32,
    #[serde(default)]
    pub decision_phase: bool,
    #[serde(default)]
    pub decisions: BTreeMap<ParticipantId, Decision>,
    #[serde(default)]
    pub voting_phase: bool,
    #[serde(default)]
    pub votes: BTreeMap<ParticipantId, ParticipantId>,
    #[serde(default)]
    pub game_over: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voted_out_player: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spy_id: Option<ParticipantId>,
}

impl GameInstance {
    /// The participant holding the spy role
    pub fn spy(&self) -> Option<&ParticipantId> {
        self.roles
            .iter()
            .find(|(_, role)| **role == Role::Spy)
            .map(|(id, _)| id)
    }

    pub fn role_of(&self, id: &str) -> Option<Role> {
        self.roles.get(id).copied()
    }

    /// Describing phase: neither deciding, voting, nor finished
    pub fn in_turn_phase(&self) -> bool {
        !self.decision_phase && !self.voting_phase && !self.game_over
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Document key (filled in after reading)
    #[serde(skip)]
    pub room_id: RoomId,
    pub room_name: String,
    pub max_players: usize,
    /// Epoch milliseconds
    pub created_at: i64,
    #[serde(default)]
    pub game_started: bool,
    #[serde(default)]
    pub players: BTreeMap<ParticipantId, Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<GameInstance>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub chat: BTreeMap<MessageId, ChatMessage>,
}

impl Room {
    /// Decode a room document, filling in the keys the document itself omits
    pub fn from_value(room_id: &str, value: Value) -> Result<Self, serde_json::Error> {
        let mut room: Room = serde_json::from_value(value)?;
        room.room_id = room_id.to_string();
        for (id, player) in room.players.iter_mut() {
            player.id = id.clone();
        }
        for (id, msg) in room.chat.iter_mut() {
            msg.id = id.clone();
        }
        Ok(room)
    }

    /// Participants in join order
    pub fn roster(&self) -> Vec<&Participant> {
        let mut roster: Vec<&Participant> = self.players.values().collect();
        roster.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
        roster
    }

    /// Participant ids in join order
    pub fn player_ids(&self) -> Vec<ParticipantId> {
        self.roster().into_iter().map(|p| p.id.clone()).collect()
    }

    pub fn is_member(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    pub fn host(&self) -> Option<&Participant> {
        self.players.values().find(|p| p.is_host)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    /// Chat messages in display order
    pub fn chat_log(&self) -> Vec<&ChatMessage> {
        let mut log: Vec<&ChatMessage> = self.chat.values().collect();
        log.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        log
    }
}

/// A set of named field updates for one store path.
///
/// Transition functions return these instead of mutating anything, so the same
/// patch can be written to the store or applied locally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GamePatch {
    fields: Map<String, Value>,
}

impl GamePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Replace a map-valued field with an empty map
    pub fn clear(self, key: &str) -> Self {
        self.set(key, Value::Object(Map::new()))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// The game as it looks once this patch has been merged in
    pub fn apply_to(&self, game: &GameInstance) -> Result<GameInstance, serde_json::Error> {
        let mut value = serde_json::to_value(game)?;
        if let Value::Object(map) = &mut value {
            for (key, field) in &self.fields {
                if field.is_null() {
                    map.remove(key);
                } else {
                    map.insert(key.clone(), field.clone());
                }
            }
        }
        serde_json::from_value(value)
    }
}

impl From<Side> for Value {
    fn from(side: Side) -> Self {
        Value::String(side.as_str().to_string())
    }
}
