use crate::error::GameError;
use crate::types::*;
use crate::view::RoomView;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        host_name: String,
        #[serde(default)]
        room_name: String,
        max_players: usize,
    },
    JoinRoom {
        room_id: RoomId,
        name: String,
    },
    LeaveRoom,
    // Host-only messages
    StartGame,
    RestartGame,
    /// Current speaker hands the turn on
    AdvanceTurn,
    MakeDecision {
        decision: Decision,
    },
    CastVote {
        target: ParticipantId,
    },
    SendChat {
        message: String,
    },
    /// Local opt-in to see the own role; never written to the room
    RevealRole {
        revealed: bool,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        server_now: String,
    },
    /// Sent after a successful create or join
    RoomJoined {
        room_id: RoomId,
        participant_id: ParticipantId,
    },
    /// Full screen state for this participant
    View {
        view: Box<RoomView>,
    },
    /// Informational message that is not an error, e.g. the room was closed
    Notice {
        code: String,
        msg: String,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn view(view: RoomView) -> Self {
        ServerMessage::View {
            view: Box::new(view),
        }
    }

    pub fn welcome() -> Self {
        ServerMessage::Welcome {
            protocol: PROTOCOL_VERSION.to_string(),
            server_now: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn room_closed() -> Self {
        ServerMessage::Notice {
            code: "ROOM_CLOSED".to_string(),
            msg: "The host closed the room".to_string(),
        }
    }
}

impl From<GameError> for ServerMessage {
    fn from(e: GameError) -> Self {
        ServerMessage::Error {
            code: e.code().to_string(),
            msg: e.to_string(),
        }
    }
}
