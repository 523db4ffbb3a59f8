use crate::store::StoreError;

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;

/// Everything a room or game operation can fail with.
///
/// Validation errors are raised before anything is written, so shared state is
/// never left half-updated by them. Store failures collapse into
/// [`GameError::ConnectionFailure`] and the operation counts as not applied.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Room is full")]
    RoomFull,

    #[error("Game has already started")]
    GameAlreadyStarted,

    #[error("At least {min} players are needed to start (have {have})")]
    InsufficientPlayers { min: usize, have: usize },

    #[error("You have already decided this round")]
    AlreadyDecided,

    #[error("You have already voted")]
    AlreadyVoted,

    #[error("Connection error: {0}")]
    ConnectionFailure(#[from] StoreError),

    #[error("Not in a room")]
    NotInRoom,

    #[error("Already in a room")]
    AlreadyInRoom,

    #[error("Only the host can {0}")]
    NotHost(&'static str),

    #[error("It is not your turn")]
    NotYourTurn,

    #[error("Not possible right now: {0}")]
    WrongPhase(&'static str),

    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Room document is malformed: {0}")]
    CorruptDocument(#[from] serde_json::Error),
}

impl GameError {
    /// Stable code sent to clients alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            GameError::RoomNotFound => "ROOM_NOT_FOUND",
            GameError::RoomFull => "ROOM_FULL",
            GameError::GameAlreadyStarted => "GAME_ALREADY_STARTED",
            GameError::InsufficientPlayers { .. } => "INSUFFICIENT_PLAYERS",
            GameError::AlreadyDecided => "ALREADY_DECIDED",
            GameError::AlreadyVoted => "ALREADY_VOTED",
            GameError::ConnectionFailure(_) => "CONNECTION_FAILURE",
            GameError::NotInRoom => "NOT_IN_ROOM",
            GameError::AlreadyInRoom => "ALREADY_IN_ROOM",
            GameError::NotHost(_) => "NOT_HOST",
            GameError::NotYourTurn => "NOT_YOUR_TURN",
            GameError::WrongPhase(_) => "WRONG_PHASE",
            GameError::UnknownParticipant(_) => "UNKNOWN_PARTICIPANT",
            GameError::InvalidInput(_) => "INVALID_INPUT",
            GameError::CorruptDocument(_) => "CORRUPT_DOCUMENT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_become_connection_failures() {
        let err: GameError = StoreError::Unavailable.into();
        assert_eq!(err.code(), "CONNECTION_FAILURE");
        assert!(err.to_string().starts_with("Connection error"));
    }

    #[test]
    fn test_insufficient_players_message() {
        let err = GameError::InsufficientPlayers { min: 3, have: 2 };
        assert_eq!(err.to_string(), "At least 3 players are needed to start (have 2)");
        assert_eq!(err.code(), "INSUFFICIENT_PLAYERS");
    }
}
