use super::{room_path, Membership, Session};
use crate::error::{GameError, GameResult};
use crate::store::SyncStore;
use crate::types::*;
use rand::Rng;
use std::collections::BTreeMap;

/// Characters used for room codes (uppercase base36)
const ROOM_ID_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ROOM_ID_LENGTH: usize = 6;

/// Generate a random shareable room code. Collisions are not checked.
pub fn generate_room_id<R: Rng + ?Sized>(rng: &mut R) -> RoomId {
    (0..ROOM_ID_LENGTH)
        .map(|_| ROOM_ID_CHARS[rng.random_range(0..ROOM_ID_CHARS.len())] as char)
        .collect()
}

/// Room codes are case-insensitive for people typing them in
pub fn normalize_room_id(raw: &str) -> RoomId {
    raw.trim().to_uppercase()
}

/// One-shot read of a room document
pub async fn lookup_room(store: &dyn SyncStore, room_id: &str) -> GameResult<Room> {
    let room_id = normalize_room_id(room_id);
    if room_id.is_empty() || room_id.contains('/') {
        return Err(GameError::RoomNotFound);
    }
    match store.read(&room_path(&room_id)).await? {
        Some(value) => Ok(Room::from_value(&room_id, value)?),
        None => Err(GameError::RoomNotFound),
    }
}

/// Identifiers handed back after creating or joining a room
#[derive(Debug, Clone, PartialEq)]
pub struct RoomJoined {
    pub room_id: RoomId,
    pub participant_id: ParticipantId,
}

pub(super) fn clean_name(raw: &str) -> GameResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(GameError::InvalidInput("name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Session {
    /// Create a room with this session's participant as host.
    ///
    /// The whole document, host included, goes out in a single write.
    pub async fn create_room(
        &mut self,
        host_name: &str,
        room_name: &str,
        max_players: usize,
    ) -> GameResult<RoomJoined> {
        if self.membership.is_some() {
            return Err(GameError::AlreadyInRoom);
        }
        let host_name = clean_name(host_name)?;
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&max_players) {
            return Err(GameError::InvalidInput(format!(
                "room size must be between {} and {}",
                MIN_PLAYERS, MAX_PLAYERS
            )));
        }
        let room_name = match room_name.trim() {
            "" => petname::petname(2, " ").unwrap_or_else(|| "Spy Room".to_string()),
            name => name.to_string(),
        };

        let room_id = generate_room_id(&mut self.rng);
        let host_id = self.store.new_key();
        let now = now_ms();

        let room = Room {
            room_id: room_id.clone(),
            room_name,
            max_players,
            created_at: now,
            game_started: false,
            players: BTreeMap::from([(
                host_id.clone(),
                Participant {
                    id: host_id.clone(),
                    name: host_name,
                    is_host: true,
                    joined_at: now,
                },
            )]),
            game: None,
            chat: BTreeMap::new(),
        };

        self.store
            .write(&room_path(&room_id), serde_json::to_value(&room)?)
            .await?;

        tracing::info!(
            "Room {} ({:?}) created for up to {} players",
            room_id,
            room.room_name,
            max_players
        );

        self.enter(Membership {
            room_id: room_id.clone(),
            participant_id: host_id.clone(),
            is_host: true,
        });

        Ok(RoomJoined {
            room_id,
            participant_id: host_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_room_id_shape() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let id = generate_room_id(&mut rng);
            assert_eq!(id.len(), ROOM_ID_LENGTH);
            assert!(id
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_normalize_room_id() {
        assert_eq!(normalize_room_id("  abc123 "), "ABC123");
        assert_eq!(normalize_room_id("AbC"), "ABC");
    }

    #[tokio::test]
    async fn test_create_room_writes_full_document() {
        let mut table = Table::new();
        let mut host = table.session();
        let created = host.create_room("Alice", "Den", 5).await.unwrap();

        let room = lookup_room(&*table.store, &created.room_id)
            .await
            .unwrap();
        assert_eq!(room.room_name, "Den");
        assert_eq!(room.max_players, 5);
        assert!(!room.game_started);
        assert_eq!(room.players.len(), 1);

        let me = &room.players[&created.participant_id];
        assert_eq!(me.name, "Alice");
        assert!(me.is_host);

        let membership = host.membership().unwrap();
        assert!(membership.is_host);
        assert_eq!(membership.room_id, created.room_id);
    }

    #[tokio::test]
    async fn test_create_room_generates_name_when_blank() {
        let mut table = Table::new();
        let mut host = table.session();
        let created = host.create_room("Alice", "   ", 4).await.unwrap();
        let room = lookup_room(&*table.store, &created.room_id)
            .await
            .unwrap();
        assert!(!room.room_name.trim().is_empty());
    }

    #[tokio::test]
    async fn test_create_room_validates_input() {
        let mut table = Table::new();
        let mut host = table.session();

        for size in [2, 21] {
            let result = host.create_room("Alice", "Den", size).await;
            assert!(matches!(result, Err(GameError::InvalidInput(_))));
        }
        let result = host.create_room("  ", "Den", 4).await;
        assert!(matches!(result, Err(GameError::InvalidInput(_))));
        assert!(host.membership().is_none());
    }

    #[tokio::test]
    async fn test_create_room_twice_rejected() {
        let mut table = Table::new();
        let mut host = table.session();
        host.create_room("Alice", "Den", 4).await.unwrap();
        let result = host.create_room("Alice", "Den", 4).await;
        assert!(matches!(result, Err(GameError::AlreadyInRoom)));
    }

    #[tokio::test]
    async fn test_lookup_room_is_case_insensitive() {
        let mut table = Table::new();
        let mut host = table.session();
        let created = host.create_room("Alice", "Den", 4).await.unwrap();

        let lower = created.room_id.to_lowercase();
        let room = lookup_room(&*table.store, &lower).await.unwrap();
        assert_eq!(room.room_id, created.room_id);
    }

    #[tokio::test]
    async fn test_lookup_missing_room() {
        let table = Table::new();
        for id in ["NOPE42", "", "A/B"] {
            let result = lookup_room(&*table.store, id).await;
            assert!(matches!(result, Err(GameError::RoomNotFound)));
        }
    }

    #[tokio::test]
    async fn test_create_room_offline_is_connection_failure() {
        let mut table = Table::new();
        table.store.set_offline(true);
        let mut host = table.session();
        let result = host.create_room("Alice", "Den", 4).await;
        assert!(matches!(result, Err(GameError::ConnectionFailure(_))));
        assert!(host.membership().is_none());
    }
}
