use super::room::{clean_name, RoomJoined};
use super::{lookup_room, normalize_room_id, player_path, players_path, room_path};
use super::{Membership, Session};
use crate::error::{GameError, GameResult};
use crate::types::*;

impl Session {
    /// Join an existing room as a regular participant.
    ///
    /// The started/capacity checks run against a one-shot read taken before the
    /// write, so two joins racing for the last seat can both get in.
    pub async fn join_room(&mut self, room_id: &str, name: &str) -> GameResult<RoomJoined> {
        if self.membership.is_some() {
            return Err(GameError::AlreadyInRoom);
        }
        let name = clean_name(name)?;
        let room_id = normalize_room_id(room_id);

        let room = lookup_room(self.store.as_ref(), &room_id).await?;
        if room.game_started {
            return Err(GameError::GameAlreadyStarted);
        }
        if room.is_full() {
            return Err(GameError::RoomFull);
        }

        let participant = Participant {
            id: String::new(),
            name,
            is_host: false,
            joined_at: chrono::Utc::now().timestamp_millis(),
        };
        let participant_id = self
            .store
            .create_unique(&players_path(&room_id), serde_json::to_value(&participant)?)
            .await?;

        tracing::info!(
            "{} joined room {} as {}",
            participant.name,
            room_id,
            participant_id
        );

        self.enter(Membership {
            room_id: room_id.clone(),
            participant_id: participant_id.clone(),
            is_host: false,
        });

        Ok(RoomJoined {
            room_id,
            participant_id,
        })
    }

    /// Leave the current room. The host takes the whole room down with them.
    ///
    /// The session is back at home afterwards even if the delete failed.
    pub async fn leave_room(&mut self) -> GameResult<()> {
        let membership = self.require_membership()?;
        self.reset_local();

        let path = if membership.is_host {
            room_path(&membership.room_id)
        } else {
            player_path(&membership.room_id, &membership.participant_id)
        };

        match self.store.delete(&path).await {
            Ok(()) => {
                tracing::info!(
                    "{} left room {}{}",
                    membership.participant_id,
                    membership.room_id,
                    if membership.is_host { " (room closed)" } else { "" }
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to leave room {}: {}", membership.room_id, e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::store::{MemoryStore, StoreResult, Subscription, SyncStore};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::{Map, Value};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_join_appends_participant() {
        let mut table = Table::new();
        let mut host = table.session();
        let created = host.create_room("Alice", "Den", 4).await.unwrap();

        let mut bob = table.session();
        let joined = bob.join_room(&created.room_id, "Bob").await.unwrap();
        assert_ne!(joined.participant_id, created.participant_id);

        let room = lookup_room(&*table.store, &created.room_id)
            .await
            .unwrap();
        assert_eq!(room.players.len(), 2);
        let bob_record = &room.players[&joined.participant_id];
        assert_eq!(bob_record.name, "Bob");
        assert!(!bob_record.is_host);
        assert!(!bob.membership().unwrap().is_host);
    }

    #[tokio::test]
    async fn test_join_normalizes_room_id() {
        let mut table = Table::new();
        let mut host = table.session();
        let created = host.create_room("Alice", "Den", 4).await.unwrap();

        let mut bob = table.session();
        let code = format!(" {} ", created.room_id.to_lowercase());
        let joined = bob.join_room(&code, "Bob").await.unwrap();
        assert_eq!(joined.room_id, created.room_id);
    }

    #[tokio::test]
    async fn test_join_missing_room() {
        let mut table = Table::new();
        let mut bob = table.session();
        let result = bob.join_room("ZZZZZZ", "Bob").await;
        assert!(matches!(result, Err(GameError::RoomNotFound)));
        assert!(bob.membership().is_none());
    }

    #[tokio::test]
    async fn test_join_full_room() {
        let mut table = Table::new();
        let mut host = table.session();
        let created = host.create_room("Alice", "Den", 3).await.unwrap();
        for name in ["Bob", "Carol"] {
            table
                .session()
                .join_room(&created.room_id, name)
                .await
                .unwrap();
        }

        let mut dave = table.session();
        let result = dave.join_room(&created.room_id, "Dave").await;
        assert!(matches!(result, Err(GameError::RoomFull)));

        let room = lookup_room(&*table.store, &created.room_id)
            .await
            .unwrap();
        assert_eq!(room.players.len(), 3);
    }

    #[tokio::test]
    async fn test_join_started_game() {
        let mut table = Table::new();
        let (mut host, _guests) = room_with(&mut table, &["Bob", "Carol"]).await;
        host.start_game().await.unwrap();

        let room_id = host.membership().unwrap().room_id.clone();
        let mut dave = table.session();
        let result = dave.join_room(&room_id, "Dave").await;
        assert!(matches!(result, Err(GameError::GameAlreadyStarted)));
    }

    /// Memory store whose writes land one scheduler tick late
    struct LaggingStore(Arc<MemoryStore>);

    #[async_trait::async_trait]
    impl SyncStore for LaggingStore {
        async fn read(&self, path: &str) -> StoreResult<Option<Value>> {
            self.0.read(path).await
        }

        async fn write(&self, path: &str, value: Value) -> StoreResult<()> {
            tokio::task::yield_now().await;
            self.0.write(path, value).await
        }

        async fn patch(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()> {
            tokio::task::yield_now().await;
            self.0.patch(path, fields).await
        }

        fn new_key(&self) -> String {
            self.0.new_key()
        }

        async fn create_unique(&self, path: &str, value: Value) -> StoreResult<String> {
            tokio::task::yield_now().await;
            self.0.create_unique(path, value).await
        }

        async fn delete(&self, path: &str) -> StoreResult<()> {
            tokio::task::yield_now().await;
            self.0.delete(path).await
        }

        async fn subscribe(&self, path: &str) -> StoreResult<Subscription> {
            self.0.subscribe(path).await
        }
    }

    #[tokio::test]
    async fn test_racing_joins_can_overfill() {
        let mut table = Table::new();
        let mut host = table.session();
        let created = host.create_room("Alice", "Den", 3).await.unwrap();
        table
            .session()
            .join_room(&created.room_id, "Bob")
            .await
            .unwrap();

        // One seat left; both joiners read the room before either write lands
        let lagging: Arc<dyn SyncStore> = Arc::new(LaggingStore(table.store.clone()));
        let mut carol = Session::new(lagging.clone(), table.catalog.clone(), StdRng::seed_from_u64(40));
        let mut dave = Session::new(lagging, table.catalog.clone(), StdRng::seed_from_u64(41));

        let (carol_joined, dave_joined) = tokio::join!(
            carol.join_room(&created.room_id, "Carol"),
            dave.join_room(&created.room_id, "Dave")
        );
        assert!(carol_joined.is_ok());
        assert!(dave_joined.is_ok());

        let room = lookup_room(&*table.store, &created.room_id)
            .await
            .unwrap();
        assert_eq!(room.players.len(), 4);
        assert!(room.players.len() > room.max_players);

        // Once the room is visibly full, the check holds again
        let mut erin = table.session();
        assert!(matches!(
            erin.join_room(&created.room_id, "Erin").await,
            Err(GameError::RoomFull)
        ));
    }

    #[tokio::test]
    async fn test_guest_leave_removes_only_self() {
        let mut table = Table::new();
        let (host, mut guests) = room_with(&mut table, &["Bob", "Carol"]).await;
        let room_id = host.membership().unwrap().room_id.clone();

        guests[0].leave_room().await.unwrap();
        assert!(guests[0].membership().is_none());

        let room = lookup_room(&*table.store, &room_id).await.unwrap();
        assert_eq!(room.players.len(), 2);
    }

    #[tokio::test]
    async fn test_host_leave_destroys_room() {
        let mut table = Table::new();
        let (mut host, _guests) = room_with(&mut table, &["Bob"]).await;
        let room_id = host.membership().unwrap().room_id.clone();

        host.leave_room().await.unwrap();
        assert!(table
            .store
            .read(&room_path(&room_id))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_leave_while_offline_still_resets() {
        let mut table = Table::new();
        let (_host, mut guests) = room_with(&mut table, &["Bob"]).await;

        table.store.set_offline(true);
        let result = guests[0].leave_room().await;
        assert!(matches!(result, Err(GameError::ConnectionFailure(_))));
        assert!(guests[0].membership().is_none());
    }

    #[tokio::test]
    async fn test_leave_without_room() {
        let mut table = Table::new();
        let mut session = table.session();
        assert!(matches!(
            session.leave_room().await,
            Err(GameError::NotInRoom)
        ));
    }
}
